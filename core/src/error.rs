//! # Error Handling
//!
//! Provides the error enums used across the workspace.
//!
//! - [`ParseError`]: fatal, document-level failures raised while reading CSDL.
//! - [`CodecError`]: value-level failures raised by `serialize`/`deserialize`
//!   for structurally invalid input.
//! - [`AppError`]: the umbrella enum the CLI and other callers propagate.

use derive_more::{Display, From};

/// Fatal errors raised while parsing a CSDL document.
///
/// Any of these aborts the whole parse; no partial document is produced.
#[derive(Debug, Display, From)]
pub enum ParseError {
    /// The payload is not well-formed XML.
    #[display("Malformed XML: {_0}")]
    Xml(roxmltree::Error),

    /// The root element carries no `Version` attribute.
    #[from(ignore)]
    #[display("Metadata document has no Version attribute")]
    MissingVersion,

    /// The root `Version` is not the supported protocol version.
    #[from(ignore)]
    #[display("Unsupported metadata version '{_0}'")]
    UnsupportedVersion(String),

    /// The root element is not `Edmx`.
    #[from(ignore)]
    #[display("Expected <Edmx> root element, found <{_0}>")]
    UnexpectedRoot(String),

    /// A child element that the grammar does not allow in its container.
    #[from(ignore)]
    #[display("Unknown element <{tag}> inside <{parent}>")]
    UnknownElement {
        /// Container element.
        parent: String,
        /// Offending child tag.
        tag: String,
    },

    /// A singular child element appears more than once.
    #[from(ignore)]
    #[display("Element <{tag}> may appear at most once inside <{parent}>")]
    DuplicateElement {
        /// Container element.
        parent: String,
        /// Repeated child tag.
        tag: String,
    },

    /// A mandatory child element or attribute is absent.
    #[from(ignore)]
    #[display("Element <{element}> is missing required '{attribute}'")]
    MissingAttribute {
        /// Element lacking the attribute.
        element: String,
        /// Attribute (or child element) name.
        attribute: String,
    },

    /// An attribute value does not satisfy its declared coercion.
    #[from(ignore)]
    #[display("Attribute '{attribute}' of <{element}> has invalid {expected} value '{value}'")]
    InvalidAttribute {
        /// Element carrying the attribute.
        element: String,
        /// Attribute name.
        attribute: String,
        /// Raw attribute text.
        value: String,
        /// Expected shape, e.g. "boolean".
        expected: &'static str,
    },
}

impl std::error::Error for ParseError {}

/// Value-level errors raised by codecs.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum CodecError {
    /// A member name is absent from the enumeration's member table.
    #[display("Unknown member '{member}' of enum {type_name}")]
    UnknownMember {
        /// Qualified enum type name.
        type_name: String,
        /// Member name that failed to resolve.
        member: String,
    },

    /// A numeric value cannot be expressed with the enumeration's members.
    #[display("Value {value} cannot be expressed by members of enum {type_name}")]
    UnknownValue {
        /// Qualified enum type name.
        type_name: String,
        /// Offending numeric value.
        value: i64,
    },

    /// A wire or typed value does not have the shape its type requires.
    #[display("Invalid {type_name} value: {value}")]
    InvalidValue {
        /// Edm or qualified type name.
        type_name: String,
        /// Rendered offending value.
        value: String,
    },

    /// A structured type was asked to decode something that is not an object.
    #[display("Expected an object for {type_name}")]
    ExpectedObject {
        /// Qualified structured type name.
        type_name: String,
    },
}

impl std::error::Error for CodecError {}

/// The Global Error Enum.
///
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Metadata document failed to parse.
    #[display("Parse Error: {_0}")]
    Parse(ParseError),

    /// A value failed to encode or decode.
    #[display("Codec Error: {_0}")]
    Codec(CodecError),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for the CSDL parser.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
