#![deny(missing_docs)]

//! # OData Core
//!
//! Reads OData CSDL metadata and turns it into runtime codecs that convert
//! between wire JSON, typed values and URL literals, validate payloads and
//! emit JSON Schema.

/// Shared error types.
pub mod error;

/// Typed runtime values.
pub mod value;

/// Protocol-version dependent parsing options.
pub mod options;

/// `Edm.*` primitive conversions.
pub mod edm;

/// CSDL XML parsing.
pub mod csdl;

/// Enum, field, structured and callable codecs.
pub mod codec;

/// Type mapping logic (Edm -> JSON Schema).
pub mod type_mapping;

/// Validation outcomes.
pub mod validation;

/// Two-phase codec registry.
pub mod registry;

pub use codec::{
    CallableView, Codec, CodecRef, EnumView, FieldView, JsonSchemaOptions, KeyValue,
    StructuredView,
};
pub use csdl::{parse, SchemaDocument};
pub use edm::EdmType;
pub use error::{AppError, AppResult, CodecError, CodecResult, ParseError, ParseResult};
pub use options::{ParserOptions, ProtocolVersion};
pub use registry::{Diagnostic, DiagnosticKind, TypeRegistry, UnresolvedCodecSet};
pub use type_mapping::{EdmToJsonMapper, JsonSchema, JsonType, TypeMapper};
pub use validation::{ErrorsByField, FieldErrors, Method, ValidateOptions, Violation};
pub use value::{Attributes, Value};
