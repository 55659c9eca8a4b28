#![deny(missing_docs)]

//! # Codecs
//!
//! Runtime codecs built from parsed CSDL configuration.
//!
//! - **enum_type**: one enumeration (flags or single-valued).
//! - **field**: one structural/navigation property or callable parameter.
//! - **structured**: one entity or complex type.
//! - **callable**: one function or action.
//!
//! Codecs live in the arena of a [`TypeRegistry`](crate::registry::TypeRegistry)
//! and refer to each other by index. Public access goes through
//! [`CodecView`], which pairs a codec with the registry that resolves its
//! links. Every dispatch goes through the closed [`Codec`] enum.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

use serde_json::Value as JsonValue;

use crate::csdl::AnnotationConfig;
use crate::edm::EdmType;
use crate::error::{CodecError, CodecResult};
use crate::options::ParserOptions;
use crate::registry::TypeRegistry;
use crate::value::Value;

pub mod callable;
pub mod enum_type;
pub mod field;
pub mod structured;

pub use callable::CallableCodec;
pub use enum_type::EnumCodec;
pub use field::FieldCodec;
pub use structured::{JsonSchemaHook, JsonSchemaOptions, KeyValue, StructuredCodec};

/// Index of an enum codec in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumId(pub(crate) usize);

/// Index of a structured codec in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructuredId(pub(crate) usize);

/// Index of a callable codec in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableId(pub(crate) usize);

/// A resolved link from a field or parameter to the codec of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecRef {
    /// An `Edm.*` primitive (type definitions resolve to their underlying type).
    Primitive(EdmType),
    /// An enumeration.
    Enum(EnumId),
    /// An entity or complex type.
    Structured(StructuredId),
    /// A function or action.
    Callable(CallableId),
    /// The type name did not resolve; values pass through untouched.
    #[default]
    PassThrough,
}

/// A codec borrowed together with the registry that resolves its links.
pub struct CodecView<'r, T> {
    registry: &'r TypeRegistry,
    target: &'r T,
}

impl<'r, T> CodecView<'r, T> {
    pub(crate) fn new(registry: &'r TypeRegistry, target: &'r T) -> Self {
        Self { registry, target }
    }

    /// The registry this codec belongs to.
    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// The underlying codec with the registry's lifetime.
    pub fn get(&self) -> &'r T {
        self.target
    }
}

impl<T> Clone for CodecView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CodecView<'_, T> {}

impl<T> Deref for CodecView<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.target
    }
}

impl<T: fmt::Debug> fmt::Debug for CodecView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}

/// Enum codec view.
pub type EnumView<'r> = CodecView<'r, EnumCodec>;
/// Structured codec view.
pub type StructuredView<'r> = CodecView<'r, StructuredCodec>;
/// Callable codec view.
pub type CallableView<'r> = CodecView<'r, CallableCodec>;
/// Field codec view.
pub type FieldView<'r> = CodecView<'r, FieldCodec>;

/// Any codec, dispatched exhaustively.
#[derive(Debug, Clone, Copy)]
pub enum Codec<'r> {
    /// `Edm.*` primitive converter.
    Primitive(EdmType),
    /// Enumeration codec.
    Enum(EnumView<'r>),
    /// Entity or complex type codec.
    Structured(StructuredView<'r>),
    /// Function or action codec.
    Callable(CallableView<'r>),
    /// No codec: raw values are carried as-is.
    PassThrough,
}

impl<'r> Codec<'r> {
    /// Qualified type name, `None` for a pass-through.
    pub fn type_name(&self) -> Option<String> {
        match self {
            Codec::Primitive(edm) => Some(edm.name().to_string()),
            Codec::Enum(e) => Some(e.full_name()),
            Codec::Structured(s) => Some(s.full_name()),
            Codec::Callable(c) => Some(c.full_name()),
            Codec::PassThrough => None,
        }
    }

    /// Wire JSON → typed value.
    pub fn deserialize(&self, raw: &JsonValue, options: &ParserOptions) -> CodecResult<Value> {
        match self {
            Codec::Primitive(edm) => edm.deserialize(raw, options),
            Codec::Enum(e) => e.deserialize(raw, options),
            Codec::Structured(s) => s.deserialize(raw, options),
            Codec::Callable(c) => c.deserialize(raw, options),
            Codec::PassThrough => Ok(Value::untyped(raw)),
        }
    }

    /// Typed value → wire JSON.
    pub fn serialize(&self, value: &Value, options: &ParserOptions) -> CodecResult<JsonValue> {
        match self {
            Codec::Primitive(edm) => edm.serialize(value, options),
            Codec::Enum(e) => e.serialize(value, options),
            Codec::Structured(s) => s.serialize(value, options),
            Codec::Callable(c) => match value {
                Value::Structured(args) => c.serialize(args, options),
                _ => Err(CodecError::ExpectedObject {
                    type_name: c.full_name(),
                }),
            },
            Codec::PassThrough => Ok(value.to_json()),
        }
    }

    /// Typed value → OData URL literal.
    pub fn encode(&self, value: &Value, options: &ParserOptions) -> CodecResult<String> {
        match self {
            Codec::Primitive(edm) => edm.encode(value, options),
            Codec::Enum(e) => e.encode(value, options),
            Codec::Structured(_) | Codec::Callable(_) => {
                Ok(self.serialize(value, options)?.to_string())
            }
            Codec::PassThrough => Ok(match value.to_json() {
                JsonValue::String(s) => format!("'{}'", s.replace('\'', "''")),
                other => other.to_string(),
            }),
        }
    }
}

pub(crate) const CORE_COMPUTED: &str = "Org.OData.Core.V1.Computed";
pub(crate) const CORE_DESCRIPTION: &str = "Org.OData.Core.V1.Description";

/// Vocabulary aliases in scope for one document (`Core` → `Org.OData.Core.V1`).
#[derive(Debug, Clone, Default)]
pub(crate) struct Vocabulary {
    aliases: HashMap<String, String>,
}

impl Vocabulary {
    pub(crate) fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    /// Expands an aliased term to its namespace-qualified form.
    pub(crate) fn canonical(&self, term: &str) -> String {
        match term.rsplit_once('.') {
            Some((prefix, name)) => match self.aliases.get(prefix) {
                Some(namespace) => format!("{}.{}", namespace, name),
                None => term.to_string(),
            },
            None => term.to_string(),
        }
    }

    /// Finds the first annotation of the given qualified term.
    pub(crate) fn find<'a>(
        &self,
        annotations: &'a [AnnotationConfig],
        term: &str,
    ) -> Option<&'a AnnotationConfig> {
        annotations.iter().find(|a| self.canonical(&a.term) == term)
    }
}

/// `Namespace.Name` or `Alias.Name` match.
pub(crate) fn is_qualified_as(
    namespace: &str,
    alias: Option<&str>,
    name: &str,
    candidate: &str,
) -> bool {
    match candidate.rsplit_once('.') {
        Some((prefix, simple)) => {
            simple == name && (prefix == namespace || alias.is_some_and(|a| a == prefix))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csdl::AnnotationValue;

    #[test]
    fn test_vocabulary_alias() {
        let vocab = Vocabulary::new(HashMap::from([(
            "Core".to_string(),
            "Org.OData.Core.V1".to_string(),
        )]));
        let annotations = vec![AnnotationConfig {
            term: "Core.Description".into(),
            qualifier: None,
            value: Some(AnnotationValue::String("hello".into())),
        }];
        assert_eq!(vocab.canonical("Core.Computed"), CORE_COMPUTED);
        assert_eq!(
            vocab
                .find(&annotations, CORE_DESCRIPTION)
                .and_then(|a| a.as_str()),
            Some("hello")
        );
        assert!(vocab.find(&annotations, CORE_COMPUTED).is_none());
    }

    #[test]
    fn test_qualified_match() {
        assert!(is_qualified_as("NS", Some("self"), "Person", "NS.Person"));
        assert!(is_qualified_as("NS", Some("self"), "Person", "self.Person"));
        assert!(!is_qualified_as("NS", None, "Person", "Other.Person"));
        assert!(!is_qualified_as("NS", None, "Person", "Person"));
    }

    #[test]
    fn test_pass_through_codec() {
        let codec = Codec::PassThrough;
        let opts = ParserOptions::default();
        let raw = serde_json::json!({"x": [1, 2]});
        let value = codec.deserialize(&raw, &opts).unwrap();
        assert_eq!(codec.serialize(&value, &opts).unwrap(), raw);
        assert_eq!(
            codec.encode(&Value::from("it's"), &opts).unwrap(),
            "'it''s'"
        );
        assert!(codec.type_name().is_none());
    }
}
