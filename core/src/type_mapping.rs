#![deny(missing_docs)]

//! # Type Mapping
//!
//! Converts Edm primitive types into a JSON Schema compatible representation.
//! The mapping is a constant table handed to schema emission through
//! [`EdmToJsonMapper`], never a mutable global.

use serde_json::{json, Map, Value as JsonValue};
use std::fmt::Display;

use crate::edm::EdmType;

/// Represents the simplified JSON types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    /// A string type.
    String,
    /// An integer type.
    Integer,
    /// A floating point number.
    Number,
    /// A boolean type.
    Boolean,
    /// A JSON object (GeoJSON and friends).
    Object,
    /// No constraint at all.
    Any,
}

impl Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Number => write!(f, "number"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Any => write!(f, "any"),
        }
    }
}

/// Represents the schema definition for a mapped type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonSchema {
    /// The primary JSON type.
    pub type_: JsonType,
    /// Optional format specifier (e.g., "uuid", "date-time").
    pub format: Option<&'static str>,
    /// Optional regular expression the text must match.
    pub pattern: Option<&'static str>,
    /// Optional `contentEncoding` (binary payloads).
    pub content_encoding: Option<&'static str>,
}

impl JsonSchema {
    /// Renders the draft-07 fragment.
    pub fn to_json(&self) -> JsonValue {
        let mut out = Map::new();
        if self.type_ != JsonType::Any {
            out.insert("type".into(), json!(self.type_.to_string()));
        }
        if let Some(format) = self.format {
            out.insert("format".into(), json!(format));
        }
        if let Some(pattern) = self.pattern {
            out.insert("pattern".into(), json!(pattern));
        }
        if let Some(encoding) = self.content_encoding {
            out.insert("contentEncoding".into(), json!(encoding));
        }
        JsonValue::Object(out)
    }
}

/// Trait for converting Edm types to JSON Schemas.
pub trait TypeMapper {
    /// Maps an Edm primitive to a JSON Schema.
    fn map(&self, edm: EdmType) -> JsonSchema;
}

/// One row of the mapping table.
pub type EdmJsonRow = (EdmType, JsonSchema);

const fn simple(t: JsonType) -> JsonSchema {
    JsonSchema {
        type_: t,
        format: None,
        pattern: None,
        content_encoding: None,
    }
}

const fn formatted(t: JsonType, fmt: &'static str) -> JsonSchema {
    JsonSchema {
        format: Some(fmt),
        ..simple(t)
    }
}

const fn patterned(t: JsonType, pattern: &'static str) -> JsonSchema {
    JsonSchema {
        pattern: Some(pattern),
        ..simple(t)
    }
}

const fn encoded(t: JsonType, encoding: &'static str) -> JsonSchema {
    JsonSchema {
        content_encoding: Some(encoding),
        ..simple(t)
    }
}

/// The standard Edm → JSON Schema table.
pub static EDM_JSON_TABLE: &[EdmJsonRow] = &[
    (EdmType::Binary, encoded(JsonType::String, "base64url")),
    (EdmType::Boolean, simple(JsonType::Boolean)),
    (EdmType::Byte, simple(JsonType::Integer)),
    (EdmType::SByte, simple(JsonType::Integer)),
    (EdmType::Int16, simple(JsonType::Integer)),
    (EdmType::Int32, simple(JsonType::Integer)),
    (EdmType::Int64, simple(JsonType::Integer)),
    (EdmType::Decimal, simple(JsonType::Number)),
    (EdmType::Single, simple(JsonType::Number)),
    (EdmType::Double, simple(JsonType::Number)),
    (EdmType::String, simple(JsonType::String)),
    (EdmType::Date, formatted(JsonType::String, "date")),
    (EdmType::DateTimeOffset, formatted(JsonType::String, "date-time")),
    (EdmType::TimeOfDay, formatted(JsonType::String, "time")),
    (
        EdmType::Duration,
        patterned(
            JsonType::String,
            r"^-?P(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$",
        ),
    ),
    (
        EdmType::Guid,
        patterned(
            JsonType::String,
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        ),
    ),
    (EdmType::Stream, encoded(JsonType::String, "base64url")),
    (EdmType::Geography, simple(JsonType::Object)),
    (EdmType::Geometry, simple(JsonType::Object)),
    (EdmType::Untyped, simple(JsonType::Any)),
];

/// A table-backed implementation of `TypeMapper`.
#[derive(Debug, Clone, Copy)]
pub struct EdmToJsonMapper {
    /// Rows consulted in order; the first match wins.
    pub table: &'static [EdmJsonRow],
}

impl Default for EdmToJsonMapper {
    fn default() -> Self {
        Self {
            table: EDM_JSON_TABLE,
        }
    }
}

impl TypeMapper for EdmToJsonMapper {
    fn map(&self, edm: EdmType) -> JsonSchema {
        self.table
            .iter()
            .find(|(t, _)| *t == edm)
            .map(|(_, schema)| *schema)
            .unwrap_or(simple(JsonType::Any))
    }
}
