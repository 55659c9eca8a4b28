//! # Typed Values
//!
//! The application-side representation produced by `deserialize` and consumed
//! by `serialize`. Wire JSON goes in, typed [`Value`]s come out.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::edm::{decimal_to_json, encode_binary, format_date_time, format_duration};

/// Field name → typed value map of one structured instance.
pub type Attributes = IndexMap<String, Value>;

/// A decoded OData value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// `Edm.Boolean`.
    Boolean(bool),
    /// Integer family (`Edm.Byte` … `Edm.Int64`).
    Integer(i64),
    /// `Edm.Decimal`, kept as its exact decimal text.
    Decimal(String),
    /// `Edm.Single` / `Edm.Double`.
    Double(f64),
    /// `Edm.String`.
    String(String),
    /// `Edm.Guid`.
    Guid(Uuid),
    /// `Edm.Date`.
    Date(NaiveDate),
    /// `Edm.DateTimeOffset`.
    DateTimeOffset(DateTime<FixedOffset>),
    /// `Edm.TimeOfDay`.
    TimeOfDay(NaiveTime),
    /// `Edm.Duration`.
    Duration(chrono::Duration),
    /// `Edm.Binary`.
    Binary(Vec<u8>),
    /// Enumeration value as its backing number (OR-ed bits for flags).
    Enum(i64),
    /// Collection of values.
    Collection(Vec<Value>),
    /// Entity or complex instance.
    Structured(Attributes),
    /// Undeclared or untyped content, carried through unchanged.
    Json(JsonValue),
}

impl Value {
    /// Wraps raw JSON that no codec claims.
    pub fn untyped(raw: &JsonValue) -> Value {
        match raw {
            JsonValue::Null => Value::Null,
            other => Value::Json(other.clone()),
        }
    }

    /// Returns `true` for [`Value::Null`] and a JSON null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Json(JsonValue::Null))
    }

    /// Borrows the attribute map of a structured value.
    pub fn as_attributes(&self) -> Option<&Attributes> {
        match self {
            Value::Structured(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Borrows string content, including untyped JSON strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Json(JsonValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Best-effort JSON rendering without a codec.
    ///
    /// Used for undeclared properties and for values whose declared type did
    /// not resolve.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Decimal(d) => decimal_to_json(d),
            Value::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Guid(g) => JsonValue::String(g.hyphenated().to_string()),
            Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTimeOffset(dt) => JsonValue::String(format_date_time(dt)),
            Value::TimeOfDay(t) => JsonValue::String(t.format("%H:%M:%S%.f").to_string()),
            Value::Duration(d) => JsonValue::String(format_duration(d)),
            Value::Binary(bytes) => JsonValue::String(encode_binary(bytes)),
            Value::Enum(bits) => JsonValue::from(*bits),
            Value::Collection(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Structured(attrs) => JsonValue::Object(
                attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Json(raw) => raw.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Attributes> for Value {
    fn from(attrs: Attributes) -> Self {
        Value::Structured(attrs)
    }
}

/// Builds an [`Attributes`] map from `name => value` pairs.
#[macro_export]
macro_rules! attrs {
    ($($name:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::value::Attributes::new();
        $( map.insert(::std::string::String::from($name), $crate::value::Value::from($value)); )*
        map
    }};
}
