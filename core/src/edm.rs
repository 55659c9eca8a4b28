//! # Edm Primitives
//!
//! Converters between wire JSON and typed [`Value`]s for the fixed set of
//! `Edm.*` primitive types, plus their OData URL literal form.

use std::sync::OnceLock;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat};
use regex::Regex;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{CodecError, CodecResult};
use crate::options::ParserOptions;
use crate::value::Value;

/// The Edm primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdmType {
    /// `Edm.Binary`
    Binary,
    /// `Edm.Boolean`
    Boolean,
    /// `Edm.Byte`
    Byte,
    /// `Edm.Date`
    Date,
    /// `Edm.DateTimeOffset`
    DateTimeOffset,
    /// `Edm.Decimal`
    Decimal,
    /// `Edm.Double`
    Double,
    /// `Edm.Duration`
    Duration,
    /// `Edm.Guid`
    Guid,
    /// `Edm.Int16`
    Int16,
    /// `Edm.Int32`
    Int32,
    /// `Edm.Int64`
    Int64,
    /// `Edm.SByte`
    SByte,
    /// `Edm.Single`
    Single,
    /// `Edm.Stream`
    Stream,
    /// `Edm.String`
    String,
    /// `Edm.TimeOfDay`
    TimeOfDay,
    /// `Edm.Geography*` (GeoJSON)
    Geography,
    /// `Edm.Geometry*` (GeoJSON)
    Geometry,
    /// `Edm.Untyped` and the abstract `Edm.*Type` names.
    Untyped,
}

const EDM_NAMES: &[(&str, EdmType)] = &[
    ("Edm.Binary", EdmType::Binary),
    ("Edm.Boolean", EdmType::Boolean),
    ("Edm.Byte", EdmType::Byte),
    ("Edm.Date", EdmType::Date),
    ("Edm.DateTimeOffset", EdmType::DateTimeOffset),
    ("Edm.Decimal", EdmType::Decimal),
    ("Edm.Double", EdmType::Double),
    ("Edm.Duration", EdmType::Duration),
    ("Edm.Guid", EdmType::Guid),
    ("Edm.Int16", EdmType::Int16),
    ("Edm.Int32", EdmType::Int32),
    ("Edm.Int64", EdmType::Int64),
    ("Edm.SByte", EdmType::SByte),
    ("Edm.Single", EdmType::Single),
    ("Edm.Stream", EdmType::Stream),
    ("Edm.String", EdmType::String),
    ("Edm.TimeOfDay", EdmType::TimeOfDay),
    ("Edm.Geography", EdmType::Geography),
    ("Edm.Geometry", EdmType::Geometry),
    ("Edm.Untyped", EdmType::Untyped),
    ("Edm.PrimitiveType", EdmType::Untyped),
    ("Edm.ComplexType", EdmType::Untyped),
    ("Edm.EntityType", EdmType::Untyped),
    ("Edm.AnnotationPath", EdmType::String),
    ("Edm.PropertyPath", EdmType::String),
    ("Edm.NavigationPropertyPath", EdmType::String),
];

impl EdmType {
    /// Looks up a qualified `Edm.*` name.
    pub fn from_name(name: &str) -> Option<EdmType> {
        if let Some((_, ty)) = EDM_NAMES.iter().find(|(n, _)| *n == name) {
            return Some(*ty);
        }
        // Edm.GeographyPoint, Edm.GeometryPolygon, ...
        if name.starts_with("Edm.Geography") {
            return Some(EdmType::Geography);
        }
        if name.starts_with("Edm.Geometry") {
            return Some(EdmType::Geometry);
        }
        None
    }

    /// Canonical qualified name.
    pub fn name(self) -> &'static str {
        EDM_NAMES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(n, _)| *n)
            .unwrap_or("Edm.Untyped")
    }

    /// Wire JSON → typed value.
    pub fn deserialize(self, raw: &JsonValue, _options: &ParserOptions) -> CodecResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match self {
            EdmType::Boolean => match raw {
                JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
                JsonValue::String(s) if s == "true" => Ok(Value::Boolean(true)),
                JsonValue::String(s) if s == "false" => Ok(Value::Boolean(false)),
                _ => Err(self.invalid(raw)),
            },
            EdmType::Byte | EdmType::SByte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64 => {
                let n = match raw {
                    JsonValue::Number(n) => n.as_i64(),
                    JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(|| self.invalid(raw))?;
                if !self.in_range(n) {
                    return Err(self.invalid(raw));
                }
                Ok(Value::Integer(n))
            }
            EdmType::Decimal => match raw {
                JsonValue::Number(n) => Ok(Value::Decimal(n.to_string())),
                JsonValue::String(s) if decimal_re().is_match(s) => Ok(Value::Decimal(s.clone())),
                _ => Err(self.invalid(raw)),
            },
            EdmType::Single | EdmType::Double => match raw {
                JsonValue::Number(n) => n
                    .as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| self.invalid(raw)),
                JsonValue::String(s) => match s.as_str() {
                    "INF" => Ok(Value::Double(f64::INFINITY)),
                    "-INF" => Ok(Value::Double(f64::NEG_INFINITY)),
                    "NaN" => Ok(Value::Double(f64::NAN)),
                    other => other
                        .parse::<f64>()
                        .map(Value::Double)
                        .map_err(|_| self.invalid(raw)),
                },
                _ => Err(self.invalid(raw)),
            },
            EdmType::String => match raw {
                JsonValue::String(s) => Ok(Value::String(s.clone())),
                _ => Err(self.invalid(raw)),
            },
            EdmType::Guid => {
                let s = raw.as_str().ok_or_else(|| self.invalid(raw))?;
                Uuid::parse_str(s)
                    .map(Value::Guid)
                    .map_err(|_| self.invalid(raw))
            }
            EdmType::Date => {
                let s = raw.as_str().ok_or_else(|| self.invalid(raw))?;
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| self.invalid(raw))
            }
            EdmType::DateTimeOffset => {
                let s = raw.as_str().ok_or_else(|| self.invalid(raw))?;
                DateTime::parse_from_rfc3339(s)
                    .map(Value::DateTimeOffset)
                    .map_err(|_| self.invalid(raw))
            }
            EdmType::TimeOfDay => {
                let s = raw.as_str().ok_or_else(|| self.invalid(raw))?;
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .map(Value::TimeOfDay)
                    .map_err(|_| self.invalid(raw))
            }
            EdmType::Duration => {
                let s = raw.as_str().ok_or_else(|| self.invalid(raw))?;
                parse_duration(s)
                    .map(Value::Duration)
                    .ok_or_else(|| self.invalid(raw))
            }
            EdmType::Binary => {
                let s = raw.as_str().ok_or_else(|| self.invalid(raw))?;
                decode_binary(s)
                    .map(Value::Binary)
                    .ok_or_else(|| self.invalid(raw))
            }
            EdmType::Stream | EdmType::Geography | EdmType::Geometry | EdmType::Untyped => {
                Ok(Value::untyped(raw))
            }
        }
    }

    /// Typed value → wire JSON.
    pub fn serialize(self, value: &Value, options: &ParserOptions) -> CodecResult<JsonValue> {
        let json = match (self, value) {
            (_, Value::Null) => JsonValue::Null,
            (_, Value::Json(raw)) => raw.clone(),
            (EdmType::Boolean, Value::Boolean(b)) => JsonValue::Bool(*b),
            (EdmType::Int64, Value::Integer(i)) if options.ieee754_compatible => {
                JsonValue::String(i.to_string())
            }
            (
                EdmType::Byte | EdmType::SByte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64,
                Value::Integer(i),
            ) if self.in_range(*i) => JsonValue::from(*i),
            (EdmType::Decimal, Value::Decimal(d)) => {
                if options.ieee754_compatible {
                    JsonValue::String(d.clone())
                } else {
                    decimal_to_json(d)
                }
            }
            (EdmType::Decimal, Value::Integer(i)) => {
                if options.ieee754_compatible {
                    JsonValue::String(i.to_string())
                } else {
                    JsonValue::from(*i)
                }
            }
            (EdmType::Decimal, Value::Double(f)) if f.is_finite() => Value::Double(*f).to_json(),
            (EdmType::Single | EdmType::Double, Value::Double(f)) => {
                if f.is_nan() {
                    JsonValue::String("NaN".into())
                } else if f.is_infinite() {
                    JsonValue::String(if *f > 0.0 { "INF" } else { "-INF" }.into())
                } else {
                    Value::Double(*f).to_json()
                }
            }
            (EdmType::Single | EdmType::Double, Value::Integer(i)) => JsonValue::from(*i),
            (EdmType::String, Value::String(s)) => JsonValue::String(s.clone()),
            (EdmType::Guid, Value::Guid(_))
            | (EdmType::Date, Value::Date(_))
            | (EdmType::DateTimeOffset, Value::DateTimeOffset(_))
            | (EdmType::TimeOfDay, Value::TimeOfDay(_))
            | (EdmType::Duration, Value::Duration(_))
            | (EdmType::Binary, Value::Binary(_)) => value.to_json(),
            // Already in wire form; re-validated through the decoder.
            (
                EdmType::Guid
                | EdmType::Date
                | EdmType::DateTimeOffset
                | EdmType::TimeOfDay
                | EdmType::Duration
                | EdmType::Binary,
                Value::String(s),
            ) => {
                let raw = JsonValue::String(s.clone());
                self.deserialize(&raw, options)?;
                raw
            }
            (
                EdmType::Stream | EdmType::Geography | EdmType::Geometry | EdmType::Untyped,
                other,
            ) => other.to_json(),
            (_, other) => return Err(self.invalid(&other.to_json())),
        };
        Ok(json)
    }

    /// Typed value → OData URL literal.
    pub fn encode(self, value: &Value, options: &ParserOptions) -> CodecResult<String> {
        let wire = self.serialize(value, options)?;
        let literal = match (self, &wire) {
            (_, JsonValue::Null) => "null".to_string(),
            (EdmType::String, JsonValue::String(s)) => format!("'{}'", s.replace('\'', "''")),
            (EdmType::Duration, JsonValue::String(s)) => format!("duration'{}'", s),
            (EdmType::Binary, JsonValue::String(s)) => format!("binary'{}'", s),
            (_, JsonValue::String(s)) => s.clone(),
            (_, other) => other.to_string(),
        };
        Ok(literal)
    }

    fn in_range(self, n: i64) -> bool {
        match self {
            EdmType::Byte => (0..=u8::MAX as i64).contains(&n),
            EdmType::SByte => (i8::MIN as i64..=i8::MAX as i64).contains(&n),
            EdmType::Int16 => (i16::MIN as i64..=i16::MAX as i64).contains(&n),
            EdmType::Int32 => (i32::MIN as i64..=i32::MAX as i64).contains(&n),
            _ => true,
        }
    }

    fn invalid(self, raw: &JsonValue) -> CodecError {
        CodecError::InvalidValue {
            type_name: self.name().to_string(),
            value: raw.to_string(),
        }
    }
}

fn decimal_re() -> &'static Regex {
    static DECIMAL_RE: OnceLock<Regex> = OnceLock::new();
    DECIMAL_RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("Invalid regex")
    })
}

fn duration_re() -> &'static Regex {
    static DURATION_RE: OnceLock<Regex> = OnceLock::new();
    DURATION_RE.get_or_init(|| {
        Regex::new(
            r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d{1,9}))?S)?)?$",
        )
        .expect("Invalid regex")
    })
}

/// Exact decimal text → wire JSON.
///
/// A JSON number only when `f64` reproduces the same decimal value,
/// otherwise the text itself.
pub(crate) fn decimal_to_json(text: &str) -> JsonValue {
    if let Ok(i) = text.parse::<i64>() {
        return JsonValue::from(i);
    }
    let number = text
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64);
    match number {
        Some(n) if canonical_decimal(&n.to_string()) == canonical_decimal(text) => {
            JsonValue::Number(n)
        }
        _ => JsonValue::String(text.to_string()),
    }
}

/// Drops a leading `+` and fractional trailing zeros (`+1.50` → `1.5`).
fn canonical_decimal(text: &str) -> &str {
    let text = text.strip_prefix('+').unwrap_or(text);
    if !text.contains('.') || text.contains(['e', 'E']) {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

/// Parses an ISO-8601 day-time duration (`-P1DT2H3M4.5S`).
pub(crate) fn parse_duration(s: &str) -> Option<chrono::Duration> {
    if s == "P" || s == "-P" || s.ends_with('T') {
        return None;
    }
    let caps = duration_re().captures(s)?;
    let part = |i: usize| -> Option<i64> {
        caps.get(i)
            .map(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(Some(0))
    };
    let nanos = match caps.get(6) {
        Some(m) => format!("{:0<9}", m.as_str()).parse().ok()?,
        None => 0,
    };
    let total = chrono::Duration::try_days(part(2)?)?
        .checked_add(&chrono::Duration::try_hours(part(3)?)?)?
        .checked_add(&chrono::Duration::try_minutes(part(4)?)?)?
        .checked_add(&chrono::Duration::try_seconds(part(5)?)?)?
        .checked_add(&chrono::Duration::nanoseconds(nanos))?;
    Some(if caps.get(1).is_some() { -total } else { total })
}

/// Renders a duration in canonical ISO-8601 day-time form.
pub(crate) fn format_duration(d: &chrono::Duration) -> String {
    let negative = *d < chrono::Duration::zero();
    let abs = if negative { -*d } else { *d };
    let days = abs.num_days();
    let hours = abs.num_hours() % 24;
    let minutes = abs.num_minutes() % 60;
    let seconds = abs.num_seconds() % 60;
    let nanos = (abs - chrono::Duration::seconds(abs.num_seconds()))
        .num_nanoseconds()
        .unwrap_or(0);

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if nanos > 0 {
            let frac = format!("{:09}", nanos);
            out.push_str(&format!("{}.{}S", seconds, frac.trim_end_matches('0')));
        } else if seconds > 0 || (days == 0 && hours == 0 && minutes == 0) {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

/// Accepts both base64url and standard base64, padded or not.
fn decode_binary(s: &str) -> Option<Vec<u8>> {
    let normalized: String = s
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized.as_bytes()).ok()
}

/// Base64url (padded) rendering used on the wire.
pub(crate) fn encode_binary(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

/// RFC 3339 rendering used on the wire.
pub(crate) fn format_date_time(dt: &DateTime<chrono::FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
