//! # Enum Codec
//!
//! Member names ↔ backing numbers. Flags enums decode a comma-separated
//! member set into the OR of its values and encode a bitmask back into the
//! smallest member set that reproduces it.

use indexmap::IndexMap;
use serde_json::{json, Value as JsonValue};

use crate::csdl::EnumTypeConfig;
use crate::error::{CodecError, CodecResult};
use crate::options::ParserOptions;
use crate::validation::Violation;
use crate::value::Value;

use super::is_qualified_as;

/// Separator written between flag members.
const MEMBER_SEPARATOR: &str = ", ";

/// Codec for one `EnumType`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumCodec {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) alias: Option<String>,
    pub(crate) flags: bool,
    pub(crate) members: IndexMap<String, i64>,
}

impl EnumCodec {
    pub(crate) fn from_config(config: &EnumTypeConfig) -> Self {
        Self {
            name: config.name.clone(),
            namespace: config.namespace.clone(),
            alias: config.alias.clone(),
            flags: config.flags,
            members: config.members.clone(),
        }
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `Namespace.Name`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Whether members combine as bits.
    pub fn is_flags(&self) -> bool {
        self.flags
    }

    /// Member name → value, in declaration order.
    pub fn members(&self) -> &IndexMap<String, i64> {
        &self.members
    }

    /// Membership test against `Namespace.Name` and `Alias.Name`.
    pub fn is_type_of(&self, name: &str) -> bool {
        is_qualified_as(&self.namespace, self.alias.as_deref(), &self.name, name)
    }

    /// Wire JSON → [`Value::Enum`].
    ///
    /// Accepts the bare form (`"Red, Blue"`), the qualified literal
    /// (`"NS.Color'Red, Blue'"`) and plain numbers.
    pub fn deserialize(&self, raw: &JsonValue, _options: &ParserOptions) -> CodecResult<Value> {
        match raw {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Number(n) => {
                let bits = n.as_i64().ok_or_else(|| self.invalid(&raw.to_string()))?;
                self.member_names(bits)?;
                Ok(Value::Enum(bits))
            }
            JsonValue::String(s) => self.parse_members(s).map(Value::Enum),
            other => Err(self.invalid(&other.to_string())),
        }
    }

    /// Typed value → wire JSON, honouring `string_as_enum`.
    pub fn serialize(&self, value: &Value, options: &ParserOptions) -> CodecResult<JsonValue> {
        let bits = match self.bits_of(value)? {
            Some(bits) => bits,
            None => return Ok(JsonValue::Null),
        };
        let joined = self.member_names(bits)?.join(MEMBER_SEPARATOR);
        Ok(JsonValue::String(if options.string_as_enum {
            joined
        } else {
            format!("{}'{}'", self.full_name(), joined)
        }))
    }

    /// Typed value → URL literal (`NS.Color'Red,Blue'`).
    pub fn encode(&self, value: &Value, _options: &ParserOptions) -> CodecResult<String> {
        match self.bits_of(value)? {
            Some(bits) => Ok(format!(
                "{}'{}'",
                self.full_name(),
                self.member_names(bits)?.join(",")
            )),
            None => Ok("null".to_string()),
        }
    }

    /// Reports `mismatch` when the value is not made of declared members.
    pub fn validate(&self, value: &Value) -> Option<Vec<Violation>> {
        let ok = match value {
            Value::Null => true,
            other => matches!(
                self.bits_of(other),
                Ok(Some(bits)) if self.member_names(bits).is_ok()
            ),
        };
        (!ok).then(|| vec![Violation::Mismatch])
    }

    /// Draft-07 fragment listing the member names.
    pub fn to_json_schema(&self) -> JsonValue {
        json!({
            "title": self.name,
            "type": "string",
            "enum": self.members.keys().collect::<Vec<_>>(),
        })
    }

    /// Member names whose OR is `bits`, in declaration order.
    ///
    /// Single-valued enums require an exact member. Flags pick a minimal cover:
    /// widest members first, then any member the others already cover is
    /// dropped.
    pub fn member_names(&self, bits: i64) -> CodecResult<Vec<&str>> {
        if !self.flags {
            return self
                .members
                .iter()
                .find(|(_, v)| **v == bits)
                .map(|(name, _)| vec![name.as_str()])
                .ok_or_else(|| self.unknown_value(bits));
        }

        if bits == 0 {
            return Ok(self
                .members
                .iter()
                .find(|(_, v)| **v == 0)
                .map(|(name, _)| vec![name.as_str()])
                .unwrap_or_default());
        }

        let mut candidates: Vec<(usize, i64)> = self
            .members
            .values()
            .enumerate()
            .filter(|(_, v)| **v != 0 && **v & bits == **v)
            .map(|(i, v)| (i, *v))
            .collect();
        candidates.sort_by_key(|(i, v)| (std::cmp::Reverse(v.count_ones()), *i));

        let mut chosen = Vec::new();
        let mut covered = 0i64;
        for (index, value) in candidates {
            if value & !covered != 0 {
                chosen.push((index, value));
                covered |= value;
            }
        }
        if covered != bits {
            return Err(self.unknown_value(bits));
        }

        let mut position = 0;
        while position < chosen.len() {
            let others = chosen
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != position)
                .fold(0i64, |acc, (_, (_, v))| acc | v);
            if others == bits {
                chosen.remove(position);
            } else {
                position += 1;
            }
        }

        chosen.sort_by_key(|(i, _)| *i);
        Ok(chosen
            .into_iter()
            .filter_map(|(i, _)| self.members.get_index(i))
            .map(|(name, _)| name.as_str())
            .collect())
    }

    fn parse_members(&self, text: &str) -> CodecResult<i64> {
        let inner = match text.split_once('\'') {
            Some((prefix, rest)) => {
                let body = rest
                    .strip_suffix('\'')
                    .ok_or_else(|| self.invalid(text))?;
                if !prefix.is_empty() && !self.is_type_of(prefix) {
                    return Err(self.invalid(text));
                }
                body
            }
            None => text,
        };

        let names: Vec<&str> = inner
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            if self.flags {
                return Ok(0);
            }
            return Err(self.unknown_member(inner));
        }
        if !self.flags && names.len() > 1 {
            return Err(self.invalid(text));
        }

        names.into_iter().try_fold(0i64, |acc, name| {
            let value = match self.members.get(name) {
                Some(v) => *v,
                None => {
                    let numeric = name.parse::<i64>().map_err(|_| self.unknown_member(name))?;
                    self.member_names(numeric)?;
                    numeric
                }
            };
            Ok(acc | value)
        })
    }

    fn bits_of(&self, value: &Value) -> CodecResult<Option<i64>> {
        match value {
            Value::Null => Ok(None),
            Value::Enum(bits) | Value::Integer(bits) => Ok(Some(*bits)),
            Value::String(s) => self.parse_members(s).map(Some),
            Value::Json(raw) => match self.deserialize(raw, &ParserOptions::default())? {
                Value::Enum(bits) => Ok(Some(bits)),
                _ => Ok(None),
            },
            other => Err(self.invalid(&other.to_json().to_string())),
        }
    }

    fn unknown_member(&self, member: &str) -> CodecError {
        CodecError::UnknownMember {
            type_name: self.full_name(),
            member: member.to_string(),
        }
    }

    fn unknown_value(&self, value: i64) -> CodecError {
        CodecError::UnknownValue {
            type_name: self.full_name(),
            value,
        }
    }

    fn invalid(&self, value: &str) -> CodecError {
        CodecError::InvalidValue {
            type_name: self.full_name(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn color() -> EnumCodec {
        EnumCodec {
            name: "Color".into(),
            namespace: "NS".into(),
            alias: Some("self".into()),
            flags: true,
            members: IndexMap::from([
                ("Red".to_string(), 1),
                ("Green".to_string(), 2),
                ("Blue".to_string(), 4),
            ]),
        }
    }

    fn size() -> EnumCodec {
        EnumCodec {
            name: "Size".into(),
            namespace: "NS".into(),
            alias: None,
            flags: false,
            members: IndexMap::from([("Small".to_string(), 0), ("Large".to_string(), 10)]),
        }
    }

    #[test]
    fn test_flags_serialize_bare_and_qualified() {
        let codec = color();
        let bare = ParserOptions::default();
        let qualified = ParserOptions::default().with_string_as_enum(false);
        assert_eq!(
            codec.serialize(&Value::Enum(5), &bare).unwrap(),
            json!("Red, Blue")
        );
        assert_eq!(
            codec.serialize(&Value::Enum(5), &qualified).unwrap(),
            json!("NS.Color'Red, Blue'")
        );
    }

    #[test]
    fn test_flags_deserialize_both_forms() {
        let codec = color();
        let opts = ParserOptions::default();
        assert_eq!(
            codec.deserialize(&json!("Red, Blue"), &opts).unwrap(),
            Value::Enum(5)
        );
        assert_eq!(
            codec.deserialize(&json!("NS.Color'Red,Blue'"), &opts).unwrap(),
            Value::Enum(5)
        );
        assert_eq!(
            codec.deserialize(&json!("self.Color'Green'"), &opts).unwrap(),
            Value::Enum(2)
        );
        assert_eq!(codec.deserialize(&json!(6), &opts).unwrap(), Value::Enum(6));
    }

    #[test]
    fn test_unknown_member_is_an_error() {
        let codec = color();
        let err = codec
            .deserialize(&json!("Red, Purple"), &ParserOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownMember {
                type_name: "NS.Color".into(),
                member: "Purple".into()
            }
        );
    }

    #[test]
    fn test_minimal_cover_prefers_composite_members() {
        let mut codec = color();
        codec.members.insert("White".to_string(), 7);
        assert_eq!(codec.member_names(7).unwrap(), vec!["White"]);
        assert_eq!(codec.member_names(3).unwrap(), vec!["Red", "Green"]);
    }

    #[test]
    fn test_leftover_bits_rejected() {
        assert!(matches!(
            color().member_names(8),
            Err(CodecError::UnknownValue { value: 8, .. })
        ));
    }

    #[test]
    fn test_single_valued() {
        let codec = size();
        let opts = ParserOptions::default();
        assert_eq!(
            codec.deserialize(&json!("Large"), &opts).unwrap(),
            Value::Enum(10)
        );
        assert_eq!(
            codec.serialize(&Value::Enum(0), &opts).unwrap(),
            json!("Small")
        );
        assert!(codec.deserialize(&json!("Small, Large"), &opts).is_err());
        assert!(codec.serialize(&Value::Enum(3), &opts).is_err());
    }

    #[test]
    fn test_encode_literal() {
        let opts = ParserOptions::default();
        assert_eq!(
            color().encode(&Value::Enum(3), &opts).unwrap(),
            "NS.Color'Red,Green'"
        );
        assert_eq!(color().encode(&Value::Null, &opts).unwrap(), "null");
    }

    #[test]
    fn test_validate() {
        let codec = color();
        assert_eq!(codec.validate(&Value::Enum(5)), None);
        assert_eq!(codec.validate(&Value::from("Red, Blue")), None);
        assert_eq!(
            codec.validate(&Value::from("Red, Pink")),
            Some(vec![Violation::Mismatch])
        );
        assert_eq!(
            codec.validate(&Value::Enum(16)),
            Some(vec![Violation::Mismatch])
        );
    }

    #[test]
    fn test_json_schema() {
        assert_eq!(
            size().to_json_schema(),
            json!({"title": "Size", "type": "string", "enum": ["Small", "Large"]})
        );
    }
}
