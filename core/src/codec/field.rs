//! # Field Codec
//!
//! The per-property bridge between raw JSON and typed values. A field
//! delegates to whatever its declared type resolved to, maps collections
//! element-wise, and re-dispatches structured values to the most-derived
//! codec named by the payload's type annotation.

use serde_json::{json, Value as JsonValue};

use crate::csdl::{FieldConfig, ReferentialConfig};
use crate::error::{CodecError, CodecResult};
use crate::options::ParserOptions;
use crate::validation::{FieldErrors, Method, ValidateOptions, Violation};
use crate::value::{Attributes, Value};

use super::structured::JsonSchemaOptions;
use super::{Codec, CodecRef, FieldView, StructuredId, Vocabulary, CORE_COMPUTED, CORE_DESCRIPTION};
use crate::type_mapping::TypeMapper;

/// Codec for one property or parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCodec {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) collection: bool,
    pub(crate) nullable: bool,
    pub(crate) navigation: bool,
    pub(crate) max_length: Option<usize>,
    pub(crate) precision: Option<i64>,
    pub(crate) scale: Option<String>,
    pub(crate) computed: bool,
    pub(crate) description: Option<String>,
    pub(crate) referentials: Vec<ReferentialConfig>,
    pub(crate) ref_path: Option<String>,
    pub(crate) raw_default: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) codec: CodecRef,
}

impl FieldCodec {
    /// Unresolved field; `codec` and `default` are filled in by the registry.
    pub(crate) fn from_config(name: &str, config: &FieldConfig, vocabulary: &Vocabulary) -> Self {
        Self {
            name: name.to_string(),
            type_name: config.type_name.clone(),
            collection: config.collection,
            nullable: config.nullable.unwrap_or(true),
            navigation: config.navigation,
            max_length: config.max_length,
            precision: config.precision,
            scale: config.scale.clone(),
            computed: vocabulary
                .find(&config.annotations, CORE_COMPUTED)
                .and_then(|a| a.as_bool())
                .unwrap_or(false),
            description: vocabulary
                .find(&config.annotations, CORE_DESCRIPTION)
                .and_then(|a| a.as_str())
                .map(str::to_string),
            referentials: config.referentials.clone(),
            ref_path: config.ref_path.clone(),
            raw_default: config.default.clone(),
            default: None,
            codec: CodecRef::PassThrough,
        }
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared element type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared as `Collection(…)`.
    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// `Nullable`, `true` when undeclared.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Navigation property.
    pub fn is_navigation(&self) -> bool {
        self.navigation
    }

    /// Server-computed (`Core.Computed`).
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// `MaxLength`.
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// `Precision`.
    pub fn precision(&self) -> Option<i64> {
        self.precision
    }

    /// `Scale`.
    pub fn scale(&self) -> Option<&str> {
        self.scale.as_deref()
    }

    /// Referential constraints of a navigation property.
    pub fn referentials(&self) -> &[ReferentialConfig] {
        &self.referentials
    }

    /// Default value, already decoded through this field.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The resolved link.
    pub fn codec_ref(&self) -> CodecRef {
        self.codec
    }

    fn path(&self) -> impl Iterator<Item = &str> {
        self.ref_path
            .as_deref()
            .unwrap_or(&self.name)
            .split(['.', '/'])
            .filter(|s| !s.is_empty())
    }

    /// Extracts this field's raw value from a containing wire object.
    pub fn resolve<'a>(&self, container: &'a JsonValue) -> Option<&'a JsonValue> {
        self.path().try_fold(container, |current, segment| {
            current.as_object()?.get(segment)
        })
    }

    /// Extracts this field's value from a decoded attribute map.
    pub fn resolve_value<'a>(&self, attrs: &'a Attributes) -> Option<&'a Value> {
        let mut segments = self.path();
        let first = segments.next()?;
        segments.try_fold(attrs.get(first)?, |current, segment| {
            current.as_attributes()?.get(segment)
        })
    }
}

impl<'r> FieldView<'r> {
    /// The codec the declared type resolved to.
    pub fn codec(&self) -> Codec<'r> {
        self.registry().get(self.codec)
    }

    /// Wire JSON → typed value.
    pub fn deserialize(&self, raw: &JsonValue, options: &ParserOptions) -> CodecResult<Value> {
        match raw {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(items) if self.collection => items
                .iter()
                .map(|item| self.deserialize_element(item, options))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Collection),
            _ if self.collection => Err(self.invalid(raw)),
            _ => self.deserialize_element(raw, options),
        }
    }

    /// Decodes one element, ignoring the collection flag.
    pub(crate) fn deserialize_element(
        &self,
        raw: &JsonValue,
        options: &ParserOptions,
    ) -> CodecResult<Value> {
        let codec = match (self.codec(), raw) {
            (Codec::Structured(declared), JsonValue::Object(obj)) => {
                match options.annotation_helper().type_annotation(obj) {
                    Some(runtime) if !declared.is_type_of(&runtime) => {
                        match declared.child_parser(|c| c.is_type_of(&runtime)) {
                            Codec::PassThrough => Codec::Structured(declared),
                            derived => derived,
                        }
                    }
                    _ => Codec::Structured(declared),
                }
            }
            (codec, _) => codec,
        };
        codec.deserialize(raw, options)
    }

    /// Typed value → wire JSON.
    pub fn serialize(&self, value: &Value, options: &ParserOptions) -> CodecResult<JsonValue> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::Collection(items) if self.collection => items
                .iter()
                .map(|item| self.serialize_element(item, options))
                .collect::<CodecResult<Vec<_>>>()
                .map(JsonValue::Array),
            Value::Json(raw @ JsonValue::Array(_)) if self.collection => Ok(raw.clone()),
            other if self.collection => Err(self.invalid(&other.to_json())),
            other => self.serialize_element(other, options),
        }
    }

    fn serialize_element(&self, value: &Value, options: &ParserOptions) -> CodecResult<JsonValue> {
        let codec = match (self.codec(), value) {
            (Codec::Structured(declared), Value::Structured(attrs)) => {
                match options.annotation_helper().attributes_type(attrs) {
                    Some(runtime) if !declared.is_type_of(&runtime) => {
                        match declared.child_parser(|c| c.is_type_of(&runtime)) {
                            Codec::PassThrough => Codec::Structured(declared),
                            derived => derived,
                        }
                    }
                    _ => Codec::Structured(declared),
                }
            }
            (codec, _) => codec,
        };
        codec.serialize(value, options)
    }

    /// Typed value → URL literal. Collections are written as JSON arrays.
    pub fn encode(&self, value: &Value, options: &ParserOptions) -> CodecResult<String> {
        if self.collection {
            return Ok(self.serialize(value, options)?.to_string());
        }
        self.codec().encode(value, options)
    }

    /// Checks one value of this field; `None` is an absent value.
    pub fn validate(
        &self,
        value: Option<&Value>,
        options: &ValidateOptions,
    ) -> Option<FieldErrors> {
        match value {
            Some(Value::Collection(items)) if self.collection => {
                let results: Vec<Option<FieldErrors>> = items
                    .iter()
                    .map(|item| self.validate_element(item, options))
                    .collect();
                results
                    .iter()
                    .any(Option::is_some)
                    .then_some(FieldErrors::Collection(results))
            }
            Some(v) if !v.is_null() => self.validate_element(v, options),
            _ => self
                .is_required(value.is_none(), options)
                .then(|| FieldErrors::Codes(vec![Violation::Required])),
        }
    }

    fn is_required(&self, absent: bool, options: &ValidateOptions) -> bool {
        if self.nullable {
            return false;
        }
        if self.computed && options.method == Some(Method::Create) {
            return false;
        }
        !(absent && options.method == Some(Method::Modify))
    }

    fn validate_element(&self, value: &Value, options: &ValidateOptions) -> Option<FieldErrors> {
        match (self.codec(), value) {
            (Codec::Structured(s), Value::Structured(attrs)) => {
                s.validate(attrs, options).map(FieldErrors::Nested)
            }
            (Codec::Enum(e), v) => e.validate(v).map(FieldErrors::Codes),
            (_, v) => {
                let too_long = match (self.max_length, v.as_str()) {
                    (Some(max), Some(s)) => s.chars().count() > max,
                    _ => false,
                };
                too_long.then(|| FieldErrors::Codes(vec![Violation::MaxLength]))
            }
        }
    }

    /// Draft-07 fragment for this field. `stack` holds the structured types
    /// already being emitted, which are written as `$ref`s instead.
    pub(crate) fn json_schema(
        &self,
        options: &JsonSchemaOptions,
        stack: &[StructuredId],
    ) -> JsonValue {
        let mut schema = match self.codec() {
            Codec::Primitive(edm) => options.mapper.map(edm).to_json(),
            Codec::Enum(e) => e.to_json_schema(),
            Codec::Structured(s) if stack.contains(&s.id) => json!({"$ref": s.full_name()}),
            Codec::Structured(s) => {
                let nested = match options.expand.get(&self.name) {
                    Some(expanded) => expanded.clone(),
                    None => JsonSchemaOptions::default().with_mapper(options.mapper),
                };
                s.object_schema(&nested, stack)
            }
            Codec::Callable(_) | Codec::PassThrough => json!({}),
        };

        if let Some(obj) = schema.as_object_mut() {
            obj.entry("title").or_insert_with(|| json!(self.name));
            if let Some(description) = &self.description {
                obj.insert("description".into(), json!(description));
            }
            if let Some(max) = self.max_length {
                if obj.get("type") == Some(&json!("string")) {
                    obj.insert("maxLength".into(), json!(max));
                }
            }
        }

        if self.collection {
            schema = json!({
                "type": "array",
                "items": schema,
                "additionalItems": false,
            });
        }

        if self.nullable {
            if let Some(obj) = schema.as_object_mut() {
                if let Some(JsonValue::String(t)) = obj.get("type").cloned() {
                    obj.insert("type".into(), json!([t, "null"]));
                }
            }
        }

        match options.custom.get(&self.name) {
            Some(hook) => hook(schema),
            None => schema,
        }
    }

    fn invalid(&self, raw: &JsonValue) -> CodecError {
        CodecError::InvalidValue {
            type_name: format!("Collection({})", self.type_name),
            value: raw.to_string(),
        }
    }
}
