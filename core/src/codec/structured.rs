//! # Structured Type Codec
//!
//! Entity and complex types. Inherited fields are always handled by the
//! parent codec first, then this type's own fields are overlaid.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Map, Value as JsonValue};

use crate::csdl::{KeyConfig, StructuredKind, StructuredTypeConfig};
use crate::error::{CodecError, CodecResult};
use crate::options::ParserOptions;
use crate::type_mapping::EdmToJsonMapper;
use crate::validation::{ErrorsByField, ValidateOptions};
use crate::value::{Attributes, Value};

use super::{
    is_qualified_as, Codec, FieldCodec, FieldView, StructuredId, StructuredView, Vocabulary,
    CORE_DESCRIPTION,
};

const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// Codec for one `EntityType` or `ComplexType`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredCodec {
    pub(crate) id: StructuredId,
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) alias: Option<String>,
    pub(crate) kind: StructuredKind,
    pub(crate) base: Option<String>,
    pub(crate) open: bool,
    pub(crate) r#abstract: bool,
    pub(crate) keys: Vec<KeyConfig>,
    pub(crate) fields: IndexMap<String, FieldCodec>,
    pub(crate) description: Option<String>,
    pub(crate) parent: Option<StructuredId>,
    pub(crate) children: Vec<StructuredId>,
}

impl StructuredCodec {
    /// Unlinked codec; `parent`, `children` and field codecs are set by the
    /// registry.
    pub(crate) fn from_config(
        id: StructuredId,
        config: &StructuredTypeConfig,
        vocabulary: &Vocabulary,
    ) -> Self {
        Self {
            id,
            name: config.name.clone(),
            namespace: config.namespace.clone(),
            alias: config.alias.clone(),
            kind: config.kind,
            base: config.base.clone(),
            open: config.open,
            r#abstract: config.r#abstract,
            keys: config.keys.clone(),
            fields: config
                .fields
                .iter()
                .map(|(name, field)| {
                    (name.clone(), FieldCodec::from_config(name, field, vocabulary))
                })
                .collect(),
            description: vocabulary
                .find(&config.annotations, CORE_DESCRIPTION)
                .and_then(|a| a.as_str())
                .map(str::to_string),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Arena index in the owning registry.
    pub fn id(&self) -> StructuredId {
        self.id
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

    /// Declaring element.
    pub fn kind(&self) -> StructuredKind {
        self.kind
    }

    /// Raw base type name as declared.
    pub fn base_type(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Accepts undeclared properties.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Declared `Abstract`.
    pub fn is_abstract(&self) -> bool {
        self.r#abstract
    }

    /// Membership test against `Namespace.Name` and `Alias.Name`.
    pub fn is_type_of(&self, name: &str) -> bool {
        is_qualified_as(&self.namespace, self.alias.as_deref(), &self.name, name)
    }
}

/// A resolved entity key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    /// Exactly one key property.
    Single(JsonValue),
    /// Key name → value, in key order.
    Composite(IndexMap<String, JsonValue>),
}

impl KeyValue {
    /// JSON rendering: the bare scalar or an object.
    pub fn to_json(&self) -> JsonValue {
        match self {
            KeyValue::Single(v) => v.clone(),
            KeyValue::Composite(map) => {
                JsonValue::Object(map.clone().into_iter().collect())
            }
        }
    }
}

/// Post-processes one field's generated schema.
pub type JsonSchemaHook = Arc<dyn Fn(JsonValue) -> JsonValue + Send + Sync>;

/// Options for JSON-Schema emission.
#[derive(Clone, Default)]
pub struct JsonSchemaOptions {
    /// Properties to emit; empty emits all.
    pub select: Vec<String>,
    /// Navigation properties to include, with options for their target type.
    pub expand: IndexMap<String, JsonSchemaOptions>,
    /// Field name → hook applied to that field's schema.
    pub custom: IndexMap<String, JsonSchemaHook>,
    /// Edm primitive table.
    pub mapper: EdmToJsonMapper,
}

impl fmt::Debug for JsonSchemaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaOptions")
            .field("select", &self.select)
            .field("expand", &self.expand)
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl JsonSchemaOptions {
    /// Restricts emitted properties.
    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Includes a navigation property.
    pub fn with_expand(mut self, field: impl Into<String>, nested: JsonSchemaOptions) -> Self {
        self.expand.insert(field.into(), nested);
        self
    }

    /// Installs a per-field hook.
    pub fn with_custom<F>(mut self, field: impl Into<String>, hook: F) -> Self
    where
        F: Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.custom.insert(field.into(), Arc::new(hook));
        self
    }

    /// Replaces the Edm primitive table.
    pub fn with_mapper(mut self, mapper: EdmToJsonMapper) -> Self {
        self.mapper = mapper;
        self
    }
}

impl<'r> StructuredView<'r> {
    /// Base type codec.
    pub fn parent(&self) -> Option<StructuredView<'r>> {
        self.parent.and_then(|id| self.registry().structured_at(id))
    }

    /// Directly derived types.
    pub fn children(&self) -> impl Iterator<Item = StructuredView<'r>> + 'r {
        let registry = self.registry();
        self.get()
            .children
            .iter()
            .filter_map(move |id| registry.structured_at(*id))
    }

    /// Fields declared on this type only.
    pub fn own_fields(&self) -> impl Iterator<Item = FieldView<'r>> + 'r {
        let registry = self.registry();
        self.get()
            .fields
            .values()
            .map(move |f| FieldView::new(registry, f))
    }

    /// All fields, inherited first.
    pub fn fields(&self) -> Vec<FieldView<'r>> {
        let mut out = self.parent().map(|p| p.fields()).unwrap_or_default();
        out.extend(self.own_fields());
        out
    }

    /// Own or inherited field by name.
    pub fn field(&self, name: &str) -> Option<FieldView<'r>> {
        match self.get().fields.get(name) {
            Some(f) => Some(FieldView::new(self.registry(), f)),
            None => self.parent()?.field(name),
        }
    }

    /// Key properties, inherited first.
    pub fn keys(&self) -> Vec<&'r KeyConfig> {
        let mut out = self.parent().map(|p| p.keys()).unwrap_or_default();
        out.extend(self.get().keys.iter());
        out
    }

    /// Has a key somewhere in its inheritance chain.
    pub fn is_entity(&self) -> bool {
        !self.keys().is_empty()
    }

    /// Wire JSON → [`Value::Structured`].
    pub fn deserialize(&self, raw: &JsonValue, options: &ParserOptions) -> CodecResult<Value> {
        match raw {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Object(obj) => self.deserialize_attrs(obj, options).map(Value::Structured),
            _ => Err(self.expected_object()),
        }
    }

    fn deserialize_attrs(
        &self,
        obj: &Map<String, JsonValue>,
        options: &ParserOptions,
    ) -> CodecResult<Attributes> {
        let mut attrs = match self.parent() {
            Some(parent) => parent.deserialize_attrs(obj, options)?,
            None => obj
                .iter()
                .map(|(k, v)| (k.clone(), Value::untyped(v)))
                .collect(),
        };
        for field in self.own_fields() {
            if let Some(raw) = obj.get(field.name()).filter(|raw| !raw.is_null()) {
                attrs.insert(field.name().to_string(), field.deserialize(raw, options)?);
            }
        }
        Ok(attrs)
    }

    /// Typed value → wire JSON object.
    pub fn serialize(&self, value: &Value, options: &ParserOptions) -> CodecResult<JsonValue> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::Structured(attrs) => self.serialize_attrs(attrs, options).map(JsonValue::Object),
            Value::Json(raw @ JsonValue::Object(_)) => Ok(raw.clone()),
            _ => Err(self.expected_object()),
        }
    }

    fn serialize_attrs(
        &self,
        attrs: &Attributes,
        options: &ParserOptions,
    ) -> CodecResult<Map<String, JsonValue>> {
        let mut out = match self.parent() {
            Some(parent) => parent.serialize_attrs(attrs, options)?,
            None => attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        };
        for field in self.own_fields() {
            if let Some(value) = attrs.get(field.name()).filter(|v| !v.is_null()) {
                out.insert(field.name().to_string(), field.serialize(value, options)?);
            }
        }
        Ok(out)
    }

    /// Key of an instance, or `None` when any component is missing or the
    /// type has no key.
    pub fn resolve_key(&self, attrs: &Attributes, options: &ParserOptions) -> Option<KeyValue> {
        let keys = self.keys();
        if keys.is_empty() {
            return None;
        }

        let mut resolved = IndexMap::new();
        for key in keys {
            let value = self.key_component(&key.name, attrs, options)?;
            let name = key.alias.as_ref().unwrap_or(&key.name);
            resolved.insert(name.clone(), value);
        }

        if resolved.len() == 1 {
            resolved.into_values().next().map(KeyValue::Single)
        } else {
            Some(KeyValue::Composite(resolved))
        }
    }

    /// Walks a key path (`Id`, `Address/City`) through nested complex fields.
    fn key_component(
        &self,
        path: &str,
        attrs: &Attributes,
        options: &ParserOptions,
    ) -> Option<JsonValue> {
        let mut owner = *self;
        let mut container = attrs;
        let mut segments = path.split(['/', '.']).peekable();
        while let Some(segment) = segments.next() {
            let field = owner.field(segment)?;
            let value = field.resolve_value(container)?;
            if segments.peek().is_none() {
                if value.is_null() {
                    return None;
                }
                return field.serialize(value, options).ok();
            }
            container = value.as_attributes()?;
            owner = match field.codec() {
                Codec::Structured(nested) => nested,
                _ => return None,
            };
        }
        None
    }

    /// Declared defaults, inherited first, recursing into complex fields.
    pub fn defaults(&self) -> Attributes {
        self.defaults_guarded(&mut Vec::new())
    }

    fn defaults_guarded(&self, stack: &mut Vec<StructuredId>) -> Attributes {
        stack.push(self.id);
        let mut out = self
            .parent()
            .map(|p| p.defaults_guarded(stack))
            .unwrap_or_default();
        for field in self.own_fields() {
            if let Some(default) = field.default_value() {
                out.insert(field.name().to_string(), default.clone());
                continue;
            }
            if field.is_collection() || field.is_navigation() {
                continue;
            }
            if let Codec::Structured(nested) = field.codec() {
                if !stack.contains(&nested.id) {
                    let inner = nested.defaults_guarded(stack);
                    if !inner.is_empty() {
                        out.insert(field.name().to_string(), Value::Structured(inner));
                    }
                }
            }
        }
        stack.pop();
        out
    }

    /// Draft-07 schema document for this type.
    pub fn to_json_schema(&self, options: &JsonSchemaOptions) -> JsonValue {
        let mut out = Map::new();
        out.insert("$schema".into(), json!(JSON_SCHEMA_DRAFT));
        if let JsonValue::Object(body) = self.object_schema(options, &[]) {
            out.extend(body);
        }
        JsonValue::Object(out)
    }

    pub(crate) fn object_schema(
        &self,
        options: &JsonSchemaOptions,
        stack: &[StructuredId],
    ) -> JsonValue {
        let mut inner = stack.to_vec();
        inner.push(self.id);

        let mut properties = Map::new();
        let mut required = Vec::new();
        self.collect_properties(options, &inner, &mut properties, &mut required);

        let mut schema = Map::new();
        schema.insert("$id".into(), json!(self.full_name()));
        schema.insert("title".into(), json!(self.name));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), JsonValue::Object(properties));
        schema.insert("required".into(), json!(required));
        JsonValue::Object(schema)
    }

    fn collect_properties(
        &self,
        options: &JsonSchemaOptions,
        stack: &[StructuredId],
        properties: &mut Map<String, JsonValue>,
        required: &mut Vec<String>,
    ) {
        if let Some(parent) = self.parent() {
            parent.collect_properties(options, stack, properties, required);
        }
        for field in self.own_fields() {
            let name = field.name();
            let expanded = options.expand.contains_key(name);
            if field.is_navigation() && !expanded {
                continue;
            }
            let selected = options.select.is_empty() || options.select.iter().any(|s| s == name);
            if !selected && !expanded {
                continue;
            }
            properties.insert(name.to_string(), field.json_schema(options, stack));
            if !field.is_nullable() && !required.iter().any(|r| r == name) {
                required.push(name.to_string());
            }
        }
    }

    /// Field-keyed violations, `None` when the value is valid.
    pub fn validate(&self, attrs: &Attributes, options: &ValidateOptions) -> Option<ErrorsByField> {
        let mut errors = self
            .parent()
            .and_then(|p| p.validate(attrs, options))
            .unwrap_or_default();
        for field in self.own_fields() {
            if field.is_navigation() && !options.navigation {
                continue;
            }
            if let Some(found) = field.validate(attrs.get(field.name()), options) {
                errors.insert(field.name().to_string(), found);
            }
        }
        (!errors.is_empty()).then_some(errors)
    }

    /// First match in a depth-first walk of this type and its descendants.
    pub fn child_parser<F>(&self, predicate: F) -> Codec<'r>
    where
        F: Fn(&StructuredView<'r>) -> bool,
    {
        self.find_descendant(&predicate)
            .map(Codec::Structured)
            .unwrap_or(Codec::PassThrough)
    }

    fn find_descendant<F>(&self, predicate: &F) -> Option<StructuredView<'r>>
    where
        F: Fn(&StructuredView<'r>) -> bool,
    {
        if predicate(self) {
            return Some(*self);
        }
        self.children()
            .find_map(|child| child.find_descendant(predicate))
    }

    fn expected_object(&self) -> CodecError {
        CodecError::ExpectedObject {
            type_name: self.full_name(),
        }
    }
}
