//! # Parser Options
//!
//! Per-call context handed to every `serialize` / `deserialize` / `encode`.
//! The protocol version selects the annotation helper that knows where a
//! payload carries its runtime type.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::value::{Attributes, Value};

/// Wire protocol generation negotiated with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// OData 2.0 (verbose JSON, `__metadata`).
    V2,
    /// OData 3.0 (`odata.type`).
    V3,
    /// OData 4.0 / 4.01 (`@odata.type`).
    #[default]
    V4,
}

/// Extracts protocol-specific metadata keys from a payload.
pub trait AnnotationHelper: Send + Sync {
    /// Name of the key carrying the runtime type annotation.
    fn type_key(&self) -> &'static str;

    /// Qualified type name annotated on a raw wire object.
    fn type_annotation(&self, raw: &Map<String, JsonValue>) -> Option<String> {
        raw.get(self.type_key())
            .and_then(JsonValue::as_str)
            .map(strip_type_prefix)
    }

    /// Qualified type name annotated on a decoded attribute map.
    fn attributes_type(&self, attrs: &Attributes) -> Option<String> {
        attrs
            .get(self.type_key())
            .and_then(Value::as_str)
            .map(strip_type_prefix)
    }
}

/// `@odata.type` with a leading `#`.
#[derive(Debug, Default, Clone, Copy)]
pub struct V4Annotations;

impl AnnotationHelper for V4Annotations {
    fn type_key(&self) -> &'static str {
        "@odata.type"
    }
}

/// `odata.type`.
#[derive(Debug, Default, Clone, Copy)]
pub struct V3Annotations;

impl AnnotationHelper for V3Annotations {
    fn type_key(&self) -> &'static str {
        "odata.type"
    }
}

/// `__metadata: { type }`.
#[derive(Debug, Default, Clone, Copy)]
pub struct V2Annotations;

impl AnnotationHelper for V2Annotations {
    fn type_key(&self) -> &'static str {
        "__metadata"
    }

    fn type_annotation(&self, raw: &Map<String, JsonValue>) -> Option<String> {
        raw.get(self.type_key())
            .and_then(|meta| meta.get("type"))
            .and_then(JsonValue::as_str)
            .map(strip_type_prefix)
    }

    fn attributes_type(&self, attrs: &Attributes) -> Option<String> {
        match attrs.get(self.type_key())? {
            Value::Json(JsonValue::Object(meta)) => meta
                .get("type")
                .and_then(JsonValue::as_str)
                .map(strip_type_prefix),
            Value::Structured(meta) => meta
                .get("type")
                .and_then(Value::as_str)
                .map(strip_type_prefix),
            _ => None,
        }
    }
}

fn strip_type_prefix(name: &str) -> String {
    name.trim_start_matches('#').to_string()
}

/// Codec context ("ctx") shared by every codec call.
#[derive(Clone)]
pub struct ParserOptions {
    /// Protocol version of the payload being handled.
    pub version: ProtocolVersion,
    /// Emit bare enum members (`"Red, Blue"`) instead of qualified literals
    /// (`"NS.Color'Red, Blue'"`).
    pub string_as_enum: bool,
    /// Write `Edm.Int64` and `Edm.Decimal` as JSON strings.
    pub ieee754_compatible: bool,
    /// Replaces the version's default annotation helper.
    pub annotations: Option<Arc<dyn AnnotationHelper>>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::V4,
            string_as_enum: true,
            ieee754_compatible: false,
            annotations: None,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("version", &self.version)
            .field("string_as_enum", &self.string_as_enum)
            .field("ieee754_compatible", &self.ieee754_compatible)
            .field("annotations", &self.annotation_helper().type_key())
            .finish()
    }
}

static V4: V4Annotations = V4Annotations;
static V3: V3Annotations = V3Annotations;
static V2: V2Annotations = V2Annotations;

impl ParserOptions {
    /// Options for the given protocol version.
    pub fn for_version(version: ProtocolVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Sets the enum surface convention.
    pub fn with_string_as_enum(mut self, string_as_enum: bool) -> Self {
        self.string_as_enum = string_as_enum;
        self
    }

    /// Sets IEEE754 compatibility for 64-bit numbers.
    pub fn with_ieee754_compatible(mut self, ieee754_compatible: bool) -> Self {
        self.ieee754_compatible = ieee754_compatible;
        self
    }

    /// Installs a custom annotation helper.
    pub fn with_annotations(mut self, helper: Arc<dyn AnnotationHelper>) -> Self {
        self.annotations = Some(helper);
        self
    }

    /// The helper in effect for this call.
    pub fn annotation_helper(&self) -> &dyn AnnotationHelper {
        if let Some(helper) = &self.annotations {
            return helper.as_ref();
        }
        match self.version {
            ProtocolVersion::V4 => &V4,
            ProtocolVersion::V3 => &V3,
            ProtocolVersion::V2 => &V2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: JsonValue) -> Map<String, JsonValue> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_v4_strips_hash() {
        let raw = object(json!({"@odata.type": "#NS.Manager", "Name": "x"}));
        let opts = ParserOptions::default();
        assert_eq!(
            opts.annotation_helper().type_annotation(&raw).as_deref(),
            Some("NS.Manager")
        );
    }

    #[test]
    fn test_v3_and_v2_keys() {
        let v3 = object(json!({"odata.type": "NS.Manager"}));
        let v2 = object(json!({"__metadata": {"type": "NS.Manager", "uri": "x"}}));
        let o3 = ParserOptions::for_version(ProtocolVersion::V3);
        let o2 = ParserOptions::for_version(ProtocolVersion::V2);
        assert_eq!(
            o3.annotation_helper().type_annotation(&v3).as_deref(),
            Some("NS.Manager")
        );
        assert_eq!(
            o2.annotation_helper().type_annotation(&v2).as_deref(),
            Some("NS.Manager")
        );
        assert_eq!(o2.annotation_helper().type_annotation(&v3), None);
    }

    #[test]
    fn test_custom_helper_overrides_version() {
        struct Custom;
        impl AnnotationHelper for Custom {
            fn type_key(&self) -> &'static str {
                "$type"
            }
        }
        let opts = ParserOptions::default().with_annotations(Arc::new(Custom));
        let raw = object(json!({"$type": "NS.A"}));
        assert_eq!(
            opts.annotation_helper().type_annotation(&raw).as_deref(),
            Some("NS.A")
        );
    }
}
