//! # Configuration Models
//!
//! Strongly-shaped configuration produced by the CSDL parser. Nothing here is
//! resolved: type names are raw qualified strings and are only linked to
//! codecs by the registry.

use chrono::NaiveDate;
use derive_more::Display;
use indexmap::IndexMap;

/// The one protocol version this parser accepts.
pub const SUPPORTED_VERSION: &str = "4.0";

/// One parsed metadata document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaDocument {
    /// Root `Version` attribute.
    pub version: String,
    /// External schema references.
    pub references: Vec<ReferenceConfig>,
    /// Schemas in declaration order.
    pub schemas: Vec<SchemaConfig>,
}

impl SchemaDocument {
    /// Every structured type across all schemas.
    pub fn structured_types(&self) -> impl Iterator<Item = &StructuredTypeConfig> {
        self.schemas.iter().flat_map(|s| s.structured_types.iter())
    }

    /// Every enum type across all schemas.
    pub fn enum_types(&self) -> impl Iterator<Item = &EnumTypeConfig> {
        self.schemas.iter().flat_map(|s| s.enum_types.iter())
    }

    /// Every function and action across all schemas.
    pub fn callables(&self) -> impl Iterator<Item = &CallableConfig> {
        self.schemas.iter().flat_map(|s| s.callables.iter())
    }
}

/// `edmx:Reference`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceConfig {
    /// Referenced document URI.
    pub uri: String,
    /// Included namespaces.
    pub includes: Vec<IncludeConfig>,
    /// Included annotation vocabularies.
    pub include_annotations: Vec<IncludeAnnotationsConfig>,
}

/// `edmx:Include`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncludeConfig {
    /// Included namespace.
    pub namespace: String,
    /// Local alias for the namespace.
    pub alias: Option<String>,
}

/// `edmx:IncludeAnnotations`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncludeAnnotationsConfig {
    /// Vocabulary namespace.
    pub term_namespace: String,
    /// Optional qualifier filter.
    pub qualifier: Option<String>,
    /// Optional target namespace filter.
    pub target_namespace: Option<String>,
}

/// `edm:Schema`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaConfig {
    /// Schema namespace.
    pub namespace: String,
    /// Schema alias.
    pub alias: Option<String>,
    /// Enumerations.
    pub enum_types: Vec<EnumTypeConfig>,
    /// Entity and complex types.
    pub structured_types: Vec<StructuredTypeConfig>,
    /// Functions and actions.
    pub callables: Vec<CallableConfig>,
    /// Type definitions.
    pub type_definitions: Vec<TypeDefinitionConfig>,
    /// Entity containers.
    pub containers: Vec<EntityContainerConfig>,
    /// Vocabulary terms.
    pub terms: Vec<TermConfig>,
    /// Schema-level annotations.
    pub annotations: Vec<AnnotationConfig>,
}

/// Inline value of an `Annotation` element.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// `String="…"`
    String(String),
    /// `Bool="…"`
    Bool(bool),
    /// `Int="…"`
    Int(i64),
    /// `Float="…"`
    Float(String),
    /// `Decimal="…"`
    Decimal(String),
    /// `Date="…"`
    Date(NaiveDate),
    /// `EnumMember="…"`
    EnumMember(String),
    /// `Path="…"`
    Path(String),
}

/// `edm:Annotation`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationConfig {
    /// Qualified term name as written (may use an alias).
    pub term: String,
    /// Optional qualifier.
    pub qualifier: Option<String>,
    /// Inline value; `None` for expression-valued or bare annotations.
    pub value: Option<AnnotationValue>,
}

impl AnnotationConfig {
    /// Boolean reading of the annotation; a bare term means `true`.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            None => Some(true),
            Some(AnnotationValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// String reading of the annotation.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Some(AnnotationValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Entity types carry a key, complex types do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum StructuredKind {
    /// `edm:EntityType`
    #[default]
    #[display("EntityType")]
    Entity,
    /// `edm:ComplexType`
    #[display("ComplexType")]
    Complex,
}

/// `edm:EntityType` / `edm:ComplexType`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredTypeConfig {
    /// Simple name.
    pub name: String,
    /// Owning namespace.
    pub namespace: String,
    /// Owning schema alias.
    pub alias: Option<String>,
    /// Declaring element.
    pub kind: StructuredKind,
    /// Raw qualified base type name, resolved later.
    pub base: Option<String>,
    /// Accepts undeclared properties.
    pub open: bool,
    /// Cannot be instantiated directly.
    pub r#abstract: bool,
    /// Entity has a media stream.
    pub has_stream: bool,
    /// Declared key, in order.
    pub keys: Vec<KeyConfig>,
    /// Field name → field config.
    pub fields: IndexMap<String, FieldConfig>,
    /// Type annotations.
    pub annotations: Vec<AnnotationConfig>,
}

impl StructuredTypeConfig {
    /// `Namespace.Name`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// `edm:PropertyRef`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyConfig {
    /// Property path (`Id`, `Address/City`, `Address.City`).
    pub name: String,
    /// Name used in the resolved key; required for paths.
    pub alias: Option<String>,
}

/// `edm:ReferentialConstraint`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferentialConfig {
    /// Property on the declaring type.
    pub property: String,
    /// Property on the navigation target.
    pub referenced_property: String,
}

/// A structural or navigation property, or a callable parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldConfig {
    /// Element type name (`Collection(…)` unwrapped).
    pub type_name: String,
    /// `Nullable`; `None` when the attribute is absent.
    pub nullable: Option<bool>,
    /// Declared as `Collection(…)`.
    pub collection: bool,
    /// Declared as a navigation property.
    pub navigation: bool,
    /// `MaxLength`; `None` for absent or `max`.
    pub max_length: Option<usize>,
    /// `Precision`.
    pub precision: Option<i64>,
    /// `Scale` (`variable`, `floating` or a number).
    pub scale: Option<String>,
    /// `SRID`.
    pub srid: Option<String>,
    /// `Unicode`.
    pub unicode: Option<bool>,
    /// Raw `DefaultValue` text.
    pub default: Option<String>,
    /// Navigation partner.
    pub partner: Option<String>,
    /// Navigation contains its target.
    pub contains_target: bool,
    /// `OnDelete/@Action`.
    pub on_delete: Option<String>,
    /// Referential constraints of a navigation property.
    pub referentials: Vec<ReferentialConfig>,
    /// Resolve path used when the wire value is not stored under the field
    /// name (dot- or slash-separated).
    pub ref_path: Option<String>,
    /// Field annotations.
    pub annotations: Vec<AnnotationConfig>,
}

impl FieldConfig {
    /// A field of the given type name; `Collection(X)` sets `collection`.
    pub fn of_type(type_name: &str) -> Self {
        let (inner, collection) = split_collection(type_name);
        Self {
            type_name: inner.to_string(),
            collection,
            ..Self::default()
        }
    }

    /// Sets `Nullable`.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Sets the resolve path.
    pub fn with_ref(mut self, path: impl Into<String>) -> Self {
        self.ref_path = Some(path.into());
        self
    }
}

/// Splits `Collection(X)` into `(X, true)`; other names into `(name, false)`.
pub fn split_collection(type_name: &str) -> (&str, bool) {
    match type_name
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (inner, true),
        None => (type_name, false),
    }
}

/// `edm:EnumType`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumTypeConfig {
    /// Simple name.
    pub name: String,
    /// Owning namespace.
    pub namespace: String,
    /// Owning schema alias.
    pub alias: Option<String>,
    /// `IsFlags`.
    pub flags: bool,
    /// `UnderlyingType`, `Edm.Int32` when absent.
    pub underlying_type: Option<String>,
    /// Member name → value, in declaration order.
    pub members: IndexMap<String, i64>,
    /// Type annotations.
    pub annotations: Vec<AnnotationConfig>,
}

/// Function or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum CallableKind {
    /// `edm:Function`
    #[default]
    Function,
    /// `edm:Action`
    Action,
}

/// `edm:ReturnType`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnTypeConfig {
    /// Element type name (`Collection(…)` unwrapped).
    pub type_name: String,
    /// Declared as `Collection(…)`.
    pub collection: bool,
    /// `Nullable`.
    pub nullable: Option<bool>,
}

/// `edm:Function` / `edm:Action`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallableConfig {
    /// Simple name.
    pub name: String,
    /// Owning namespace.
    pub namespace: String,
    /// Owning schema alias.
    pub alias: Option<String>,
    /// Declaring element.
    pub kind: CallableKind,
    /// `IsBound`.
    pub is_bound: bool,
    /// `IsComposable` (functions only).
    pub is_composable: bool,
    /// `EntitySetPath`.
    pub entity_set_path: Option<String>,
    /// Parameters in declaration order.
    pub parameters: IndexMap<String, FieldConfig>,
    /// Return type, if any.
    pub return_type: Option<ReturnTypeConfig>,
    /// Callable annotations.
    pub annotations: Vec<AnnotationConfig>,
}

/// `edm:TypeDefinition`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeDefinitionConfig {
    /// Simple name.
    pub name: String,
    /// Owning namespace.
    pub namespace: String,
    /// Owning schema alias.
    pub alias: Option<String>,
    /// Underlying primitive type name.
    pub underlying_type: String,
    /// `MaxLength` facet.
    pub max_length: Option<usize>,
    /// Type annotations.
    pub annotations: Vec<AnnotationConfig>,
}

/// `edm:EntityContainer`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityContainerConfig {
    /// Container name.
    pub name: String,
    /// Owning namespace.
    pub namespace: String,
    /// Extended container.
    pub extends: Option<String>,
    /// Entity sets.
    pub entity_sets: Vec<EntitySetConfig>,
    /// Singletons.
    pub singletons: Vec<SingletonConfig>,
    /// Function imports.
    pub function_imports: Vec<FunctionImportConfig>,
    /// Action imports.
    pub action_imports: Vec<ActionImportConfig>,
    /// Container annotations.
    pub annotations: Vec<AnnotationConfig>,
}

/// `edm:NavigationPropertyBinding`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavigationBindingConfig {
    /// Navigation path.
    pub path: String,
    /// Target entity set.
    pub target: String,
}

/// `edm:EntitySet`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntitySetConfig {
    /// Set name.
    pub name: String,
    /// Qualified entity type name.
    pub entity_type: String,
    /// `IncludeInServiceDocument`.
    pub include_in_service_document: Option<bool>,
    /// Navigation bindings.
    pub navigation_bindings: Vec<NavigationBindingConfig>,
}

/// `edm:Singleton`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SingletonConfig {
    /// Singleton name.
    pub name: String,
    /// Qualified entity type name.
    pub type_name: String,
    /// Navigation bindings.
    pub navigation_bindings: Vec<NavigationBindingConfig>,
}

/// `edm:FunctionImport`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionImportConfig {
    /// Import name.
    pub name: String,
    /// Qualified function name.
    pub function: String,
    /// Entity set of the result.
    pub entity_set: Option<String>,
    /// `IncludeInServiceDocument`.
    pub include_in_service_document: Option<bool>,
}

/// `edm:ActionImport`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionImportConfig {
    /// Import name.
    pub name: String,
    /// Qualified action name.
    pub action: String,
    /// Entity set of the result.
    pub entity_set: Option<String>,
}

/// `edm:Term`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermConfig {
    /// Term name.
    pub name: String,
    /// Term type name.
    pub type_name: String,
    /// Base term.
    pub base_term: Option<String>,
    /// Raw default value.
    pub default_value: Option<String>,
    /// Space-separated element kinds the term applies to.
    pub applies_to: Option<String>,
    /// `Nullable`.
    pub nullable: Option<bool>,
}
