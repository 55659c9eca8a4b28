#![deny(missing_docs)]

//! # Type Registry
//!
//! Turns parsed metadata documents into a cross-linked, immutable codec set.
//!
//! 1. **Construction**: [`UnresolvedCodecSet::add_document`] builds one codec
//!    per declaration. Nothing inspects anything else yet.
//! 2. **Resolution**: [`UnresolvedCodecSet::resolve`] links base types,
//!    resolves every field, parameter and return type name, then decodes
//!    declared defaults. The result is a [`TypeRegistry`].
//!
//! Unresolved names degrade to pass-through codecs and are recorded as
//! [`Diagnostic`]s. A registry is never mutated after `resolve`; merging
//! another document produces a fresh registry.

use std::collections::{HashMap, HashSet};

use derive_more::Display;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::codec::{
    CallableCodec, CallableId, CallableView, Codec, CodecRef, CodecView, EnumCodec, EnumId,
    EnumView, FieldCodec, StructuredCodec, StructuredId, StructuredView, Vocabulary,
};
use crate::csdl::{parse, SchemaDocument};
use crate::edm::EdmType;
use crate::error::{AppResult, CodecError};
use crate::options::ParserOptions;

/// What went wrong while resolving one reference.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum DiagnosticKind {
    /// A field, parameter or entity set names an unknown type.
    #[display("unresolved type '{_0}'")]
    UnresolvedType(String),
    /// `BaseType` names an unknown structured type.
    #[display("unresolved base type '{_0}'")]
    UnresolvedBaseType(String),
    /// Linking `BaseType` would close an inheritance cycle.
    #[display("inheritance cycle through '{_0}'")]
    InheritanceCycle(String),
    /// `DefaultValue` does not decode through its field.
    #[display("invalid default: {_0}")]
    InvalidDefault(CodecError),
}

/// A recoverable resolution gap.
#[derive(Debug, Clone, PartialEq, Display)]
#[display("{owner}{}: {kind}", member.as_ref().map(|m| format!(".{m}")).unwrap_or_default())]
pub struct Diagnostic {
    /// Qualified name of the declaring type, callable or container.
    pub owner: String,
    /// Field, parameter or entity set, if any.
    pub member: Option<String>,
    /// The gap.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    fn new(owner: impl Into<String>, member: Option<&str>, kind: DiagnosticKind) -> Self {
        let diagnostic = Self {
            owner: owner.into(),
            member: member.map(str::to_string),
            kind,
        };
        warn!(%diagnostic, "metadata reference degraded");
        diagnostic
    }
}

/// A `TypeDefinition` reduced to what field resolution needs.
#[derive(Debug, Clone)]
struct TypeDefinition {
    underlying: String,
    max_length: Option<usize>,
}

/// Codecs constructed from configuration but not yet linked.
///
/// Offers no codec operations: only a resolved [`TypeRegistry`] does.
#[derive(Debug, Default)]
pub struct UnresolvedCodecSet {
    documents: Vec<SchemaDocument>,
    namespaces: HashSet<String>,
    aliases: HashMap<String, String>,
    enums: Vec<EnumCodec>,
    structured: Vec<StructuredCodec>,
    callables: Vec<CallableCodec>,
    type_definitions: HashMap<String, TypeDefinition>,
    entity_sets: Vec<(String, String)>,
}

impl UnresolvedCodecSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a CSDL document and adds it.
    ///
    /// # Errors
    ///
    /// Fails when the document does not parse; nothing is added then.
    pub fn register_xml(&mut self, xml: &str) -> AppResult<()> {
        let document = parse(xml)?;
        self.add_document(document);
        Ok(())
    }

    /// Builds unlinked codecs for every declaration of `document`.
    ///
    /// Schemas whose namespace is already present are skipped, so adding the
    /// same document twice is harmless.
    pub fn add_document(&mut self, mut document: SchemaDocument) {
        let mut vocabulary = HashMap::new();
        let includes = document.references.iter().flat_map(|r| r.includes.iter());
        for include in includes {
            if let Some(alias) = &include.alias {
                vocabulary.insert(alias.clone(), include.namespace.clone());
            }
        }
        for schema in &document.schemas {
            if let Some(alias) = &schema.alias {
                vocabulary.insert(alias.clone(), schema.namespace.clone());
            }
        }
        self.aliases.extend(vocabulary.clone());
        let vocabulary = Vocabulary::new(vocabulary);

        document.schemas.retain(|schema| {
            let fresh = self.namespaces.insert(schema.namespace.clone());
            if !fresh {
                debug!(namespace = %schema.namespace, "schema already registered, skipping");
            }
            fresh
        });

        for schema in &document.schemas {
            for config in &schema.enum_types {
                self.enums.push(EnumCodec::from_config(config));
            }
            for config in &schema.structured_types {
                let id = StructuredId(self.structured.len());
                self.structured
                    .push(StructuredCodec::from_config(id, config, &vocabulary));
            }
            for config in &schema.callables {
                let id = CallableId(self.callables.len());
                self.callables
                    .push(CallableCodec::from_config(id, config, &vocabulary));
            }
            for config in &schema.type_definitions {
                self.type_definitions.insert(
                    format!("{}.{}", config.namespace, config.name),
                    TypeDefinition {
                        underlying: config.underlying_type.clone(),
                        max_length: config.max_length,
                    },
                );
            }
            for container in &schema.containers {
                for set in &container.entity_sets {
                    self.entity_sets
                        .push((set.name.clone(), set.entity_type.clone()));
                }
            }
        }

        self.documents.push(document);
    }

    /// Links everything and returns the immutable registry.
    pub fn resolve(self) -> TypeRegistry {
        let UnresolvedCodecSet {
            documents,
            aliases,
            enums,
            mut structured,
            mut callables,
            type_definitions,
            entity_sets,
            ..
        } = self;

        let mut names = HashMap::new();
        for (i, codec) in enums.iter().enumerate() {
            names.insert(codec.full_name(), CodecRef::Enum(EnumId(i)));
        }
        for (i, codec) in structured.iter().enumerate() {
            names.insert(codec.full_name(), CodecRef::Structured(StructuredId(i)));
        }
        let mut callable_names: HashMap<String, Vec<CallableId>> = HashMap::new();
        for (i, codec) in callables.iter().enumerate() {
            callable_names
                .entry(codec.full_name())
                .or_default()
                .push(CallableId(i));
        }

        let resolver = Resolver {
            aliases: &aliases,
            names: &names,
            type_definitions: &type_definitions,
        };
        let mut diagnostics = Vec::new();

        link_inheritance(&mut structured, &resolver, &mut diagnostics);

        for codec in structured.iter_mut() {
            let owner = codec.full_name();
            for field in codec.fields.values_mut() {
                resolve_field(field, &owner, &resolver, &mut diagnostics);
            }
        }
        for codec in callables.iter_mut() {
            let owner = codec.full_name();
            for param in codec.parameters.values_mut() {
                resolve_field(param, &owner, &resolver, &mut diagnostics);
            }
            if let Some(ret) = codec.return_type.as_mut() {
                resolve_field(ret, &owner, &resolver, &mut diagnostics);
            }
        }

        let mut sets = IndexMap::new();
        for (set, type_name) in entity_sets {
            match resolver.lookup(&type_name) {
                Some(CodecRef::Structured(id)) => {
                    sets.insert(set, id);
                }
                _ => diagnostics.push(Diagnostic::new(
                    set,
                    None,
                    DiagnosticKind::UnresolvedType(type_name),
                )),
            }
        }

        let mut registry = TypeRegistry {
            documents,
            aliases,
            enums,
            structured,
            callables,
            names,
            callable_names,
            type_definitions,
            entity_sets: sets,
            diagnostics,
        };
        registry.normalize_defaults();

        debug!(
            enums = registry.enums.len(),
            structured = registry.structured.len(),
            callables = registry.callables.len(),
            diagnostics = registry.diagnostics.len(),
            "type registry resolved"
        );
        registry
    }
}

/// Name → codec lookup shared by the resolution phase and the registry.
struct Resolver<'a> {
    aliases: &'a HashMap<String, String>,
    names: &'a HashMap<String, CodecRef>,
    type_definitions: &'a HashMap<String, TypeDefinition>,
}

impl Resolver<'_> {
    /// `Alias.Name` → `Namespace.Name`.
    fn canonical(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((prefix, simple)) => match self.aliases.get(prefix) {
                Some(namespace) => format!("{}.{}", namespace, simple),
                None => name.to_string(),
            },
            None => name.to_string(),
        }
    }

    fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.type_definitions.get(&self.canonical(name))
    }

    /// Edm table first, then type definitions, then declared types.
    fn lookup(&self, name: &str) -> Option<CodecRef> {
        if let Some(edm) = EdmType::from_name(name) {
            return Some(CodecRef::Primitive(edm));
        }
        if let Some(definition) = self.type_definition(name) {
            return EdmType::from_name(&definition.underlying).map(CodecRef::Primitive);
        }
        self.names.get(&self.canonical(name)).copied()
    }
}

/// Whether following parent links from `from` reaches `target`.
fn reaches(structured: &[StructuredCodec], from: StructuredId, target: StructuredId) -> bool {
    let mut current = Some(from);
    while let Some(id) = current {
        if id == target {
            return true;
        }
        current = structured[id.0].parent;
    }
    false
}

fn link_inheritance(
    structured: &mut [StructuredCodec],
    resolver: &Resolver<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for index in 0..structured.len() {
        let Some(base) = structured[index].base.clone() else {
            continue;
        };
        let child = StructuredId(index);
        match resolver.lookup(&base) {
            Some(CodecRef::Structured(parent)) if reaches(structured, parent, child) => {
                diagnostics.push(Diagnostic::new(
                    structured[index].full_name(),
                    None,
                    DiagnosticKind::InheritanceCycle(base),
                ));
            }
            Some(CodecRef::Structured(parent)) => {
                structured[index].parent = Some(parent);
                structured[parent.0].children.push(child);
            }
            _ => diagnostics.push(Diagnostic::new(
                structured[index].full_name(),
                None,
                DiagnosticKind::UnresolvedBaseType(base),
            )),
        }
    }
}

fn resolve_field(
    field: &mut FieldCodec,
    owner: &str,
    resolver: &Resolver<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match resolver.lookup(&field.type_name) {
        Some(found) => {
            field.codec = found;
            if field.max_length.is_none() {
                field.max_length = resolver
                    .type_definition(&field.type_name)
                    .and_then(|d| d.max_length);
            }
        }
        None => {
            field.codec = CodecRef::PassThrough;
            diagnostics.push(Diagnostic::new(
                owner,
                Some(&field.name),
                DiagnosticKind::UnresolvedType(field.type_name.clone()),
            ));
        }
    }
}

/// The resolved, immutable codec set.
///
/// Holds no interior mutability and is safe to share between threads.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    documents: Vec<SchemaDocument>,
    aliases: HashMap<String, String>,
    enums: Vec<EnumCodec>,
    structured: Vec<StructuredCodec>,
    callables: Vec<CallableCodec>,
    names: HashMap<String, CodecRef>,
    callable_names: HashMap<String, Vec<CallableId>>,
    type_definitions: HashMap<String, TypeDefinition>,
    entity_sets: IndexMap<String, StructuredId>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeRegistry {
    /// Constructs and resolves codecs for the given documents.
    pub fn build(documents: &[SchemaDocument]) -> Self {
        let mut set = UnresolvedCodecSet::new();
        for document in documents {
            set.add_document(document.clone());
        }
        set.resolve()
    }

    /// Parses one CSDL document and resolves it.
    ///
    /// # Errors
    ///
    /// Fails when the document does not parse.
    pub fn from_xml(xml: &str) -> AppResult<Self> {
        let mut set = UnresolvedCodecSet::new();
        set.register_xml(xml)?;
        Ok(set.resolve())
    }

    /// A fresh registry holding this registry's documents plus `document`.
    pub fn extend(&self, document: SchemaDocument) -> Self {
        let mut set = UnresolvedCodecSet::new();
        for existing in &self.documents {
            set.add_document(existing.clone());
        }
        set.add_document(document);
        set.resolve()
    }

    /// Documents this registry was built from, duplicates removed.
    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    /// Configure-time resolution gaps.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            aliases: &self.aliases,
            names: &self.names,
            type_definitions: &self.type_definitions,
        }
    }

    /// Resolves a qualified type name, alias forms included.
    pub fn lookup(&self, name: &str) -> Option<CodecRef> {
        let resolver = self.resolver();
        resolver.lookup(name).or_else(|| {
            self.callable_names
                .get(&resolver.canonical(name))
                .and_then(|ids| ids.first())
                .map(|id| CodecRef::Callable(*id))
        })
    }

    /// The codec a link points to.
    ///
    /// A link that does not belong to this registry yields a pass-through.
    pub fn get(&self, link: CodecRef) -> Codec<'_> {
        let found = match link {
            CodecRef::Primitive(edm) => Some(Codec::Primitive(edm)),
            CodecRef::Enum(id) => self
                .enums
                .get(id.0)
                .map(|codec| Codec::Enum(CodecView::new(self, codec))),
            CodecRef::Structured(id) => self.structured_at(id).map(Codec::Structured),
            CodecRef::Callable(id) => self
                .callables
                .get(id.0)
                .map(|codec| Codec::Callable(CodecView::new(self, codec))),
            CodecRef::PassThrough => None,
        };
        found.unwrap_or(Codec::PassThrough)
    }

    /// Codec for a qualified type name.
    pub fn codec(&self, name: &str) -> Option<Codec<'_>> {
        self.lookup(name).map(|link| self.get(link))
    }

    /// Enum codec by qualified name.
    pub fn enum_type(&self, name: &str) -> Option<EnumView<'_>> {
        match self.codec(name)? {
            Codec::Enum(view) => Some(view),
            _ => None,
        }
    }

    /// Entity or complex type codec by qualified name.
    pub fn structured_type(&self, name: &str) -> Option<StructuredView<'_>> {
        match self.codec(name)? {
            Codec::Structured(view) => Some(view),
            _ => None,
        }
    }

    /// First callable declared under a qualified name.
    pub fn callable(&self, name: &str) -> Option<CallableView<'_>> {
        self.callables(name).into_iter().next()
    }

    /// Every overload declared under a qualified name.
    pub fn callables(&self, name: &str) -> Vec<CallableView<'_>> {
        self.callable_names
            .get(&self.resolver().canonical(name))
            .map(|ids| {
                ids.iter()
                    .map(|id| CodecView::new(self, &self.callables[id.0]))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entity type of a container entity set.
    pub fn entity_set(&self, name: &str) -> Option<StructuredView<'_>> {
        self.entity_sets
            .get(name)
            .and_then(|id| self.structured_at(*id))
    }

    /// Entity set names and their entity types.
    pub fn entity_sets(&self) -> impl Iterator<Item = (&str, StructuredView<'_>)> {
        self.entity_sets
            .iter()
            .filter_map(|(name, id)| Some((name.as_str(), self.structured_at(*id)?)))
    }

    /// All enum codecs.
    pub fn enum_types(&self) -> impl Iterator<Item = EnumView<'_>> {
        self.enums.iter().map(|codec| CodecView::new(self, codec))
    }

    /// All entity and complex type codecs.
    pub fn structured_types(&self) -> impl Iterator<Item = StructuredView<'_>> {
        self.structured.iter().map(|codec| CodecView::new(self, codec))
    }

    /// All function and action codecs.
    pub fn all_callables(&self) -> impl Iterator<Item = CallableView<'_>> {
        self.callables.iter().map(|codec| CodecView::new(self, codec))
    }

    pub(crate) fn structured_at(&self, id: StructuredId) -> Option<StructuredView<'_>> {
        self.structured
            .get(id.0)
            .map(|codec| CodecView::new(self, codec))
    }

    /// Decodes every declared `DefaultValue` through its own field.
    fn normalize_defaults(&mut self) {
        let options = ParserOptions::default();
        let mut decoded = Vec::new();
        for codec in &self.structured {
            for field in codec.fields.values() {
                let Some(raw) = &field.raw_default else {
                    continue;
                };
                let view = CodecView::new(&*self, field);
                let result = view.deserialize_element(&JsonValue::String(raw.clone()), &options);
                decoded.push((codec.id, field.name.clone(), result));
            }
        }

        for (id, name, result) in decoded {
            match result {
                Ok(value) => {
                    if let Some(field) = self.structured[id.0].fields.get_mut(&name) {
                        field.default = Some(value);
                    }
                }
                Err(err) => {
                    let owner = self.structured[id.0].full_name();
                    self.diagnostics.push(Diagnostic::new(
                        owner,
                        Some(&name),
                        DiagnosticKind::InvalidDefault(err),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    const BASE: &str = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="https://example.com/Core.xml">
    <edmx:Include Namespace="Org.OData.Core.V1" Alias="Core"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="Fleet" Alias="F" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <TypeDefinition Name="Plate" UnderlyingType="Edm.String" MaxLength="8"/>
      <EntityType Name="Truck" BaseType="F.Vehicle">
        <Property Name="Axles" Type="Edm.Int32" DefaultValue="2"/>
      </EntityType>
      <EntityType Name="Vehicle">
        <Key><PropertyRef Name="Plate"/></Key>
        <Property Name="Plate" Type="F.Plate" Nullable="false">
          <Annotation Term="Core.Computed"/>
        </Property>
        <Property Name="Owner" Type="Registry.Person"/>
        <Property Name="Speed" Type="Edm.Int32" DefaultValue="fast"/>
      </EntityType>
      <EntityType Name="Loop" BaseType="Fleet.Loop"/>
      <EntityType Name="Orphan" BaseType="Fleet.Nothing"/>
      <EntityContainer Name="Default">
        <EntitySet Name="Vehicles" EntityType="Fleet.Vehicle"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    const EXTRA: &str = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="Registry" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <ComplexType Name="Person">
        <Property Name="Name" Type="Edm.String"/>
      </ComplexType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    fn registry() -> TypeRegistry {
        TypeRegistry::from_xml(BASE).unwrap()
    }

    #[test]
    fn test_forward_base_reference() {
        let registry = registry();
        let truck = registry.structured_type("Fleet.Truck").unwrap();
        assert_eq!(truck.parent().unwrap().name(), "Vehicle");
        assert_eq!(truck.keys().len(), 1);
    }

    #[test]
    fn test_alias_lookup() {
        let registry = registry();
        assert!(registry.structured_type("F.Vehicle").is_some());
        assert!(matches!(
            registry.codec("Edm.Guid"),
            Some(Codec::Primitive(EdmType::Guid))
        ));
    }

    #[test]
    fn test_type_definition_resolves_to_underlying() {
        let registry = registry();
        let vehicle = registry.structured_type("Fleet.Vehicle").unwrap();
        let plate = vehicle.field("Plate").unwrap();
        assert_eq!(plate.codec_ref(), CodecRef::Primitive(EdmType::String));
        assert_eq!(plate.max_length(), Some(8));
        assert!(plate.is_computed());
    }

    #[test]
    fn test_diagnostics_are_recorded() {
        let registry = registry();
        let kinds: Vec<String> = registry
            .diagnostics()
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "Fleet.Loop: inheritance cycle through 'Fleet.Loop'".to_string(),
                "Fleet.Orphan: unresolved base type 'Fleet.Nothing'".to_string(),
                "Fleet.Vehicle.Owner: unresolved type 'Registry.Person'".to_string(),
                "Fleet.Vehicle.Speed: invalid default: Invalid Edm.Int32 value: \"fast\"".to_string(),
            ]
        );
        let vehicle = registry.structured_type("Fleet.Vehicle").unwrap();
        assert_eq!(
            vehicle.field("Owner").unwrap().codec_ref(),
            CodecRef::PassThrough
        );
    }

    #[test]
    fn test_defaults_are_decoded() {
        let registry = registry();
        let truck = registry.structured_type("Fleet.Truck").unwrap();
        assert_eq!(
            truck.field("Axles").unwrap().default_value(),
            Some(&Value::Integer(2))
        );
    }

    #[test]
    fn test_extend_returns_fresh_registry() {
        let registry = registry();
        let merged = registry.extend(parse(EXTRA).unwrap());
        let owner = merged
            .structured_type("Fleet.Vehicle")
            .unwrap()
            .field("Owner")
            .unwrap();
        assert!(matches!(owner.codec(), Codec::Structured(_)));
        assert!(registry.structured_type("Registry.Person").is_none());

        let again = merged.extend(parse(EXTRA).unwrap());
        assert_eq!(
            again.structured_types().count(),
            merged.structured_types().count()
        );
    }

    #[test]
    fn test_entity_set_lookup() {
        let registry = registry();
        assert_eq!(registry.entity_set("Vehicles").unwrap().name(), "Vehicle");
        assert!(registry.entity_set("Trucks").is_none());
    }

    #[test]
    fn test_foreign_link_falls_back_to_pass_through() {
        let empty = TypeRegistry::build(&[]);
        let registry = registry();
        let link = registry.lookup("Fleet.Orphan").unwrap();
        assert!(matches!(link, CodecRef::Structured(_)));
        assert!(matches!(registry.get(link), Codec::Structured(_)));
        assert!(matches!(empty.get(link), Codec::PassThrough));
        assert!(matches!(
            empty.get(CodecRef::Enum(EnumId(2))),
            Codec::PassThrough
        ));
        assert!(matches!(
            empty.get(CodecRef::Callable(CallableId(0))),
            Codec::PassThrough
        ));
    }

    #[test]
    fn test_parse_failure_adds_nothing() {
        let mut set = UnresolvedCodecSet::new();
        assert!(set.register_xml("<edmx:Edmx/>").is_err());
        assert_eq!(set.resolve().structured_types().count(), 0);
    }
}
