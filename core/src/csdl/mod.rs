#![deny(missing_docs)]

//! # CSDL Parsing
//!
//! - **grammar**: the tag table and the generic tree walk.
//! - **models**: strongly-shaped configuration types.
//!
//! [`parse`] is pure and single-pass: version gate, grammar walk, then a
//! mapping of the generic tree into [`SchemaDocument`]. Type names are stored
//! raw; resolution belongs to the registry.

mod grammar;
pub mod models;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ParseError, ParseResult};
use grammar::{rule, walk, Node};
pub use models::*;

/// Parses a CSDL/EDMX document.
///
/// # Errors
///
/// Fails when the XML is malformed, the root `Version` is missing or is not
/// [`SUPPORTED_VERSION`], or the element tree violates the grammar.
pub fn parse(xml: &str) -> ParseResult<SchemaDocument> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let root_tag = root.tag_name().name();
    if root_tag != "Edmx" {
        return Err(ParseError::UnexpectedRoot(root_tag.to_string()));
    }

    let version = root.attribute("Version").ok_or(ParseError::MissingVersion)?;
    if version != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let edmx_rule = rule("Edmx").ok_or_else(|| ParseError::UnexpectedRoot(root_tag.to_string()))?;
    let tree = walk(root, edmx_rule)?;

    let data_services = tree
        .child("DataServices")
        .ok_or_else(|| ParseError::MissingAttribute {
            element: "Edmx".into(),
            attribute: "DataServices".into(),
        })?;

    let references = tree
        .children("Reference")
        .map(map_reference)
        .collect::<ParseResult<Vec<_>>>()?;

    let mut schemas = Vec::new();
    let mut targeted = Vec::new();
    for schema_node in data_services.children("Schema") {
        let (schema, blocks) = map_schema(schema_node)?;
        debug!(
            namespace = %schema.namespace,
            entities = schema.structured_types.len(),
            enums = schema.enum_types.len(),
            callables = schema.callables.len(),
            "parsed CSDL schema"
        );
        schemas.push(schema);
        targeted.extend(blocks);
    }

    for block in targeted {
        apply_external_annotations(&mut schemas, block);
    }

    Ok(SchemaDocument {
        version: version.to_string(),
        references,
        schemas,
    })
}

/// An `Annotations Target="…"` block awaiting attachment.
struct TargetedAnnotations {
    target: String,
    annotations: Vec<AnnotationConfig>,
}

fn map_reference(node: &Node) -> ParseResult<ReferenceConfig> {
    Ok(ReferenceConfig {
        uri: node.name_of("Uri")?,
        includes: node
            .children("Include")
            .map(|n| {
                Ok(IncludeConfig {
                    namespace: n.name_of("Namespace")?,
                    alias: n.text("Alias").map(str::to_string),
                })
            })
            .collect::<ParseResult<Vec<_>>>()?,
        include_annotations: node
            .children("IncludeAnnotations")
            .map(|n| {
                Ok(IncludeAnnotationsConfig {
                    term_namespace: n.name_of("TermNamespace")?,
                    qualifier: n.text("Qualifier").map(str::to_string),
                    target_namespace: n.text("TargetNamespace").map(str::to_string),
                })
            })
            .collect::<ParseResult<Vec<_>>>()?,
    })
}

fn map_schema(node: &Node) -> ParseResult<(SchemaConfig, Vec<TargetedAnnotations>)> {
    let namespace = node.name_of("Namespace")?;
    let alias = node.text("Alias").map(str::to_string);
    let owner = Owner {
        namespace: &namespace,
        alias: alias.as_deref(),
    };

    let mut schema = SchemaConfig {
        namespace: namespace.clone(),
        alias: alias.clone(),
        annotations: map_annotations(node),
        ..SchemaConfig::default()
    };

    for child in &node.children {
        match child.tag {
            "EntityType" => schema
                .structured_types
                .push(map_structured(child, &owner, StructuredKind::Entity)?),
            "ComplexType" => schema
                .structured_types
                .push(map_structured(child, &owner, StructuredKind::Complex)?),
            "EnumType" => schema.enum_types.push(map_enum(child, &owner)?),
            "TypeDefinition" => schema.type_definitions.push(TypeDefinitionConfig {
                name: child.name_of("Name")?,
                namespace: namespace.clone(),
                alias: alias.clone(),
                underlying_type: child.name_of("UnderlyingType")?,
                max_length: max_length(child)?,
                annotations: map_annotations(child),
            }),
            "Function" => schema
                .callables
                .push(map_callable(child, &owner, CallableKind::Function)?),
            "Action" => schema
                .callables
                .push(map_callable(child, &owner, CallableKind::Action)?),
            "EntityContainer" => schema.containers.push(map_container(child, &namespace)?),
            "Term" => schema.terms.push(TermConfig {
                name: child.name_of("Name")?,
                type_name: child.name_of("Type")?,
                base_term: child.text("BaseTerm").map(str::to_string),
                default_value: child.text("DefaultValue").map(str::to_string),
                applies_to: child.text("AppliesTo").map(str::to_string),
                nullable: child.bool("Nullable"),
            }),
            _ => {}
        }
    }

    let blocks = node
        .children("Annotations")
        .map(|n| {
            let qualifier = n.text("Qualifier");
            Ok(TargetedAnnotations {
                target: n.name_of("Target")?,
                annotations: map_annotations(n)
                    .into_iter()
                    .map(|mut a| {
                        if a.qualifier.is_none() {
                            a.qualifier = qualifier.map(str::to_string);
                        }
                        a
                    })
                    .collect(),
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;

    Ok((schema, blocks))
}

struct Owner<'a> {
    namespace: &'a str,
    alias: Option<&'a str>,
}

fn map_structured(
    node: &Node,
    owner: &Owner<'_>,
    kind: StructuredKind,
) -> ParseResult<StructuredTypeConfig> {
    let keys = match node.child("Key") {
        Some(key) => key
            .children("PropertyRef")
            .map(|r| {
                Ok(KeyConfig {
                    name: r.name_of("Name")?,
                    alias: r.text("Alias").map(str::to_string),
                })
            })
            .collect::<ParseResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    let mut fields = IndexMap::new();
    for prop in &node.children {
        let field = match prop.tag {
            "Property" => map_field(prop, false)?,
            "NavigationProperty" => map_field(prop, true)?,
            _ => continue,
        };
        fields.insert(prop.name_of("Name")?, field);
    }

    Ok(StructuredTypeConfig {
        name: node.name_of("Name")?,
        namespace: owner.namespace.to_string(),
        alias: owner.alias.map(str::to_string),
        kind,
        base: node.text("BaseType").map(str::to_string),
        open: node.bool("OpenType").unwrap_or(false),
        r#abstract: node.bool("Abstract").unwrap_or(false),
        has_stream: node.bool("HasStream").unwrap_or(false),
        keys,
        fields,
        annotations: map_annotations(node),
    })
}

/// Maps `Property`, `NavigationProperty` and `Parameter` elements.
fn map_field(node: &Node, navigation: bool) -> ParseResult<FieldConfig> {
    let mut field = FieldConfig::of_type(&node.name_of("Type")?);
    field.navigation = navigation;
    field.nullable = node.bool("Nullable");
    field.max_length = max_length(node)?;
    field.precision = node.int("Precision");
    field.scale = node.text("Scale").map(str::to_string);
    field.srid = node.text("SRID").map(str::to_string);
    field.unicode = node.bool("Unicode");
    field.default = node.text("DefaultValue").map(str::to_string);
    field.partner = node.text("Partner").map(str::to_string);
    field.contains_target = node.bool("ContainsTarget").unwrap_or(false);
    field.on_delete = node
        .child("OnDelete")
        .and_then(|n| n.text("Action"))
        .map(str::to_string);
    field.referentials = node
        .children("ReferentialConstraint")
        .map(|n| {
            Ok(ReferentialConfig {
                property: n.name_of("Property")?,
                referenced_property: n.name_of("ReferencedProperty")?,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;
    field.annotations = map_annotations(node);
    Ok(field)
}

fn max_length(node: &Node) -> ParseResult<Option<usize>> {
    match node.text("MaxLength") {
        None => Ok(None),
        Some(raw) if raw.eq_ignore_ascii_case("max") => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ParseError::InvalidAttribute {
                element: node.tag.to_string(),
                attribute: "MaxLength".into(),
                value: raw.to_string(),
                expected: "integer or 'max'",
            }),
    }
}

fn map_enum(node: &Node, owner: &Owner<'_>) -> ParseResult<EnumTypeConfig> {
    let mut members = IndexMap::new();
    for (index, member) in node.children("Member").enumerate() {
        // Members without Value are numbered by position.
        let value = member.int("Value").unwrap_or(index as i64);
        members.insert(member.name_of("Name")?, value);
    }
    Ok(EnumTypeConfig {
        name: node.name_of("Name")?,
        namespace: owner.namespace.to_string(),
        alias: owner.alias.map(str::to_string),
        flags: node.bool("IsFlags").unwrap_or(false),
        underlying_type: node.text("UnderlyingType").map(str::to_string),
        members,
        annotations: map_annotations(node),
    })
}

fn map_callable(node: &Node, owner: &Owner<'_>, kind: CallableKind) -> ParseResult<CallableConfig> {
    let mut parameters = IndexMap::new();
    for param in node.children("Parameter") {
        parameters.insert(param.name_of("Name")?, map_field(param, false)?);
    }
    let return_type = match node.child("ReturnType") {
        Some(ret) => {
            let raw = ret.name_of("Type")?;
            let (inner, collection) = split_collection(&raw);
            Some(ReturnTypeConfig {
                type_name: inner.to_string(),
                collection,
                nullable: ret.bool("Nullable"),
            })
        }
        None => None,
    };
    Ok(CallableConfig {
        name: node.name_of("Name")?,
        namespace: owner.namespace.to_string(),
        alias: owner.alias.map(str::to_string),
        kind,
        is_bound: node.bool("IsBound").unwrap_or(false),
        is_composable: node.bool("IsComposable").unwrap_or(false),
        entity_set_path: node.text("EntitySetPath").map(str::to_string),
        parameters,
        return_type,
        annotations: map_annotations(node),
    })
}

fn map_container(node: &Node, namespace: &str) -> ParseResult<EntityContainerConfig> {
    let bindings = |n: &Node| -> ParseResult<Vec<NavigationBindingConfig>> {
        n.children("NavigationPropertyBinding")
            .map(|b| {
                Ok(NavigationBindingConfig {
                    path: b.name_of("Path")?,
                    target: b.name_of("Target")?,
                })
            })
            .collect()
    };

    let mut container = EntityContainerConfig {
        name: node.name_of("Name")?,
        namespace: namespace.to_string(),
        extends: node.text("Extends").map(str::to_string),
        annotations: map_annotations(node),
        ..EntityContainerConfig::default()
    };
    for child in &node.children {
        match child.tag {
            "EntitySet" => container.entity_sets.push(EntitySetConfig {
                name: child.name_of("Name")?,
                entity_type: child.name_of("EntityType")?,
                include_in_service_document: child.bool("IncludeInServiceDocument"),
                navigation_bindings: bindings(child)?,
            }),
            "Singleton" => container.singletons.push(SingletonConfig {
                name: child.name_of("Name")?,
                type_name: child.name_of("Type")?,
                navigation_bindings: bindings(child)?,
            }),
            "FunctionImport" => container.function_imports.push(FunctionImportConfig {
                name: child.name_of("Name")?,
                function: child.name_of("Function")?,
                entity_set: child.text("EntitySet").map(str::to_string),
                include_in_service_document: child.bool("IncludeInServiceDocument"),
            }),
            "ActionImport" => container.action_imports.push(ActionImportConfig {
                name: child.name_of("Name")?,
                action: child.name_of("Action")?,
                entity_set: child.text("EntitySet").map(str::to_string),
            }),
            _ => {}
        }
    }
    Ok(container)
}

fn map_annotations(node: &Node) -> Vec<AnnotationConfig> {
    node.children("Annotation")
        .filter_map(|a| {
            let term = a.text("Term")?.to_string();
            let value = if let Some(s) = a.text("String") {
                Some(AnnotationValue::String(s.to_string()))
            } else if let Some(b) = a.bool("Bool") {
                Some(AnnotationValue::Bool(b))
            } else if let Some(i) = a.int("Int") {
                Some(AnnotationValue::Int(i))
            } else if let Some(f) = a.text("Float") {
                Some(AnnotationValue::Float(f.to_string()))
            } else if let Some(d) = a.text("Decimal") {
                Some(AnnotationValue::Decimal(d.to_string()))
            } else if let Some(d) = a.date("Date") {
                Some(AnnotationValue::Date(d))
            } else if let Some(m) = a.text("EnumMember") {
                Some(AnnotationValue::EnumMember(m.to_string()))
            } else {
                a.text("Path").map(|p| AnnotationValue::Path(p.to_string()))
            };
            Some(AnnotationConfig {
                term,
                qualifier: a.text("Qualifier").map(str::to_string),
                value,
            })
        })
        .collect()
}

/// Attaches an `Annotations` block to the type or field its target names.
fn apply_external_annotations(schemas: &mut [SchemaConfig], block: TargetedAnnotations) {
    let (type_name, member) = match block.target.split_once('/') {
        Some((t, m)) => (t, Some(m)),
        None => (block.target.as_str(), None),
    };

    let matches = |namespace: &str, alias: Option<&str>, name: &str| {
        type_name
            .rsplit_once('.')
            .map(|(prefix, simple)| {
                simple == name && (prefix == namespace || Some(prefix) == alias)
            })
            .unwrap_or(false)
    };

    for schema in schemas.iter_mut() {
        let alias = schema.alias.clone();
        if let Some(ty) = schema
            .structured_types
            .iter_mut()
            .find(|t| matches(&t.namespace, alias.as_deref(), &t.name))
        {
            match member {
                None => ty.annotations.extend(block.annotations),
                Some(field) => match ty.fields.get_mut(field) {
                    Some(f) => f.annotations.extend(block.annotations),
                    None => debug!(target = %block.target, "annotation target field not found"),
                },
            }
            return;
        }
        if let Some(en) = schema
            .enum_types
            .iter_mut()
            .find(|t| matches(&t.namespace, alias.as_deref(), &t.name))
        {
            en.annotations.extend(block.annotations);
            return;
        }
    }
    debug!(target = %block.target, "annotation target not found");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wrap(schema: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="NS" Alias="self" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      {}
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#,
            schema
        )
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let xml = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
            <edmx:DataServices/></edmx:Edmx>"#;
        assert!(matches!(parse(xml), Err(ParseError::MissingVersion)));
    }

    #[test]
    fn test_unsupported_version_is_fatal() {
        let xml = wrap("").replace("Version=\"4.0\"", "Version=\"1.0\"");
        match parse(&xml) {
            Err(ParseError::UnsupportedVersion(v)) => assert_eq!(v, "1.0"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(parse("<edmx:Edmx"), Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_entity_and_complex_types() {
        let xml = wrap(
            r#"
      <EntityType Name="Person">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Name" Type="Edm.String" MaxLength="40"/>
        <Property Name="Tags" Type="Collection(Edm.String)"/>
        <Property Name="Home" Type="self.Address"/>
        <NavigationProperty Name="Friends" Type="Collection(NS.Person)" Partner="Friends"/>
      </EntityType>
      <ComplexType Name="Address" OpenType="true">
        <Property Name="City" Type="Edm.String" DefaultValue="Paris"/>
      </ComplexType>"#,
        );
        let doc = parse(&xml).unwrap();
        assert_eq!(doc.version, "4.0");
        let schema = &doc.schemas[0];
        assert_eq!(schema.alias.as_deref(), Some("self"));

        let person = &schema.structured_types[0];
        assert_eq!(person.kind, StructuredKind::Entity);
        assert_eq!(person.full_name(), "NS.Person");
        assert_eq!(person.keys.len(), 1);
        assert_eq!(person.fields["Id"].nullable, Some(false));
        assert_eq!(person.fields["Name"].nullable, None);
        assert_eq!(person.fields["Name"].max_length, Some(40));
        assert!(person.fields["Tags"].collection);
        assert_eq!(person.fields["Home"].type_name, "self.Address");
        let friends = &person.fields["Friends"];
        assert!(friends.navigation && friends.collection);
        assert_eq!(friends.partner.as_deref(), Some("Friends"));

        let address = &schema.structured_types[1];
        assert_eq!(address.kind, StructuredKind::Complex);
        assert!(address.open);
        assert!(address.keys.is_empty());
        assert_eq!(address.fields["City"].default.as_deref(), Some("Paris"));
    }

    #[test]
    fn test_base_type_stays_raw() {
        let xml = wrap(
            r#"
      <EntityType Name="Manager" BaseType="NS.Employee">
        <Property Name="Budget" Type="Edm.Decimal"/>
      </EntityType>"#,
        );
        let doc = parse(&xml).unwrap();
        assert_eq!(
            doc.schemas[0].structured_types[0].base.as_deref(),
            Some("NS.Employee")
        );
    }

    #[test]
    fn test_enum_members() {
        let xml = wrap(
            r#"
      <EnumType Name="Color" IsFlags="true">
        <Member Name="Red" Value="1"/>
        <Member Name="Green" Value="2"/>
        <Member Name="Blue" Value="4"/>
      </EnumType>
      <EnumType Name="Size">
        <Member Name="Small"/>
        <Member Name="Large"/>
      </EnumType>"#,
        );
        let doc = parse(&xml).unwrap();
        let color = &doc.schemas[0].enum_types[0];
        assert!(color.flags);
        assert_eq!(color.members["Blue"], 4);
        let size = &doc.schemas[0].enum_types[1];
        assert!(!size.flags);
        assert_eq!(size.members["Large"], 1);
    }

    #[test]
    fn test_callables_and_container() {
        let xml = wrap(
            r#"
      <EntityType Name="Person">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
      </EntityType>
      <Function Name="Nearest" IsBound="true" IsComposable="true">
        <Parameter Name="bindingParameter" Type="Collection(NS.Person)"/>
        <Parameter Name="Count" Type="Edm.Int32" Nullable="false"/>
        <ReturnType Type="Collection(NS.Person)"/>
      </Function>
      <Action Name="Reset"/>
      <EntityContainer Name="Default">
        <EntitySet Name="People" EntityType="NS.Person">
          <NavigationPropertyBinding Path="Friends" Target="People"/>
        </EntitySet>
        <FunctionImport Name="GetNearest" Function="NS.Nearest" EntitySet="People"/>
        <ActionImport Name="ResetAll" Action="NS.Reset"/>
      </EntityContainer>"#,
        );
        let doc = parse(&xml).unwrap();
        let schema = &doc.schemas[0];
        let nearest = &schema.callables[0];
        assert_eq!(nearest.kind, CallableKind::Function);
        assert!(nearest.is_bound && nearest.is_composable);
        assert_eq!(
            nearest.parameters.keys().collect::<Vec<_>>(),
            vec!["bindingParameter", "Count"]
        );
        let ret = nearest.return_type.as_ref().unwrap();
        assert!(ret.collection);
        assert_eq!(ret.type_name, "NS.Person");
        assert_eq!(schema.callables[1].kind, CallableKind::Action);
        assert!(schema.callables[1].return_type.is_none());

        let container = &schema.containers[0];
        assert_eq!(container.entity_sets[0].entity_type, "NS.Person");
        assert_eq!(
            container.entity_sets[0].navigation_bindings[0].target,
            "People"
        );
        assert_eq!(container.function_imports[0].function, "NS.Nearest");
        assert_eq!(container.action_imports[0].action, "NS.Reset");
    }

    #[test]
    fn test_navigation_constraints() {
        let xml = wrap(
            r#"
      <EntityType Name="Order">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <Property Name="CustomerId" Type="Edm.Int32"/>
        <NavigationProperty Name="Customer" Type="NS.Customer">
          <ReferentialConstraint Property="CustomerId" ReferencedProperty="Id"/>
          <OnDelete Action="Cascade"/>
        </NavigationProperty>
      </EntityType>"#,
        );
        let doc = parse(&xml).unwrap();
        let customer = &doc.schemas[0].structured_types[0].fields["Customer"];
        assert_eq!(customer.on_delete.as_deref(), Some("Cascade"));
        assert_eq!(
            customer.referentials,
            vec![ReferentialConfig {
                property: "CustomerId".into(),
                referenced_property: "Id".into(),
            }]
        );
    }

    #[test]
    fn test_two_keys_rejected() {
        let xml = wrap(
            r#"
      <EntityType Name="Bad">
        <Key><PropertyRef Name="A"/></Key>
        <Key><PropertyRef Name="B"/></Key>
      </EntityType>"#,
        );
        assert!(matches!(
            parse(&xml),
            Err(ParseError::DuplicateElement { .. })
        ));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let xml = wrap(
            r#"<EntityType Name="Bad">
                <Propperty Name="A" Type="Edm.String"/>
            </EntityType>"#,
        );
        assert!(matches!(
            parse(&xml),
            Err(ParseError::UnknownElement { .. })
        ));
    }

    #[test]
    fn test_external_annotations_attach_to_fields() {
        let xml = wrap(
            r#"
      <EntityType Name="Person">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
      </EntityType>
      <Annotations Target="self.Person/Id">
        <Annotation Term="Org.OData.Core.V1.Computed" Bool="true"/>
      </Annotations>
      <Annotations Target="NS.Person">
        <Annotation Term="Org.OData.Core.V1.Description" String="A person"/>
      </Annotations>"#,
        );
        let doc = parse(&xml).unwrap();
        let person = &doc.schemas[0].structured_types[0];
        assert_eq!(person.fields["Id"].annotations[0].as_bool(), Some(true));
        assert_eq!(person.annotations[0].as_str(), Some("A person"));
    }

    #[test]
    fn test_references() {
        let xml = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="https://oasis-tcs.github.io/odata-vocabularies/vocabularies/Org.OData.Core.V1.xml">
    <edmx:Include Namespace="Org.OData.Core.V1" Alias="Core"/>
  </edmx:Reference>
  <edmx:DataServices/>
</edmx:Edmx>"#;
        let doc = parse(xml).unwrap();
        assert_eq!(doc.references[0].includes[0].alias.as_deref(), Some("Core"));
        assert!(doc.schemas.is_empty());
    }
}
