//! # CSDL Grammar
//!
//! Static description of every recognized CSDL element: its attributes (with
//! a coercion each) and the child elements it may contain. The walker in this
//! module turns an XML element tree into a generic [`Node`] tree of typed
//! attribute values, rejecting anything the table does not describe.

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::error::{ParseError, ParseResult};

/// How an attribute's text is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Coercion {
    /// Literal string.
    Text,
    /// `"true"` / `"false"`.
    Bool,
    /// Signed integer.
    Int,
    /// ISO date (`YYYY-MM-DD`).
    Date,
}

/// A coerced attribute value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttrValue {
    Text(String),
    Bool(bool),
    Int(i64),
    Date(NaiveDate),
}

/// How often a child tag may appear inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Many,
    /// Zero or one; a second occurrence is fatal.
    Single,
}

pub(crate) struct AttrRule {
    pub name: &'static str,
    pub coercion: Coercion,
    pub required: bool,
}

pub(crate) struct ChildRule {
    pub tag: &'static str,
    pub arity: Arity,
}

pub(crate) struct ElementRule {
    pub tag: &'static str,
    pub attrs: &'static [AttrRule],
    pub children: &'static [ChildRule],
    /// Children are expressions we do not model; they are skipped unchecked.
    pub opaque: bool,
    /// Also accepts the type facets in [`FACETS`].
    pub facets: bool,
}

impl ElementRule {
    /// Every attribute the element accepts, facets included.
    fn attr_rules(&self) -> impl Iterator<Item = &'static AttrRule> {
        let facets: &'static [AttrRule] = if self.facets { FACETS } else { &[] };
        self.attrs.iter().chain(facets)
    }
}

const fn text(name: &'static str) -> AttrRule {
    AttrRule {
        name,
        coercion: Coercion::Text,
        required: false,
    }
}

const fn required(name: &'static str) -> AttrRule {
    AttrRule {
        name,
        coercion: Coercion::Text,
        required: true,
    }
}

const fn boolean(name: &'static str) -> AttrRule {
    AttrRule {
        name,
        coercion: Coercion::Bool,
        required: false,
    }
}

const fn int(name: &'static str) -> AttrRule {
    AttrRule {
        name,
        coercion: Coercion::Int,
        required: false,
    }
}

const fn date(name: &'static str) -> AttrRule {
    AttrRule {
        name,
        coercion: Coercion::Date,
        required: false,
    }
}

const fn many(tag: &'static str) -> ChildRule {
    ChildRule {
        tag,
        arity: Arity::Many,
    }
}

const fn single(tag: &'static str) -> ChildRule {
    ChildRule {
        tag,
        arity: Arity::Single,
    }
}

const ANNOTATED: &[ChildRule] = &[many("Annotation")];

// Facets of every element that declares a type.
const FACETS: &[AttrRule] = &[
    text("MaxLength"),
    int("Precision"),
    text("Scale"),
    text("SRID"),
    boolean("Unicode"),
];

/// One row per recognized CSDL tag.
pub(crate) static GRAMMAR: &[ElementRule] = &[
    ElementRule {
        tag: "Edmx",
        attrs: &[text("Version")],
        children: &[many("Reference"), single("DataServices")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Reference",
        attrs: &[required("Uri")],
        children: &[many("Include"), many("IncludeAnnotations"), many("Annotation")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Include",
        attrs: &[required("Namespace"), text("Alias")],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "IncludeAnnotations",
        attrs: &[required("TermNamespace"), text("Qualifier"), text("TargetNamespace")],
        children: &[],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "DataServices",
        attrs: &[],
        children: &[many("Schema")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Schema",
        attrs: &[required("Namespace"), text("Alias")],
        children: &[
            many("EntityType"),
            many("ComplexType"),
            many("EnumType"),
            many("TypeDefinition"),
            many("Function"),
            many("Action"),
            many("EntityContainer"),
            many("Term"),
            many("Annotations"),
            many("Annotation"),
        ],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "EntityType",
        attrs: &[
            required("Name"),
            text("BaseType"),
            boolean("Abstract"),
            boolean("OpenType"),
            boolean("HasStream"),
        ],
        children: &[
            single("Key"),
            many("Property"),
            many("NavigationProperty"),
            many("Annotation"),
        ],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "ComplexType",
        attrs: &[
            required("Name"),
            text("BaseType"),
            boolean("Abstract"),
            boolean("OpenType"),
        ],
        children: &[
            many("Property"),
            many("NavigationProperty"),
            many("Annotation"),
        ],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Key",
        attrs: &[],
        children: &[many("PropertyRef")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "PropertyRef",
        attrs: &[required("Name"), text("Alias")],
        children: &[],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Property",
        attrs: &[
            required("Name"),
            required("Type"),
            boolean("Nullable"),
            text("DefaultValue"),
        ],
        children: ANNOTATED,
        opaque: false,
        facets: true,
    },
    ElementRule {
        tag: "NavigationProperty",
        attrs: &[
            required("Name"),
            required("Type"),
            boolean("Nullable"),
            text("Partner"),
            boolean("ContainsTarget"),
        ],
        children: &[
            single("ReferentialConstraint"),
            single("OnDelete"),
            many("Annotation"),
        ],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "ReferentialConstraint",
        attrs: &[required("Property"), required("ReferencedProperty")],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "OnDelete",
        attrs: &[required("Action")],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "EnumType",
        attrs: &[required("Name"), text("UnderlyingType"), boolean("IsFlags")],
        children: &[many("Member"), many("Annotation")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Member",
        attrs: &[required("Name"), int("Value")],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "TypeDefinition",
        attrs: &[required("Name"), required("UnderlyingType")],
        children: ANNOTATED,
        opaque: false,
        facets: true,
    },
    ElementRule {
        tag: "Function",
        attrs: &[
            required("Name"),
            boolean("IsBound"),
            boolean("IsComposable"),
            text("EntitySetPath"),
        ],
        children: &[many("Parameter"), single("ReturnType"), many("Annotation")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Action",
        attrs: &[required("Name"), boolean("IsBound"), text("EntitySetPath")],
        children: &[many("Parameter"), single("ReturnType"), many("Annotation")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Parameter",
        attrs: &[required("Name"), required("Type"), boolean("Nullable")],
        children: ANNOTATED,
        opaque: false,
        facets: true,
    },
    ElementRule {
        tag: "ReturnType",
        attrs: &[required("Type"), boolean("Nullable")],
        children: ANNOTATED,
        opaque: false,
        facets: true,
    },
    ElementRule {
        tag: "EntityContainer",
        attrs: &[required("Name"), text("Extends")],
        children: &[
            many("EntitySet"),
            many("Singleton"),
            many("FunctionImport"),
            many("ActionImport"),
            many("Annotation"),
        ],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "EntitySet",
        attrs: &[
            required("Name"),
            required("EntityType"),
            boolean("IncludeInServiceDocument"),
        ],
        children: &[many("NavigationPropertyBinding"), many("Annotation")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Singleton",
        attrs: &[required("Name"), required("Type")],
        children: &[many("NavigationPropertyBinding"), many("Annotation")],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "NavigationPropertyBinding",
        attrs: &[required("Path"), required("Target")],
        children: &[],
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "FunctionImport",
        attrs: &[
            required("Name"),
            required("Function"),
            text("EntitySet"),
            boolean("IncludeInServiceDocument"),
        ],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "ActionImport",
        attrs: &[required("Name"), required("Action"), text("EntitySet")],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Term",
        attrs: &[
            required("Name"),
            required("Type"),
            text("BaseTerm"),
            text("DefaultValue"),
            text("AppliesTo"),
            boolean("Nullable"),
        ],
        children: ANNOTATED,
        opaque: false,
        facets: true,
    },
    ElementRule {
        tag: "Annotations",
        attrs: &[required("Target"), text("Qualifier")],
        children: ANNOTATED,
        opaque: false,
        facets: false,
    },
    ElementRule {
        tag: "Annotation",
        attrs: &[
            required("Term"),
            text("Qualifier"),
            text("String"),
            boolean("Bool"),
            int("Int"),
            text("Float"),
            text("Decimal"),
            date("Date"),
            text("EnumMember"),
            text("Path"),
        ],
        children: &[],
        opaque: true,
        facets: false,
    },
];

/// Looks up the grammar row for a tag.
pub(crate) fn rule(tag: &str) -> Option<&'static ElementRule> {
    GRAMMAR.iter().find(|r| r.tag == tag)
}

/// Generic element tree produced by the walk.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub tag: &'static str,
    pub attrs: IndexMap<&'static str, AttrValue>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(AttrValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.attrs.get(name) {
            Some(AttrValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.attrs.get(name) {
            Some(AttrValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.attrs.get(name) {
            Some(AttrValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    /// A required text attribute. The walk already enforced presence.
    pub fn name_of(&self, name: &str) -> ParseResult<String> {
        self.text(name)
            .map(str::to_string)
            .ok_or_else(|| ParseError::MissingAttribute {
                element: self.tag.to_string(),
                attribute: name.to_string(),
            })
    }

    pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.tag == tag)
    }
}

/// Walks `element` against its grammar row.
pub(crate) fn walk(
    element: roxmltree::Node<'_, '_>,
    rule: &'static ElementRule,
) -> ParseResult<Node> {
    let mut attrs = IndexMap::new();
    for attr_rule in rule.attr_rules() {
        match element.attribute(attr_rule.name) {
            Some(raw) => {
                attrs.insert(attr_rule.name, coerce(rule.tag, attr_rule, raw)?);
            }
            None if attr_rule.required => {
                return Err(ParseError::MissingAttribute {
                    element: rule.tag.to_string(),
                    attribute: attr_rule.name.to_string(),
                });
            }
            None => {}
        }
    }

    let mut children = Vec::new();
    if !rule.opaque {
        for child in element.children().filter(|c| c.is_element()) {
            let tag = child.tag_name().name();
            let child_rule = rule
                .children
                .iter()
                .find(|c| c.tag == tag)
                .ok_or_else(|| ParseError::UnknownElement {
                    parent: rule.tag.to_string(),
                    tag: tag.to_string(),
                })?;
            if child_rule.arity == Arity::Single
                && children.iter().any(|n: &Node| n.tag == child_rule.tag)
            {
                return Err(ParseError::DuplicateElement {
                    parent: rule.tag.to_string(),
                    tag: tag.to_string(),
                });
            }
            let grammar = self::rule(child_rule.tag).ok_or_else(|| ParseError::UnknownElement {
                parent: rule.tag.to_string(),
                tag: tag.to_string(),
            })?;
            children.push(walk(child, grammar)?);
        }
    }

    Ok(Node {
        tag: rule.tag,
        attrs,
        children,
    })
}

fn coerce(element: &str, rule: &AttrRule, raw: &str) -> ParseResult<AttrValue> {
    let invalid = |expected: &'static str| ParseError::InvalidAttribute {
        element: element.to_string(),
        attribute: rule.name.to_string(),
        value: raw.to_string(),
        expected,
    };
    match rule.coercion {
        Coercion::Text => Ok(AttrValue::Text(raw.to_string())),
        Coercion::Bool => match raw {
            "true" => Ok(AttrValue::Bool(true)),
            "false" => Ok(AttrValue::Bool(false)),
            _ => Err(invalid("boolean")),
        },
        Coercion::Int => raw
            .trim()
            .parse::<i64>()
            .map(AttrValue::Int)
            .map_err(|_| invalid("integer")),
        Coercion::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(AttrValue::Date)
            .map_err(|_| invalid("date")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_str(xml: &str) -> ParseResult<Node> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        let rule = rule(root.tag_name().name()).unwrap();
        walk(root, rule)
    }

    #[test]
    fn test_every_child_tag_has_a_row() {
        for row in GRAMMAR {
            for child in row.children {
                assert!(
                    rule(child.tag).is_some(),
                    "{} has no grammar row",
                    child.tag
                );
            }
        }
    }

    #[test]
    fn test_boolean_coercion_keeps_absence_distinct() {
        let node = walk_str(r#"<Property Name="A" Type="Edm.String" Nullable="false"/>"#).unwrap();
        assert_eq!(node.bool("Nullable"), Some(false));
        assert_eq!(node.bool("Unicode"), None);
    }

    #[test]
    fn test_invalid_boolean_is_fatal() {
        let err = walk_str(r#"<Property Name="A" Type="Edm.String" Nullable="no"/>"#).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidAttribute { expected: "boolean", .. }
        ));
    }

    #[test]
    fn test_unknown_child_is_fatal() {
        let err = walk_str(r#"<EnumType Name="E"><Bogus/></EnumType>"#).unwrap_err();
        match err {
            ParseError::UnknownElement { parent, tag } => {
                assert_eq!(parent, "EnumType");
                assert_eq!(tag, "Bogus");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_singular_child() {
        let xml = r#"<EntityType Name="E">
            <Key><PropertyRef Name="Id"/></Key>
            <Key><PropertyRef Name="Id"/></Key>
        </EntityType>"#;
        assert!(matches!(
            walk_str(xml),
            Err(ParseError::DuplicateElement { .. })
        ));
    }

    #[test]
    fn test_missing_required_attribute() {
        let err = walk_str(r#"<Member Value="1"/>"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingAttribute { .. }));
    }

    #[test]
    fn test_annotation_is_opaque() {
        let xml = r#"<Annotation Term="Core.Description">
            <String>free-form expression</String>
        </Annotation>"#;
        let node = walk_str(xml).unwrap();
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_facets_apply_to_every_typed_element() {
        for xml in [
            r#"<Property Name="A" Type="Edm.Decimal" Precision="x"/>"#,
            r#"<Parameter Name="A" Type="Edm.Decimal" Precision="x"/>"#,
            r#"<ReturnType Type="Edm.Decimal" Precision="x"/>"#,
            r#"<TypeDefinition Name="A" UnderlyingType="Edm.Decimal" Precision="x"/>"#,
        ] {
            let err = walk_str(xml).unwrap_err();
            let expected = match &err {
                ParseError::InvalidAttribute { expected, .. } => *expected,
                other => panic!("{xml}: {other:?}"),
            };
            assert_eq!(expected, "integer");
        }

        let money = r#"<TypeDefinition Name="Money" UnderlyingType="Edm.Decimal"
            Precision="18" Scale="2" Unicode="false"/>"#;
        let node = walk_str(money).unwrap();
        assert_eq!(node.int("Precision"), Some(18));
        assert_eq!(node.text("Scale"), Some("2"));
        assert_eq!(node.bool("Unicode"), Some(false));
        assert_eq!(node.bool("Nullable"), None);
    }

    #[test]
    fn test_date_coercion() {
        let node = walk_str(r#"<Annotation Term="X.Since" Date="2020-01-31"/>"#).unwrap();
        assert_eq!(node.date("Date"), NaiveDate::from_ymd_opt(2020, 1, 31));
    }
}
