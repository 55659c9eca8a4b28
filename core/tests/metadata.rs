use odata_core::{
    attrs, parse, Codec, ErrorsByField, FieldErrors, KeyValue, Method, ParseError,
    ParserOptions, TypeRegistry, ValidateOptions, Value, Violation,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

const PEOPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="People" Alias="P" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EnumType Name="Color" IsFlags="true">
        <Member Name="Red" Value="1"/>
        <Member Name="Green" Value="2"/>
        <Member Name="Blue" Value="4"/>
      </EnumType>
      <EntityType Name="Person">
        <Key>
          <PropertyRef Name="FirstName"/>
          <PropertyRef Name="LastName"/>
        </Key>
        <Property Name="FirstName" Type="Edm.String" Nullable="false"/>
        <Property Name="LastName" Type="Edm.String" Nullable="false"/>
        <Property Name="Favorite" Type="P.Color"/>
        <Property Name="Pet" Type="People.Animal"/>
        <Property Name="Pets" Type="Collection(People.Animal)"/>
        <Property Name="Tags" Type="Collection(Edm.String)" MaxLength="3"/>
      </EntityType>
      <EntityType Name="Badge">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int64" Nullable="false">
          <Annotation Term="Org.OData.Core.V1.Computed" Bool="true"/>
        </Property>
        <Property Name="Label" Type="Edm.String" Nullable="false" MaxLength="4"/>
      </EntityType>
      <EntityType Name="Animal" Abstract="true">
        <Property Name="Name" Type="Edm.String"/>
      </EntityType>
      <EntityType Name="Cat" BaseType="People.Animal">
        <Property Name="Lives" Type="Edm.Int32"/>
      </EntityType>
      <EntityType Name="Dog" BaseType="People.Animal">
        <Property Name="Good" Type="Edm.Boolean"/>
        <Property Name="Coat" Type="People.Color"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

fn registry() -> TypeRegistry {
    TypeRegistry::from_xml(PEOPLE).unwrap()
}

#[test]
fn test_flags_enum_forms() {
    let registry = registry();
    let color = registry.enum_type("People.Color").unwrap();
    let bare = ParserOptions::default();
    let qualified = ParserOptions {
        string_as_enum: false,
        ..ParserOptions::default()
    };

    assert_eq!(
        color.deserialize(&json!("Red, Blue"), &bare).unwrap(),
        Value::Enum(5)
    );
    assert_eq!(
        color.deserialize(&json!("P.Color'Red,Blue'"), &bare).unwrap(),
        Value::Enum(5)
    );
    assert_eq!(color.deserialize(&json!(5), &bare).unwrap(), Value::Enum(5));

    assert_eq!(
        color.serialize(&Value::Enum(5), &bare).unwrap(),
        json!("Red, Blue")
    );
    assert_eq!(
        color.serialize(&Value::Enum(5), &qualified).unwrap(),
        json!("People.Color'Red, Blue'")
    );
    assert_eq!(
        color.encode(&Value::Enum(5), &bare).unwrap(),
        "People.Color'Red,Blue'"
    );
    assert!(color.deserialize(&json!(8), &bare).is_err());
}

#[test]
fn test_composite_and_single_keys() {
    let registry = registry();
    let opts = ParserOptions::default();

    let person = registry.structured_type("People.Person").unwrap();
    let ada = attrs! { "FirstName" => "Ada", "LastName" => "Lovelace" };
    let key = person.resolve_key(&ada, &opts).unwrap();
    assert_eq!(
        key.to_json(),
        json!({"FirstName": "Ada", "LastName": "Lovelace"})
    );
    let partial = attrs! { "FirstName" => "Ada" };
    assert!(person.resolve_key(&partial, &opts).is_none());

    let badge = registry.structured_type("People.Badge").unwrap();
    assert_eq!(
        badge.resolve_key(&attrs! { "Id" => 42i64 }, &opts),
        Some(KeyValue::Single(json!(42)))
    );
}

#[test]
fn test_missing_version_is_rejected() {
    let xml = r#"<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices/>
</edmx:Edmx>"#;
    assert!(matches!(parse(xml), Err(ParseError::MissingVersion)));
    assert!(TypeRegistry::from_xml(xml).is_err());
}

#[test]
fn test_polymorphic_field_dispatch() {
    let registry = registry();
    let opts = ParserOptions::default();
    let person = registry.structured_type("People.Person").unwrap();
    let pet = person.field("Pet").unwrap();

    let tom = json!({"@odata.type": "#People.Cat", "Name": "Tom", "Lives": "9"});
    let cat = pet.deserialize(&tom, &opts).unwrap();
    assert_eq!(
        cat.as_attributes().unwrap().get("Lives"),
        Some(&Value::Integer(9))
    );

    let unknown = pet
        .deserialize(&json!({"@odata.type": "#People.Fish", "Lives": "9"}), &opts)
        .unwrap();
    assert_eq!(
        unknown.as_attributes().unwrap().get("Lives"),
        Some(&Value::Json(json!("9")))
    );

    let animal = registry.structured_type("People.Animal").unwrap();
    let names: Vec<&str> = animal.children().map(|c| c.get().name()).collect();
    assert_eq!(names, vec!["Cat", "Dog"]);
    assert!(matches!(
        animal.child_parser(|c| c.is_type_of("P.Dog")),
        Codec::Structured(dog) if dog.name() == "Dog"
    ));
}

#[test]
fn test_polymorphic_serialize_uses_runtime_type() {
    let registry = registry();
    let opts = ParserOptions::default();
    let person = registry.structured_type("People.Person").unwrap();
    let pet = person.field("Pet").unwrap();

    let dog = Value::Structured(attrs! {
        "@odata.type" => "#People.Dog",
        "Name" => "Rex",
        "Coat" => Value::Enum(2),
    });
    let wire = pet.serialize(&dog, &opts).unwrap();
    assert_eq!(wire["Coat"], json!("Green"));
    assert_eq!(wire["@odata.type"], json!("#People.Dog"));

    let animal = registry.structured_type("People.Animal").unwrap();
    assert_eq!(animal.serialize(&dog, &opts).unwrap()["Coat"], json!(2));
}

#[test]
fn test_polymorphic_collection_round_trip() {
    let registry = registry();
    let opts = ParserOptions::default();
    let person = registry.structured_type("People.Person").unwrap();
    let pets = person.field("Pets").unwrap();
    let wire = json!([
        {"@odata.type": "#People.Cat", "Name": "Tom", "Lives": "9"},
        {"@odata.type": "#People.Dog", "Name": "Rex", "Good": true, "Coat": "Green, Blue"},
    ]);

    let value = pets.deserialize(&wire, &opts).unwrap();
    let items = match &value {
        Value::Collection(items) => items,
        other => panic!("Expected a collection, got {:?}", other),
    };
    assert_eq!(
        items[0].as_attributes().unwrap().get("Lives"),
        Some(&Value::Integer(9))
    );
    assert_eq!(
        items[1].as_attributes().unwrap().get("Coat"),
        Some(&Value::Enum(6))
    );
    assert_eq!(
        items[1].as_attributes().unwrap().get("Good"),
        Some(&Value::Boolean(true))
    );

    assert_eq!(
        pets.serialize(&value, &opts).unwrap(),
        json!([
            {"@odata.type": "#People.Cat", "Name": "Tom", "Lives": 9},
            {"@odata.type": "#People.Dog", "Name": "Rex", "Good": true, "Coat": "Green, Blue"},
        ])
    );
}

#[test]
fn test_second_child_decodes_own_fields() {
    let registry = registry();
    let opts = ParserOptions::default();
    let person = registry.structured_type("People.Person").unwrap();
    let pet = person.field("Pet").unwrap();

    let raw = json!({"@odata.type": "#P.Dog", "Coat": 4, "Lives": "9"});
    let dog = pet.deserialize(&raw, &opts).unwrap();
    let attrs = dog.as_attributes().unwrap();
    assert_eq!(attrs.get("Coat"), Some(&Value::Enum(4)));
    assert_eq!(attrs.get("Lives"), Some(&Value::Json(json!("9"))));
}

#[test]
fn test_collection_validation_reports_per_element() {
    let registry = registry();
    let opts = ParserOptions::default();
    let person = registry.structured_type("People.Person").unwrap();
    let raw = json!({"FirstName": "Ada", "LastName": "Lovelace", "Tags": ["toolong", "ok"]});
    let value = person.deserialize(&raw, &opts).unwrap();

    let errors = person
        .validate(value.as_attributes().unwrap(), &ValidateOptions::default())
        .unwrap();
    assert_eq!(
        errors["Tags"],
        FieldErrors::Collection(vec![
            Some(FieldErrors::Codes(vec![Violation::MaxLength])),
            None,
        ])
    );
    assert_eq!(
        serde_json::to_value(&errors).unwrap(),
        json!({"Tags": [["maxlength"], null]})
    );

    let short = attrs! {
        "FirstName" => "Ada",
        "LastName" => "Lovelace",
        "Tags" => Value::Collection(vec![Value::from("abc")]),
    };
    let full = ValidateOptions::default();
    assert!(person.validate(&short, &full).is_none());
}

#[test]
fn test_inherited_round_trip() {
    let registry = registry();
    let opts = ParserOptions::default();
    let dog = registry.structured_type("People.Dog").unwrap();
    let wire = json!({"Name": "Rex", "Good": true, "Extra": [1, 2]});

    let value = dog.deserialize(&wire, &opts).unwrap();
    assert_eq!(
        value,
        Value::Structured(attrs! {
            "Name" => "Rex",
            "Good" => true,
            "Extra" => Value::Json(json!([1, 2])),
        })
    );
    assert_eq!(dog.serialize(&value, &opts).unwrap(), wire);
}

#[test]
fn test_validation_depends_on_method() {
    let registry = registry();
    let badge = registry.structured_type("People.Badge").unwrap();
    let empty = attrs! {};

    let create = badge
        .validate(&empty, &ValidateOptions::for_method(Method::Create))
        .unwrap();
    assert_eq!(create.keys().collect::<Vec<_>>(), vec!["Label"]);

    let update = badge
        .validate(&empty, &ValidateOptions::for_method(Method::Update))
        .unwrap();
    assert_eq!(update.keys().collect::<Vec<_>>(), vec!["Id", "Label"]);

    assert!(badge
        .validate(&empty, &ValidateOptions::for_method(Method::Modify))
        .is_none());

    let cleared = attrs! { "Label" => Value::Null };
    let modify: ErrorsByField = badge
        .validate(&cleared, &ValidateOptions::for_method(Method::Modify))
        .unwrap();
    assert_eq!(
        modify["Label"],
        FieldErrors::Codes(vec![Violation::Required])
    );

    let long = attrs! { "Id" => 1i64, "Label" => "toolong" };
    let errors = badge.validate(&long, &ValidateOptions::default()).unwrap();
    assert_eq!(
        serde_json::to_value(&errors).unwrap(),
        json!({"Label": ["maxlength"]})
    );
}

#[test]
fn test_entity_schema_document() {
    let registry = registry();
    let badge = registry.structured_type("People.Badge").unwrap();
    let schema = badge.to_json_schema(&Default::default());
    assert_eq!(
        schema["$schema"],
        json!("http://json-schema.org/draft-07/schema#")
    );
    assert_eq!(schema["required"], json!(["Id", "Label"]));
    assert_eq!(schema["properties"]["Label"]["maxLength"], json!(4));
}

proptest! {
    #[test]
    fn test_flags_round_trip(bits in 0i64..8) {
        let registry = registry();
        let color = registry.enum_type("People.Color").unwrap();
        for string_as_enum in [true, false] {
            let opts = ParserOptions {
                string_as_enum,
                ..ParserOptions::default()
            };
            let wire = color.serialize(&Value::Enum(bits), &opts).unwrap();
            prop_assert_eq!(color.deserialize(&wire, &opts).unwrap(), Value::Enum(bits));
        }
    }
}
