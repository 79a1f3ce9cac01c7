use velomap::{
    build_field_tree, generate_template_with, FieldKind, FieldSource, Payload, DEFAULT_QUOTE,
};

#[derive(Payload)]
struct Address {
    street: String,
    zip: f64,
}

#[derive(Payload)]
struct Profile {
    #[field(name = "displayName")]
    display_name: String,
    address: Address,
    tags: Vec<String>,
    #[field(source = "query")]
    verbose: Option<bool>,
}

fn init() {
    velomap::phase::enter_build_phase();
}

#[test]
fn test_builds_nested_tree_in_declaration_order() {
    init();
    let tree = build_field_tree::<Profile>().unwrap();
    assert_eq!(tree.kind, FieldKind::Object);
    assert_eq!(tree.payload.as_ref().unwrap().name, "Profile");

    let props = tree.properties.as_ref().unwrap();
    let names: Vec<&str> = props.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["displayName", "address", "tags", "verbose"]);

    assert_eq!(props[0].kind, FieldKind::String);
    assert_eq!(props[1].kind, FieldKind::Object);
    assert_eq!(props[1].payload.as_ref().unwrap().name, "Address");
    assert_eq!(props[2].kind, FieldKind::Array);
    assert_eq!(props[2].items.as_ref().unwrap().kind, FieldKind::String);
    assert_eq!(props[3].kind, FieldKind::Boolean);
    assert_eq!(props[3].source, FieldSource::Query);
    assert!(!props[3].validation.required, "Option<T> fields are optional");
}

#[test]
fn test_nested_class_fields_resolve_recursively() {
    init();
    let tree = build_field_tree::<Profile>().unwrap();
    let address = &tree.properties.as_ref().unwrap()[1];
    let nested = address.properties.as_ref().unwrap();
    assert_eq!(nested.len(), 2);
    assert_eq!(nested[0].name, "street");
    assert_eq!(nested[0].kind, FieldKind::String);
    assert_eq!(nested[1].name, "zip");
    assert_eq!(nested[1].kind, FieldKind::Number);
}

#[test]
fn test_nested_object_compiles_to_dotted_body_paths() {
    init();
    let tree = build_field_tree::<Profile>().unwrap();
    let address = &tree.properties.as_ref().unwrap()[1];
    let out = generate_template_with(address, Some("user"), DEFAULT_QUOTE, None);
    assert!(out.contains("\"street\": \"$input.path('$.user.street')\""));
    assert!(out.contains("\"zip\": $input.path('$.user.zip')"));
}

#[test]
fn test_repeated_builds_share_identity_and_structure() {
    init();
    let first = build_field_tree::<Profile>().unwrap();
    let second = build_field_tree::<Profile>().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.payload.as_ref().unwrap().id,
        second.payload.as_ref().unwrap().id,
        "payload id is assigned once per registration, not per build"
    );
}

#[test]
fn test_tree_serializes_for_external_consumers() {
    init();
    let tree = build_field_tree::<Profile>().unwrap();
    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["kind"], "Object");
    assert_eq!(json["properties"][0]["name"], "displayName");
    let back: velomap::FieldNode = serde_json::from_value(json).unwrap();
    assert_eq!(back, tree);
}
