use velomap::{
    build_field_tree, generate_template, CapturePolicy, FieldKind, Payload, PayloadShape,
};

#[derive(Payload)]
#[payload(name = "IngestRecord", capture = "always")]
struct QueueRecord {
    body: String,
    attempts: i64,
}

#[derive(Payload)]
struct Overrides {
    #[field(kind = "string")]
    version: f64,
    #[field(name = "userName", destination = "user_name")]
    renamed: String,
    #[field(max_length = 64, pattern = "^[a-z]+$")]
    slug: String,
    #[field(minimum = 0, maximum = 100)]
    score: f64,
    #[field(template = "$util.escapeJavaScript($input.body)")]
    raw: String,
    #[field(initial = 3)]
    schema_version: i64,
    #[field(required = false)]
    note: String,
}

fn init() {
    velomap::phase::enter_build_phase();
}

#[test]
fn test_payload_attribute_overrides_name_and_policy() {
    assert_eq!(QueueRecord::NAME, "IngestRecord");
    assert_eq!(QueueRecord::CAPTURE, CapturePolicy::Always);

    init();
    let tree = build_field_tree::<QueueRecord>().unwrap();
    assert_eq!(tree.payload.as_ref().unwrap().name, "IngestRecord");
}

#[test]
fn test_field_attribute_overrides() {
    init();
    let tree = build_field_tree::<Overrides>().unwrap();
    let props = tree.properties.as_ref().unwrap();

    let version = &props[0];
    assert_eq!(version.kind, FieldKind::String, "explicit kind wins over ambient");

    let renamed = &props[1];
    assert_eq!(renamed.name, "userName");
    assert_eq!(renamed.destination_name, "user_name");

    let slug = &props[2];
    assert_eq!(slug.validation.max_length, Some(64));
    assert_eq!(slug.validation.pattern.as_deref(), Some("^[a-z]+$"));

    let score = &props[3];
    assert_eq!(score.validation.minimum, Some(0.0));
    assert_eq!(score.validation.maximum, Some(100.0));

    let note = &props[6];
    assert!(!note.validation.required);
}

#[test]
fn test_direct_template_and_initial_value_attributes() {
    init();
    let tree = build_field_tree::<Overrides>().unwrap();
    let props = tree.properties.as_ref().unwrap();

    let raw = &props[4];
    assert_eq!(
        generate_template(raw),
        "$util.escapeJavaScript($input.body)"
    );

    let schema_version = &props[5];
    assert_eq!(generate_template(schema_version), "3");
}

#[derive(Payload)]
struct LineItem {
    sku: String,
    qty: i64,
}

#[derive(Payload)]
struct Order {
    id: String,
    lines: Vec<LineItem>,
}

#[test]
fn test_vec_of_payload_becomes_array_of_object() {
    init();
    let tree = build_field_tree::<Order>().unwrap();
    let lines = &tree.properties.as_ref().unwrap()[1];
    assert_eq!(lines.kind, FieldKind::Array);
    assert_eq!(lines.payload.as_ref().unwrap().name, "LineItem");

    let items = lines.items.as_ref().unwrap();
    assert_eq!(items.kind, FieldKind::Object);
    let nested: Vec<&str> = items
        .properties
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(nested, vec!["sku", "qty"]);
}
