use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The five-way type taxonomy every captured field resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldKind::String => "String",
            FieldKind::Number => "Number",
            FieldKind::Boolean => "Boolean",
            FieldKind::Object => "Object",
            FieldKind::Array => "Array",
        };
        write!(f, "{}", s)
    }
}

/// Where an HTTP-originated field's value comes from.
///
/// Meaningful only for payloads bound to a gateway integration; defaults to
/// [`FieldSource::Body`] when a declaration does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    #[default]
    Body,
    Path,
    Query,
    Header,
    Context,
}

impl std::fmt::Display for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldSource::Body => "body",
            FieldSource::Path => "path",
            FieldSource::Query => "query",
            FieldSource::Header => "header",
            FieldSource::Context => "context",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for FieldSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "body" => Ok(FieldSource::Body),
            "path" => Ok(FieldSource::Path),
            "query" => Ok(FieldSource::Query),
            "header" => Ok(FieldSource::Header),
            "context" => Ok(FieldSource::Context),
            other => Err(format!("unknown field source '{}'", other)),
        }
    }
}

/// Field presence and shape hints checked by the gateway-side guard and by
/// build-time validation.
///
/// `required` defaults to `true`; an optional field is the one case that
/// compiles to a guarded template (see [`crate::template::validate_template_argument`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

fn default_required() -> bool {
    true
}

impl Default for ValidationSpec {
    fn default() -> Self {
        ValidationSpec {
            required: true,
            maximum: None,
            minimum: None,
            max_length: None,
            pattern: None,
        }
    }
}

/// Identity of the payload class that produced an Object (or Array-of-Object)
/// node.
///
/// `id` is the declared name, suffixed by a per-name counter when distinct
/// classes collide on the same name. Assigned once per registration and never
/// reassigned by repeated tree builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    pub id: String,
    pub name: String,
}

/// A node in the recursive schema tree.
///
/// Exactly one of `properties` (Object) or `items` (Array) is present, or
/// neither for scalars; sibling names within one `properties` list are unique
/// and keep declaration order, which consumers rely on for stable loop
/// variable naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    /// Original wire name.
    pub name: String,
    /// Local binding name; defaults to `name` when the declaration does not
    /// rename the field.
    pub destination_name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub source: FieldSource,
    #[serde(default)]
    pub validation: ValidationSpec,
    /// Child fields, present iff `kind == Object` (may be empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<FieldNode>>,
    /// Element field, present iff `kind == Array`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldNode>>,
    /// Set on nodes produced by expanding a payload class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadMetadata>,
    /// Raw template text that bypasses all derivation for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_template_value: Option<String>,
    /// Constant substituted when the field is a literal rather than a
    /// request-derived value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<Value>,
}

impl FieldNode {
    /// Scalar node with everything defaulted; the usual starting point for
    /// hand-assembled trees in consumers and tests.
    pub fn scalar(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        FieldNode {
            destination_name: name.clone(),
            name,
            kind,
            source: FieldSource::default(),
            validation: ValidationSpec::default(),
            properties: None,
            items: None,
            payload: None,
            direct_template_value: None,
            initial_value: None,
        }
    }

    /// Object node over an ordered child list.
    pub fn object(name: impl Into<String>, properties: Vec<FieldNode>) -> Self {
        let mut node = FieldNode::scalar(name, FieldKind::Object);
        node.properties = Some(properties);
        node
    }

    /// Array node over a single element description.
    pub fn array(name: impl Into<String>, items: FieldNode) -> Self {
        let mut node = FieldNode::scalar(name, FieldKind::Array);
        node.items = Some(Box::new(items));
        node
    }

    pub fn with_source(mut self, source: FieldSource) -> Self {
        self.source = source;
        self
    }

    pub fn optional(mut self) -> Self {
        self.validation.required = false;
        self
    }
}
