use super::capture::{
    capture_field, declare_payload, CapturePolicy, DeclaredType, FieldDecl, PayloadRef, SchemaError,
};
use super::types::{FieldSource, ValidationSpec};
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawManifest {
    payloads: Vec<RawPayload>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    name: String,
    #[serde(default)]
    capture: Option<String>,
    #[serde(default)]
    fields: Vec<RawField>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(default, rename = "type")]
    ty: Option<Value>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    maximum: Option<f64>,
    #[serde(default)]
    minimum: Option<f64>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    initial: Option<Value>,
}

fn scalar_type(keyword: &str) -> DeclaredType {
    match keyword {
        "string" => DeclaredType::String,
        "number" | "integer" => DeclaredType::Number,
        "boolean" => DeclaredType::Boolean,
        "object" => DeclaredType::Object,
        // Anything that is not a type keyword names another payload class.
        other => DeclaredType::Payload(PayloadRef::named(other)),
    }
}

/// Resolve a manifest `type` value into a declared type.
///
/// A scalar keyword maps directly; a one-element sequence marks an array of
/// the element type. Everything else is the unsupported-type build error.
fn parse_type(payload: &str, property: &str, value: &Value) -> Result<DeclaredType, SchemaError> {
    let unsupported = || SchemaError::UnsupportedFieldType {
        payload: payload.to_string(),
        property: property.to_string(),
        declared: value.to_string(),
    };
    match value {
        Value::String(s) => Ok(scalar_type(s)),
        Value::Array(items) => {
            if items.len() != 1 {
                return Err(unsupported());
            }
            match &items[0] {
                Value::String(s) => match scalar_type(s) {
                    DeclaredType::Object => Err(unsupported()),
                    element => Ok(DeclaredType::array(element)),
                },
                _ => Err(unsupported()),
            }
        }
        _ => Err(unsupported()),
    }
}

fn parse_capture(payload: &str, value: Option<&str>) -> anyhow::Result<CapturePolicy> {
    match value {
        None | Some("build") => Ok(CapturePolicy::BuildPhase),
        Some("always") => Ok(CapturePolicy::Always),
        Some(other) => bail!(
            "payload '{}': unknown capture policy '{}' (expected 'build' or 'always')",
            payload,
            other
        ),
    }
}

fn field_decl(payload: &str, raw: &RawField) -> anyhow::Result<FieldDecl> {
    let ty = match &raw.ty {
        Some(value) => Some(parse_type(payload, &raw.name, value)?),
        None => None,
    };
    let source = match &raw.source {
        Some(s) => Some(
            s.parse::<FieldSource>()
                .map_err(|e| anyhow::anyhow!("payload '{}', field '{}': {}", payload, raw.name, e))?,
        ),
        None => None,
    };
    Ok(FieldDecl {
        ty,
        source,
        destination_name: raw.destination.clone(),
        validation: ValidationSpec {
            required: raw.required,
            maximum: raw.maximum,
            minimum: raw.minimum,
            max_length: raw.max_length,
            pattern: raw.pattern.clone(),
        },
        direct_template_value: raw.template.clone(),
        initial_value: raw.initial.clone(),
    })
}

/// Load a payload manifest (YAML or JSON by extension) and register every
/// declared class. Returns the class names in declaration order.
///
/// Classes without `capture: always` register only while the process is in
/// the build phase, like any other capture call.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any field
/// declaration fails capture-time validation.
pub fn load_manifest(file_path: &str) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("reading payload manifest {}", file_path))?;
    let value: Value = if file_path.ends_with(".yaml") || file_path.ends_with(".yml") {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    let manifest: RawManifest = serde_json::from_value(value)
        .with_context(|| format!("parsing payload manifest {}", file_path))?;

    let mut names = Vec::with_capacity(manifest.payloads.len());
    for payload in &manifest.payloads {
        let policy = parse_capture(&payload.name, payload.capture.as_deref())?;
        declare_payload(&payload.name, policy);
        for raw in &payload.fields {
            let decl = field_decl(&payload.name, raw)?;
            capture_field(&payload.name, &raw.name, decl)?;
        }
        debug!(payload = %payload.name, fields = payload.fields.len(), "loaded payload declaration");
        names.push(payload.name.clone());
    }
    Ok(names)
}
