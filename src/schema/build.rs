use super::capture::{self, CapturedField, DeclaredType, PayloadKey, PayloadShape, SchemaError};
use super::types::{FieldKind, FieldNode};
use crate::phase::SynthConfig;
use tracing::debug;

/// Build the field tree for a Rust payload class.
///
/// Registers the class on demand (a no-op if it is already registered), then
/// resolves every captured declaration recursively. Pure over the populated
/// registry: repeated calls return structurally identical nodes and never
/// consume a new payload id.
///
/// # Errors
///
/// Fails with [`SchemaError::NestingTooDeep`] when payload nesting exceeds
/// the configured bound (a class that nests itself always does), or with the
/// capture-time errors of any declaration registered lazily here.
pub fn build_field_tree<T: PayloadShape>() -> Result<FieldNode, SchemaError> {
    capture::register_payload::<T>()?;
    build_class(&PayloadKey::of::<T>(), T::NAME, 0, &SynthConfig::from_env())
}

/// Build the field tree for a name-keyed (manifest-declared) payload class.
pub fn build_named_field_tree(name: &str) -> Result<FieldNode, SchemaError> {
    build_class(&PayloadKey::named(name), name, 0, &SynthConfig::from_env())
}

/// As [`build_field_tree`]/[`build_named_field_tree`] but with an explicit
/// configuration instead of the environment-derived one.
pub fn build_field_tree_for(key: &PayloadKey, name: &str, config: &SynthConfig) -> Result<FieldNode, SchemaError> {
    build_class(key, name, 0, config)
}

fn build_class(
    key: &PayloadKey,
    name_hint: &str,
    depth: usize,
    config: &SynthConfig,
) -> Result<FieldNode, SchemaError> {
    let entry = capture::snapshot(key).ok_or_else(|| SchemaError::UnknownPayload {
        name: name_hint.to_string(),
    })?;
    if depth >= config.max_nesting_depth {
        return Err(SchemaError::NestingTooDeep {
            payload: entry.meta.name.clone(),
            limit: config.max_nesting_depth,
        });
    }

    let mut properties = Vec::with_capacity(entry.fields.len());
    for field in &entry.fields {
        properties.push(resolve_field(field, &entry.meta.name, depth, config)?);
    }
    debug!(payload = %entry.meta.name, id = %entry.meta.id, fields = properties.len(), "built field tree");

    let mut root = FieldNode::object(entry.meta.name.clone(), properties);
    root.payload = Some(entry.meta);
    Ok(root)
}

fn resolve_field(
    captured: &CapturedField,
    owner: &str,
    depth: usize,
    config: &SynthConfig,
) -> Result<FieldNode, SchemaError> {
    let decl = &captured.decl;
    // Ambient type already resolved at capture where possible; what is left
    // unresolved falls back to the opaque Object kind.
    let ty = decl.ty.clone().unwrap_or(DeclaredType::Object);

    let mut node = match ty {
        DeclaredType::String => FieldNode::scalar(captured.property.clone(), FieldKind::String),
        DeclaredType::Number => FieldNode::scalar(captured.property.clone(), FieldKind::Number),
        DeclaredType::Boolean => FieldNode::scalar(captured.property.clone(), FieldKind::Boolean),
        DeclaredType::Object => FieldNode::object(captured.property.clone(), Vec::new()),
        DeclaredType::Payload(p) => {
            p.ensure_registered()?;
            let class = build_class(p.key(), p.name(), depth + 1, config)?;
            let mut node = FieldNode::object(captured.property.clone(), Vec::new());
            node.properties = class.properties;
            node.payload = class.payload;
            node
        }
        DeclaredType::Array(element) => match element.as_ref() {
            DeclaredType::String => FieldNode::array(
                captured.property.clone(),
                FieldNode::scalar(captured.property.clone(), FieldKind::String),
            ),
            DeclaredType::Number => FieldNode::array(
                captured.property.clone(),
                FieldNode::scalar(captured.property.clone(), FieldKind::Number),
            ),
            DeclaredType::Boolean => FieldNode::array(
                captured.property.clone(),
                FieldNode::scalar(captured.property.clone(), FieldKind::Boolean),
            ),
            DeclaredType::Payload(p) => {
                p.ensure_registered()?;
                let class = build_class(p.key(), p.name(), depth + 1, config)?;
                let mut node = FieldNode::array(captured.property.clone(), class);
                node.payload = node.items.as_ref().and_then(|i| i.payload.clone());
                node
            }
            other => {
                // Capture validates element kinds; a stale registry entry
                // from a future declaration shape still gets a clear error.
                return Err(SchemaError::UnsupportedFieldType {
                    payload: owner.to_string(),
                    property: captured.property.clone(),
                    declared: format!("[{:?}]", other),
                });
            }
        },
    };

    node.destination_name = decl
        .destination_name
        .clone()
        .unwrap_or_else(|| captured.property.clone());
    node.source = decl.source.unwrap_or_default();
    node.validation = decl.validation.clone();
    node.direct_template_value = decl.direct_template_value.clone();
    node.initial_value = decl.initial_value.clone();
    Ok(node)
}
