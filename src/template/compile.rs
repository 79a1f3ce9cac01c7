use super::accessor::source_accessor;
use crate::schema::{FieldKind, FieldNode};
use serde_json::Value;

/// Scalar String accessors are wrapped in this quote unless a caller asks
/// for something else.
pub const DEFAULT_QUOTE: char = '"';

/// Caller-supplied post-processor applied to a field's compiled snippet.
pub type ValueParser<'a> = &'a dyn Fn(String, FieldKind) -> String;

/// Compile a field tree into mapping-template text with all defaults: the
/// binding path starts at the field's wire name, String scalars are wrapped
/// in `"`, and no post-processing runs.
pub fn generate_template(field: &FieldNode) -> String {
    generate_template_with(field, None, DEFAULT_QUOTE, None)
}

/// Compile a field tree into mapping-template text.
///
/// `current_value` is the dotted/positional path reached so far (defaults to
/// the field's wire name); `quote` wraps scalar String accessors;
/// `value_parser`, when supplied, post-processes the outermost compiled text
/// as `(text, kind)` without altering the recursive algorithm.
///
/// A node carrying `direct_template_value` is returned unchanged, skipping
/// every derivation rule. The compiler never mutates the tree and is
/// deterministic over it.
pub fn generate_template_with(
    field: &FieldNode,
    current_value: Option<&str>,
    quote: char,
    value_parser: Option<ValueParser<'_>>,
) -> String {
    let path = match current_value {
        Some(cv) => cv.to_string(),
        None => field.name.clone(),
    };
    let compiled = compile_node(field, &path, quote, 0);
    match value_parser {
        Some(parser) => parser(compiled, field.kind),
        None => compiled,
    }
}

fn compile_node(field: &FieldNode, current_value: &str, quote: char, array_depth: usize) -> String {
    if let Some(direct) = &field.direct_template_value {
        return direct.clone();
    }
    if let Some(value) = &field.initial_value {
        return literal_text(value, field.kind, quote);
    }

    match field.kind {
        FieldKind::String => {
            let accessor = source_accessor(field.source, current_value, false);
            if current_value.starts_with('$') {
                // Loop-bound values are substituted by the evaluator itself;
                // wrapping them would double-quote rendered elements.
                accessor
            } else {
                format!("{quote}{accessor}{quote}")
            }
        }
        FieldKind::Number | FieldKind::Boolean => source_accessor(field.source, current_value, false),
        FieldKind::Object => {
            let mut entries: Vec<String> = Vec::new();
            for child in field.properties.as_deref().unwrap_or_default() {
                let child_path = format!("{}.{}", current_value, child.name);
                let child_text = compile_node(child, &child_path, quote, array_depth);
                entries.push(format!(
                    "\"{}\": {} #set($comma = \",\")",
                    child.destination_name, child_text
                ));
            }
            // $comma is the render-time seen-first-entry flag: it is empty
            // until an entry has rendered, so skipped guarded entries never
            // leave a dangling comma.
            format!("{{ #set($comma = \"\") {} }}", entries.join(" $comma "))
        }
        FieldKind::Array => {
            let accessor = source_accessor(field.source, current_value, true);
            let loop_var = format!("$item{}", array_depth);
            let element = match &field.items {
                Some(items) => compile_node(items, &loop_var, quote, array_depth + 1),
                None => loop_var.clone(),
            };
            format!(
                "[#foreach({loop_var} in {accessor}) {element} #if($foreach.hasNext),#end #end]"
            )
        }
    }
}

fn literal_text(value: &Value, kind: FieldKind, quote: char) -> String {
    match value {
        Value::String(s) if kind == FieldKind::String => format!("{quote}{s}{quote}"),
        other => other.to_string(),
    }
}
