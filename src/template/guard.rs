use super::accessor::source_accessor;
use crate::schema::{FieldKind, FieldNode};

/// Wrap an optional field's compiled template in its validation guard.
///
/// Required fields (the default) pass `template_content` through unchanged.
/// Optional fields get `#if(<conditions>) <content> #end`, one condition per
/// entry in `argument_names`, ANDed in the given order:
///
/// - `check_source = true` re-derives each condition from the field's source
///   the same way the compiler does (multi-valued query form for arrays);
/// - `check_source = false` emits each name as a bare identifier reference,
///   for guarding on an already-bound local instead of the request.
///
/// An optional array must be both present and non-empty, so a further
/// `.size() > 0` conjunct on the field's own accessor is appended.
pub fn validate_template_argument(
    argument_names: &[&str],
    field: &FieldNode,
    template_content: &str,
    check_source: bool,
) -> String {
    if field.validation.required {
        return template_content.to_string();
    }

    let multi_value = field.kind == FieldKind::Array;
    let mut conditions: Vec<String> = argument_names
        .iter()
        .map(|name| {
            if check_source {
                source_accessor(field.source, name, multi_value)
            } else {
                (*name).to_string()
            }
        })
        .collect();

    if field.kind == FieldKind::Array {
        let base = if check_source {
            source_accessor(field.source, &field.name, true)
        } else {
            field.name.clone()
        };
        conditions.push(format!("{}.size() > 0", base));
    }

    format!("#if({}) {} #end", conditions.join(" && "), template_content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSource;

    fn optional(mut field: FieldNode) -> FieldNode {
        field.validation.required = false;
        field
    }

    #[test]
    fn test_required_field_passes_through() {
        let field = FieldNode::scalar("name", FieldKind::String);
        assert_eq!(
            validate_template_argument(&["name"], &field, "TEMPLATE_CONTENT", true),
            "TEMPLATE_CONTENT"
        );
    }

    #[test]
    fn test_bare_identifier_guard() {
        let field = optional(FieldNode::scalar("name", FieldKind::String));
        assert_eq!(
            validate_template_argument(&["test"], &field, "TEMPLATE_CONTENT", false),
            "#if(test) TEMPLATE_CONTENT #end"
        );
    }

    #[test]
    fn test_multiple_conditions_keep_argument_order() {
        let field = optional(FieldNode::scalar("name", FieldKind::String));
        assert_eq!(
            validate_template_argument(&["a", "b", "c"], &field, "X", false),
            "#if(a && b && c) X #end"
        );
    }

    #[test]
    fn test_source_guard_honors_field_source() {
        let field = optional(
            FieldNode::scalar("filter", FieldKind::String).with_source(FieldSource::Query),
        );
        assert_eq!(
            validate_template_argument(&["filter"], &field, "X", true),
            "#if($input.params('filter')) X #end"
        );
    }

    #[test]
    fn test_optional_array_requires_nonempty() {
        let field = optional(FieldNode::array(
            "items",
            FieldNode::scalar("items", FieldKind::String),
        ));
        assert_eq!(
            validate_template_argument(&["items"], &field, "TEMPLATE_CONTENT", true),
            "#if($input.path('$.items') && $input.path('$.items').size() > 0) TEMPLATE_CONTENT #end"
        );
    }

    #[test]
    fn test_optional_array_bare_mode_sizes_the_binding() {
        let field = optional(FieldNode::array(
            "items",
            FieldNode::scalar("items", FieldKind::String),
        ));
        assert_eq!(
            validate_template_argument(&["items"], &field, "X", false),
            "#if(items && items.size() > 0) X #end"
        );
    }
}
