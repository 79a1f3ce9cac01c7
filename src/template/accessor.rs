use crate::schema::FieldSource;

/// Map a field source and binding path to the gateway accessor expression.
///
/// A `current_value` that already names a template variable (a loop binding
/// like `$item0`, or a dotted path under one) is a value, not a request
/// location, and passes through verbatim.
///
/// `multi_value` selects the multi-valued form of a query parameter; it only
/// changes the output for [`FieldSource::Query`].
pub fn source_accessor(source: FieldSource, current_value: &str, multi_value: bool) -> String {
    if current_value.starts_with('$') {
        return current_value.to_string();
    }
    match source {
        FieldSource::Body => format!("$input.path('$.{}')", current_value),
        FieldSource::Path => format!("$input.params().path.get('{}')", current_value),
        FieldSource::Query => {
            if multi_value {
                format!("$method.request.multivaluequerystring.get('{}')", current_value)
            } else {
                format!("$input.params('{}')", current_value)
            }
        }
        FieldSource::Header => format!("$input.params().header.get('{}')", current_value),
        FieldSource::Context => format!("$context.{}", current_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body() {
        assert_eq!(
            source_accessor(FieldSource::Body, "username", false),
            "$input.path('$.username')"
        );
    }

    #[test]
    fn test_path() {
        assert_eq!(
            source_accessor(FieldSource::Path, "id", false),
            "$input.params().path.get('id')"
        );
    }

    #[test]
    fn test_query_single() {
        assert_eq!(
            source_accessor(FieldSource::Query, "filter", false),
            "$input.params('filter')"
        );
    }

    #[test]
    fn test_query_multi() {
        assert_eq!(
            source_accessor(FieldSource::Query, "tags", true),
            "$method.request.multivaluequerystring.get('tags')"
        );
    }

    #[test]
    fn test_header() {
        assert_eq!(
            source_accessor(FieldSource::Header, "authorization", false),
            "$input.params().header.get('authorization')"
        );
    }

    #[test]
    fn test_context() {
        assert_eq!(
            source_accessor(FieldSource::Context, "requestId", false),
            "$context.requestId"
        );
    }

    #[test]
    fn test_loop_variable_passes_through() {
        assert_eq!(source_accessor(FieldSource::Body, "$item0", false), "$item0");
        assert_eq!(
            source_accessor(FieldSource::Query, "$item1.label", true),
            "$item1.label"
        );
    }
}
