//! Drive search query construction
//!
//! Translates a [`ListQuery`] into the `q` parameter grammar of `files.list`.

use bridge_traits::storage::ListQuery;

/// Build the `q` expression for a listing filter
///
/// ```
/// use bridge_traits::storage::ListQuery;
/// use provider_google_drive::query::build_query;
///
/// let q = build_query(&ListQuery::images().in_folder("root"));
/// assert_eq!(q, "mimeType contains 'image/' and trashed = false and 'root' in parents");
/// ```
pub fn build_query(query: &ListQuery) -> String {
    let mut clauses = Vec::new();

    if let Some(prefix) = &query.mime_prefix {
        clauses.push(format!("mimeType contains '{}'", escape_literal(prefix)));
    }

    if !query.include_trashed {
        clauses.push("trashed = false".to_string());
    }

    if let Some(parent_id) = &query.parent_id {
        clauses.push(format!("'{}' in parents", escape_literal(parent_id)));
    }

    if let Some(term) = query.name_contains.as_deref().map(str::trim) {
        if !term.is_empty() {
            clauses.push(format!("name contains '{}'", escape_literal(term)));
        }
    }

    clauses.join(" and ")
}

/// Escape a string literal for the query grammar
fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
