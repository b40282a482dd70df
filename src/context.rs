//! Lineage-aware query building.
//!
//! Exploring "Seed" while inside "Avocado" must ask about an avocado seed,
//! not seeds in general. The query sent to analysis therefore carries the
//! names along the navigation path, minus ancestors that a more specific
//! descendant already names.

use crate::models::Item;

/// Build the analysis query for `query` explored under `path` (root first).
pub fn build_query(path: &[Item], query: &str) -> String {
    let names: Vec<&str> = path.iter().map(|item| item.name.as_str()).collect();
    build_query_from_names(&names, query)
}

/// Name-level form of [`build_query`].
///
/// Scanning from the end, an element that contains its predecessor
/// (case-insensitive) blanks the predecessor out. Whatever ancestors remain
/// are joined into the `from` context.
pub fn build_query_from_names<S: AsRef<str>>(ancestors: &[S], query: &str) -> String {
    let query = query.trim();
    if ancestors.is_empty() {
        return query.to_string();
    }

    let mut elements: Vec<String> = ancestors
        .iter()
        .map(|name| name.as_ref().trim().to_string())
        .collect();
    elements.push(query.to_string());

    for i in (1..elements.len()).rev() {
        let current = elements[i].to_lowercase();
        let previous = elements[i - 1].to_lowercase();
        if !previous.is_empty() && current.contains(&previous) {
            elements[i - 1].clear();
        }
    }

    elements.pop();
    let context = elements
        .iter()
        .filter(|name| !name.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    if context.is_empty() {
        query.to_string()
    } else {
        format!("{} from {}", query, context)
    }
}
