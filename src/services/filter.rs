//! Category/stream filtering engine.
//!
//! Pure functions over in-memory lists; no I/O, no shared state. A category
//! survives when its name starts with one of the configured prefixes
//! (case-insensitive, whitespace-trimmed on both sides), and a stream
//! survives when its category did.

use std::collections::HashSet;

use crate::models::{Category, StreamEntry};

/// Apply prefix rules to one kind's categories and streams.
///
/// An empty prefix list keeps everything. Output order follows input order.
pub fn filter_catalog(
    categories: Vec<Category>,
    streams: Vec<StreamEntry>,
    prefixes: &[String],
) -> (Vec<Category>, Vec<StreamEntry>) {
    // Trim and uppercase once; blank prefixes in the config are ignored.
    let clean_prefixes: Vec<String> = prefixes
        .iter()
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect();

    if clean_prefixes.is_empty() {
        return (categories, streams);
    }

    let kept: Vec<Category> = categories
        .into_iter()
        .filter(|c| name_matches(&c.category_name, &clean_prefixes))
        .collect();

    let kept_ids: HashSet<String> = kept.iter().map(|c| c.category_id.key()).collect();

    let kept_streams: Vec<StreamEntry> = streams
        .into_iter()
        .filter(|s| s.category_id().map_or(false, |id| kept_ids.contains(&id)))
        .collect();

    (kept, kept_streams)
}

fn name_matches(name: &str, clean_prefixes: &[String]) -> bool {
    // "  EN | Movies" is treated as "EN | MOVIES".
    let clean_name = name.trim().to_uppercase();
    clean_prefixes.iter().any(|p| clean_name.starts_with(p))
}
