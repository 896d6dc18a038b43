//! Slug allocation: filesystem- and URL-safe identifiers for slide decks.
//!
//! A slug doubles as the deck's directory name and its URL path segment,
//! so it must survive both without escaping. Allocation is a pure function
//! over a snapshot of the identifiers that already exist; it does not
//! reserve anything. Two imports that snapshot the same store concurrently
//! can be handed the same slug, so callers serialise imports per store.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Slug used when a base name normalises to nothing.
pub const FALLBACK_SLUG: &str = "untitled";

/// Runs of anything that is not `[a-z0-9]` collapse into one separator.
static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Normalise a display name into a slug token.
///
/// Lower-cases, replaces every run of whitespace or non-alphanumeric
/// characters with a single `-`, and trims separators from both ends.
/// Non-ASCII letters are treated as illegal characters.
pub fn normalize(base_name: &str) -> String {
    let lowered = base_name.to_lowercase();
    let replaced = RE_NON_SLUG.replace_all(&lowered, "-");
    let trimmed = replaced.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Pick a slug for `base_name` that is not in `existing`.
///
/// Returns the normalised token when free, otherwise the first free
/// `token-2`, `token-3`, ….
pub fn allocate<S>(base_name: &str, existing: &HashSet<S>) -> String
where
    S: std::borrow::Borrow<str> + Eq + std::hash::Hash,
{
    let base = normalize(base_name);
    if !existing.contains(base.as_str()) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !existing.contains(candidate.as_str()))
        .unwrap_or(base)
}

/// Whether `slug` is safe to join onto a store root.
///
/// Guards lookups by caller-supplied names (`get`, `update`, `remove`)
/// against path traversal. Allocated slugs always pass.
pub fn is_safe(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.starts_with('.')
        && !slug.contains(['/', '\\', '\0'])
}
