//! Diffs a submitted artifact against the one the model last produced.

use similar::TextDiff;

const CONTEXT_RADIUS: usize = 3;

/// Ratio at or above which two artifacts count as the same document.
pub const SIMILARITY_THRESHOLD: f32 = 0.6;

/// Describes what changed between `previous` and `submitted`.
///
/// With no previous artifact the submitted text is returned as-is so the
/// first human turn carries a full snapshot. Identical inputs yield `""`.
pub fn reconcile(previous: &str, submitted: &str) -> String {
    if previous.is_empty() {
        return submitted.to_string();
    }
    pretty_diff(previous, submitted)
}

/// Unified line diff, empty when the texts are equal.
pub fn pretty_diff(old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    let diff = TextDiff::from_lines(old, new);
    let unified = diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header("previous", "submitted")
        .to_string();
    unified
}

/// Character-level similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    TextDiff::from_chars(a, b).ratio()
}

pub fn is_similar(a: &str, b: &str) -> bool {
    similarity(a, b) >= SIMILARITY_THRESHOLD
}
