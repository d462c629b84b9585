//! String helpers for filesystem names and log messages
//!
//! Partition names come straight from site link text, and browser errors arrive
//! as multi-line dumps. Both need trimming before they reach disk or an audit line.

use regex::Regex;
use std::sync::LazyLock;

/// Characters that Windows and most spreadsheet tools reject in file names.
static FORBIDDEN_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\\/*?:"<>|]"#).expect("FORBIDDEN_FILENAME_CHARS: hardcoded regex is valid")
});

/// Turn a partition display name into a directory/file stem.
///
/// Forbidden characters are dropped and spaces become underscores, so
/// `"London: City"` becomes `"London_City"`.
///
/// # Examples
/// ```
/// # use rankscrape::utils::string_utils::sanitize_partition_name;
/// assert_eq!(sanitize_partition_name("London: City"), "London_City");
/// assert_eq!(sanitize_partition_name("North West"), "North_West");
/// ```
#[must_use]
pub fn sanitize_partition_name(name: &str) -> String {
    FORBIDDEN_FILENAME_CHARS
        .replace_all(name.trim(), "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// First line of a message, trimmed.
#[inline]
#[must_use]
pub fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim()
}

/// Last `max_chars` characters of a string, used to show user-agent tails in logs.
#[must_use]
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    match s.char_indices().nth(count - max_chars) {
        Some((byte_idx, _)) => &s[byte_idx..],
        None => s,
    }
}
