//! Text normalisation used when correlating outgoing sends with store rows.
//!
//! The chat database stores bodies with formatting artifacts (object
//! replacement characters for attachments, smart punctuation, trailing
//! whitespace). Matching therefore compares only the alphanumeric content,
//! lower-cased.

use std::path::Path;

/// Strip every non-alphanumeric character and lower-case the rest.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// [`normalize`] for an optional value; `None` normalises to the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// File name of `name` without its directory or final extension.
///
/// `"/tmp/photo.jpg"` → `"photo"`, `"archive.tar.gz"` → `"archive.tar"`,
/// `"photo"` → `"photo"`.
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
}

/// Normalised stem used to compare attachment transfer names.
pub fn attachment_key(name: &str) -> String {
    normalize(file_stem(name))
}
