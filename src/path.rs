//! Remote path helpers.
//!
//! Remote paths always use `/`, whatever the separator of the machine running
//! the gateway.

use unicode_normalization::UnicodeNormalization;

/// Joins segments with `/` and collapses runs of slashes into one.
pub fn join_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = segments
        .into_iter()
        .map(|segment| segment.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join("/");

    let mut path = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && path.ends_with('/') {
            continue;
        }
        path.push(c);
    }
    path
}

/// Last component of a remote path. Trailing slashes are ignored, the root
/// has no base name.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Hardens a client-supplied file name so it can be used as a single remote
/// path segment.
///
/// Accented letters decay to their base letter (NFKD), other non-ASCII is
/// dropped. Separators become whitespace, whitespace runs become `_`, and
/// everything outside `[A-Za-z0-9_.-]` is dropped along with leading or
/// trailing `.`/`_`.
/// Returns `None` if nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let cleaned: String = spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_owned())
    }
}
