//! Local filename derivation for downloads.

use std::path::{Component, Path};

use url::Url;

use super::constants::PLACEHOLDER_FILENAME;

/// Derives the local filename from the last path segment of `url`.
///
/// The segment is percent-decoded and sanitized; an empty segment (URL
/// ending in `/`, bare host) yields [`PLACEHOLDER_FILENAME`].
pub(crate) fn filename_from_url(url: &Url) -> String {
    let Some(last) = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    else {
        return PLACEHOLDER_FILENAME.to_string();
    };

    let decoded = urlencoding::decode(last)
        .map_or_else(|_| last.to_string(), std::borrow::Cow::into_owned);
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        PLACEHOLDER_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
