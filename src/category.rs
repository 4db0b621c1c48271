//! Derives per-system folder labels from listing URLs.
//!
//! Directory listings of large archives are usually organized as
//! `<root>/<system>/<file>`. [`classify`] recovers the `<system>` part so bulk
//! downloads can be routed into one local folder per system.

use url::Url;

/// Label used whenever no usable folder name can be derived.
pub const UNKNOWN_LABEL: &str = "unknown";

const ILLEGAL_SEGMENT_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Returns the folder label for `file_url` relative to `root_url`.
///
/// Uses the first path segment below the root when `file_url` lives under it,
/// otherwise the file's parent directory name. Never fails; unparsable input
/// yields [`UNKNOWN_LABEL`].
///
/// ```
/// use dirdl_core::category::classify;
///
/// assert_eq!(classify("https://x/files/", "https://x/files/SNES/Game.zip"), "SNES");
/// ```
#[must_use]
pub fn classify(root_url: &str, file_url: &str) -> String {
    let (Ok(root), Ok(file)) = (Url::parse(root_url), Url::parse(file_url)) else {
        return UNKNOWN_LABEL.to_string();
    };

    let root_path = decode_path(&root);
    let file_path = decode_path(&file);
    let root_path = root_path.trim_end_matches('/');
    let file_path = file_path.trim_end_matches('/');

    if let Some(rest) = file_path.strip_prefix(root_path)
        && let Some(first) = rest.trim_matches('/').split('/').next()
        && !first.is_empty()
    {
        return sanitize_folder_name(first);
    }

    let segments: Vec<&str> = file_path.trim_matches('/').split('/').collect();
    if segments.len() >= 2 {
        return sanitize_folder_name(segments[segments.len() - 2]);
    }

    UNKNOWN_LABEL.to_string()
}

/// Makes `name` safe to use as a single path segment on common filesystems.
///
/// Control characters are dropped and reserved characters become `-`.
#[must_use]
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if ILLEGAL_SEGMENT_CHARS.contains(&c) { '-' } else { c })
        .collect();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        cleaned.to_string()
    }
}

fn decode_path(url: &Url) -> String {
    urlencoding::decode(url.path())
        .map_or_else(|_| url.path().to_string(), std::borrow::Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_first_segment_under_root() {
        assert_eq!(
            classify("https://x/files/", "https://x/files/SNES/Game.zip"),
            "SNES"
        );
    }

    #[test]
    fn test_classify_root_without_trailing_slash() {
        assert_eq!(
            classify("https://x/files", "https://x/files/N64/Mario/Game.zip"),
            "N64"
        );
    }

    #[test]
    fn test_classify_decodes_percent_escapes() {
        assert_eq!(
            classify(
                "https://x/files/",
                "https://x/files/Nintendo%20-%20SNES/Game.zip"
            ),
            "Nintendo - SNES"
        );
    }

    #[test]
    fn test_classify_unrelated_root_uses_parent_segment() {
        assert_eq!(
            classify("https://x/other/", "https://x/files/GBA/Game.zip"),
            "GBA"
        );
    }

    #[test]
    fn test_classify_unparsable_returns_unknown() {
        assert_eq!(classify("not a url", "https://x/files/SNES/Game.zip"), "unknown");
        assert_eq!(classify("https://x/files/", ""), "unknown");
    }

    #[test]
    fn test_classify_no_segments_returns_unknown() {
        assert_eq!(classify("https://x/other/", "https://x/Game.zip"), "unknown");
    }

    #[test]
    fn test_sanitize_folder_name_replaces_reserved_chars() {
        assert_eq!(sanitize_folder_name("Sega: Genesis/MD"), "Sega- Genesis-MD");
        assert_eq!(sanitize_folder_name("a<b>c|d?e*f\"g\\h"), "a-b-c-d-e-f-g-h");
    }

    #[test]
    fn test_sanitize_folder_name_strips_control_chars_and_whitespace() {
        assert_eq!(sanitize_folder_name("  SNES\u{7}\n "), "SNES");
        assert_eq!(sanitize_folder_name(" \t "), "unknown");
    }
}
