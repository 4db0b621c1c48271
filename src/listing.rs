//! Directory listing scraper.
//!
//! Fetches an auto-generated HTML index page and turns its table of links
//! into [`FileEntry`] values with absolute URLs.
//!
//! # Example
//!
//! ```no_run
//! use dirdl_core::listing::IndexClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IndexClient::new();
//! for entry in client.list("example.org/files/").await? {
//!     println!("{} {}", if entry.is_dir { "[DIR]" } else { "[FILE]" }, entry.url);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::default_client_builder;

/// One item of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Visible link text, trimmed.
    pub name: String,
    /// Absolute URL of the item.
    pub url: String,
    /// Whether the item is a subdirectory.
    pub is_dir: bool,
}

/// Errors from [`IndexClient::list`].
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing URL is empty or cannot be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Request failed at the transport level.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The listing URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with something other than 200 OK.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The listing URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The document could not be parsed as HTML.
    ///
    /// html5ever recovers from malformed markup, so [`IndexClient::list`]
    /// does not currently produce this variant.
    #[error("cannot parse listing at {url}: {reason}")]
    Parse {
        /// The listing URL.
        url: String,
        /// What went wrong.
        reason: String,
    },
}

impl ListingError {
    /// Whether the user might succeed by simply trying again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }
}

/// HTTP client for directory listings. Every call re-fetches the page.
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: Client,
}

impl Default for IndexClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexClient {
    /// Creates a listing client with the default transport settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(default_client_builder().build().unwrap_or_default())
    }

    /// Wraps an existing reqwest client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetches `index_url` and returns its entries in document order.
    ///
    /// A URL without a scheme is treated as `https://`.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError`] for an unusable URL, a transport failure
    /// (including a body read that fails midway) or a non-200 status.
    #[instrument(skip(self), fields(url = %index_url))]
    pub async fn list(&self, index_url: &str) -> Result<Vec<FileEntry>, ListingError> {
        let base = normalize_index_url(index_url)?;
        debug!(resolved = %base, "fetching listing");

        let response = self
            .client
            .get(base.clone())
            .send()
            .await
            .map_err(|e| ListingError::Network {
                url: base.to_string(),
                source: e,
            })?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            // Drain so the connection can be reused.
            let _ = response.bytes().await;
            return Err(ListingError::HttpStatus {
                url: base.to_string(),
                status,
            });
        }

        // Decodes using the charset from Content-Type, UTF-8 otherwise.
        let html = response.text().await.map_err(|e| ListingError::Network {
            url: base.to_string(),
            source: e,
        })?;

        let entries = parse_listing(&html, &base);
        info!(url = %base, entries = entries.len(), "listing loaded");
        Ok(entries)
    }
}

/// Parses `index_url`, defaulting to `https://` when no scheme is given.
///
/// # Errors
///
/// Returns [`ListingError::InvalidUrl`] if the string is empty or does not
/// form an absolute http(s) URL with a host.
pub fn normalize_index_url(index_url: &str) -> Result<Url, ListingError> {
    let trimmed = index_url.trim();
    let invalid = || ListingError::InvalidUrl {
        url: index_url.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let candidate = if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

/// True when `raw` starts with `scheme://`, looking only before the first
/// `/`, `?` or `#`.
fn has_scheme(raw: &str) -> bool {
    let head_end = raw.find(['/', '?', '#']).unwrap_or(raw.len());
    let Some(colon) = raw[..head_end].find(':') else {
        return false;
    };
    let scheme = &raw[..colon];
    raw[colon + 1..].starts_with("//")
        && scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Extracts listing entries from an HTML document.
///
/// Only anchors whose direct parent is a `<td>` count; this skips the
/// column-sorting links that index templates put in `<th>` headers.
/// Anchors without an `href` or without visible text are ignored.
#[must_use]
pub fn parse_listing(html: &str, base: &Url) -> Vec<FileEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    collect_entries(document.root_element(), base, &mut entries);
    entries
}

fn collect_entries(element: ElementRef<'_>, base: &Url, entries: &mut Vec<FileEntry>) {
    if element.value().name() == "a"
        && let Some(entry) = entry_from_anchor(element, base)
    {
        entries.push(entry);
    }

    for child in element.children().filter_map(ElementRef::wrap) {
        collect_entries(child, base, entries);
    }
}

fn entry_from_anchor(anchor: ElementRef<'_>, base: &Url) -> Option<FileEntry> {
    let in_data_cell = anchor
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| parent.value().name() == "td");
    if !in_data_cell {
        return None;
    }

    let href = anchor.value().attr("href").filter(|h| !h.is_empty())?;
    let label: String = anchor.text().collect();
    let name = label.trim();
    if name.is_empty() {
        return None;
    }

    let url = base.join(href).ok()?;
    let is_dir = href.ends_with('/') || name.ends_with('/');

    Some(FileEntry {
        name: name.to_string(),
        url: url.to_string(),
        is_dir,
    })
}
