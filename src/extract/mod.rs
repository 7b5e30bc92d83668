//! Page extraction interface.
//!
//! Site-specific HTML parsing lives behind [`LinkExtractor`]; the pipeline
//! only sees candidate links, extractions, and an album name. A regex-based
//! [`GenericExtractor`](generic::GenericExtractor) is wired in by default.

pub mod generic;

use crate::error::Result;

pub use generic::GenericExtractor;

/// A page URL discovered on an album page. May or may not point directly at
/// downloadable media.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLink {
    pub page_url: String,
    pub known_size: Option<u64>,
}

impl CandidateLink {
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            known_size: None,
        }
    }
}

/// Parsed album page: a display name plus the item links found on it.
#[derive(Debug, Clone)]
pub struct AlbumPage {
    pub album_name: Option<String>,
    pub candidates: Vec<CandidateLink>,
}

/// What an item page yielded.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A direct, fetchable media URL.
    Direct {
        url: String,
        name: Option<String>,
    },
    /// The page only exposes a gallery redirect; the given path must be
    /// probed against the configured CDN hosts.
    GalleryRedirect { path: String },
}

/// A direct, fetchable URL derived from a candidate link.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    pub download_url: String,
    pub display_name: Option<String>,
    pub size: Option<u64>,
    /// Whether the source's declared content-length is trustworthy enough
    /// to verify the written byte count against.
    pub verify_length: bool,
}

/// Resolve a possibly-relative href found on an album page against the
/// album URL.
pub fn absolutize(base: &str, href: &str) -> Result<String> {
    let base = url::Url::parse(base)?;
    Ok(base.join(href)?.to_string())
}

/// Site-specific parsing, specified at its interface only.
pub trait LinkExtractor: Send + Sync {
    /// Parse an album page body into its item links and display name.
    fn parse_album(&self, page_url: &str, body: &str) -> Result<AlbumPage>;

    /// Extract a download target from an item page body. `None` means no
    /// known extraction pattern matched.
    fn extract_item(&self, page_url: &str, body: &str) -> Option<Extraction>;

    /// Whether this source reports content-length accurately.
    fn trusts_content_length(&self) -> bool {
        false
    }
}
