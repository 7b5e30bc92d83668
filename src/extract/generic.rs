//! Regex-based default extractor.
//!
//! Good enough to drive the pipeline against gallery pages that follow the
//! common grid/lightbox markup; parsing fidelity is explicitly not a goal
//! here. Real site adapters implement [`LinkExtractor`] themselves.

use regex::Regex;

use crate::error::{Error, Result};
use crate::extract::{AlbumPage, CandidateLink, Extraction, LinkExtractor};

/// Marker in an item page URL that indicates a gallery redirect.
const GALLERY_PATH_MARKER: &str = "/d/";

pub struct GenericExtractor {
    item_link: Regex,
    album_title: Regex,
    video_source: Regex,
    lightbox_image: Regex,
    download_anchor: Regex,
}

impl GenericExtractor {
    pub fn new() -> Self {
        // Patterns are anchored on the attributes we need, not full tag
        // grammar; attribute order on these pages is stable.
        Self {
            item_link: Regex::new(
                r#"<a[^>]*class="[^"]*(?:grid-images_box-link|image)[^"]*"[^>]*href="([^"]+)""#,
            )
            .unwrap(),
            album_title: Regex::new(r"<h1[^>]*>([^<]+)</h1>").unwrap(),
            video_source: Regex::new(r#"<source[^>]*src="([^"]+)""#).unwrap(),
            lightbox_image: Regex::new(r#"<img[^>]*data-lightbox[^>]*src="([^"]+)""#).unwrap(),
            download_anchor: Regex::new(r#"<a[^>]*class="[^"]*rounded[^"]*"[^>]*href"#).unwrap(),
        }
    }

    fn gallery_path(page_url: &str) -> Option<String> {
        page_url
            .find(GALLERY_PATH_MARKER)
            .map(|idx| page_url[idx + GALLERY_PATH_MARKER.len()..].to_string())
    }
}

impl Default for GenericExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkExtractor for GenericExtractor {
    fn parse_album(&self, page_url: &str, body: &str) -> Result<AlbumPage> {
        let album_name = self
            .album_title
            .captures(body)
            .map(|c| c[1].trim().to_string())
            .filter(|name| !name.is_empty());

        let mut candidates: Vec<CandidateLink> = self
            .item_link
            .captures_iter(body)
            .map(|c| CandidateLink::new(c[1].to_string()))
            .collect();

        // Single-item pages carry the media directly; treat the page itself
        // as the one candidate.
        if candidates.is_empty() && self.extract_item(page_url, body).is_some() {
            candidates.push(CandidateLink::new(page_url));
        }

        if candidates.is_empty() {
            return Err(Error::AlbumPage(format!(
                "No item links found on {}",
                page_url
            )));
        }

        Ok(AlbumPage {
            album_name,
            candidates,
        })
    }

    fn extract_item(&self, page_url: &str, body: &str) -> Option<Extraction> {
        if let Some(captures) = self.video_source.captures(body) {
            return Some(Extraction::Direct {
                url: captures[1].to_string(),
                name: None,
            });
        }

        if let Some(captures) = self.lightbox_image.captures(body) {
            return Some(Extraction::Direct {
                url: captures[1].to_string(),
                name: None,
            });
        }

        if self.download_anchor.is_match(body) {
            if let Some(path) = Self::gallery_path(page_url) {
                return Some(Extraction::GalleryRedirect { path });
            }
        }

        None
    }

    fn trusts_content_length(&self) -> bool {
        true
    }
}
