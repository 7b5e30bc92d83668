//! Candidate link resolution.
//!
//! Converts a page link discovered on an album into a direct download URL,
//! probing the configured CDN hosts when the page only exposes a gallery
//! redirect. Failures here abandon the item and are never fatal to the run.

use std::sync::Arc;

use crate::client::HttpSession;
use crate::extract::{CandidateLink, Extraction, LinkExtractor, ResolvedItem};
use crate::fs::extension_from_url;

pub struct Resolver {
    session: Arc<HttpSession>,
    extractor: Arc<dyn LinkExtractor>,
    cdn_hosts: Vec<String>,
}

impl Resolver {
    pub fn new(
        session: Arc<HttpSession>,
        extractor: Arc<dyn LinkExtractor>,
        cdn_hosts: Vec<String>,
    ) -> Self {
        Self {
            session,
            extractor,
            cdn_hosts,
        }
    }

    /// Resolve a candidate into a downloadable item. `None` means the item
    /// was abandoned (logged with the reason); the caller just moves on.
    pub async fn resolve(&self, candidate: &CandidateLink) -> Option<ResolvedItem> {
        let page_url = &candidate.page_url;

        let response = match self.session.get(page_url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Request failed getting real url for {}: {}", page_url, e);
                return None;
            }
        };

        let status = response.status();
        if status != 200 {
            tracing::warn!("HTTP error {} getting real url for {}", status, page_url);
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read page body for {}: {}", page_url, e);
                return None;
            }
        };

        let download_url = match self.extractor.extract_item(page_url, &body) {
            Some(Extraction::Direct { url, name }) => {
                return Some(self.make_item(url, name, candidate));
            }
            Some(Extraction::GalleryRedirect { path }) => {
                self.probe_cdn_hosts(&path, page_url).await?
            }
            None => {
                tracing::warn!("No extraction pattern matched for {}", page_url);
                return None;
            }
        };

        Some(self.make_item(download_url, None, candidate))
    }

    fn make_item(
        &self,
        download_url: String,
        display_name: Option<String>,
        candidate: &CandidateLink,
    ) -> ResolvedItem {
        ResolvedItem {
            download_url,
            display_name,
            size: candidate.known_size,
            verify_length: self.extractor.trusts_content_length(),
        }
    }

    /// Probe CDN hosts in order for `path`. First 200 wins; 404 tries the
    /// next host; 403 means the site is actively blocking, so the whole
    /// resolution is abandoned; any other status aborts as well. Linear
    /// first-match, not a fastest-response race.
    async fn probe_cdn_hosts(&self, path: &str, origin: &str) -> Option<String> {
        if self.cdn_hosts.is_empty() {
            tracing::warn!("CDN list is empty, unable to resolve {}", origin);
            return None;
        }

        for host in &self.cdn_hosts {
            let probe_url = format!("{}/{}", cdn_base(host), path);
            let response = match self.session.get(&probe_url).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("CDN probe failed for {}: {}", probe_url, e);
                    return None;
                }
            };

            match response.status().as_u16() {
                200 => return Some(probe_url),
                404 => continue,
                403 => {
                    tracing::warn!("Request to {} blocked (403), skipping", origin);
                    return None;
                }
                other => {
                    tracing::warn!("HTTP error {} probing {}, skipping", other, origin);
                    return None;
                }
            }
        }

        tracing::warn!("All CDN hosts exhausted for {}", origin);
        None
    }
}

fn cdn_base(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Extension allow-list filter. An empty list accepts everything.
pub fn extension_allowed(allow_list: &[String], url: &str) -> bool {
    if allow_list.is_empty() {
        return true;
    }
    match extension_from_url(url) {
        Some(ext) => allow_list.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RateLimitConfig, SessionConfig};
    use crate::extract::GenericExtractor;
    use crate::rate::RateLimiter;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_session() -> Arc<HttpSession> {
        let limiter = Arc::new(RateLimiter::new(
            &RateLimitConfig {
                initial_delay_seconds: 0.0,
                max_penalty_weight: 10,
                backoff_factor: 1.0,
            },
            4,
        ));
        Arc::new(
            HttpSession::new(
                &SessionConfig {
                    user_agent: "test".to_string(),
                    referer: None,
                    request_timeout_seconds: 5,
                },
                limiter,
            )
            .unwrap(),
        )
    }

    fn make_resolver(cdn_hosts: Vec<String>) -> Resolver {
        Resolver::new(make_session(), Arc::new(GenericExtractor::new()), cdn_hosts)
    }

    #[tokio::test]
    async fn test_resolve_direct_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/f/item1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<video><source src="https://cdn.example.com/clip.mp4"></video>"#,
            ))
            .mount(&server)
            .await;

        let resolver = make_resolver(vec![]);
        let candidate = CandidateLink::new(format!("{}/f/item1", server.uri()));
        let item = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(item.download_url, "https://cdn.example.com/clip.mp4");
        assert!(item.verify_length);
    }

    #[tokio::test]
    async fn test_resolve_non_200_abandons() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resolver = make_resolver(vec![]);
        let candidate = CandidateLink::new(format!("{}/f/item1", server.uri()));
        assert!(resolver.resolve(&candidate).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_no_pattern_abandons() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>nothing here</p>"))
            .mount(&server)
            .await;

        let resolver = make_resolver(vec![]);
        let candidate = CandidateLink::new(format!("{}/f/item1", server.uri()));
        assert!(resolver.resolve(&candidate).await.is_none());
    }

    #[tokio::test]
    async fn test_cdn_probe_first_match_wins() {
        let page = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/d/file-xyz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r##"<a class="rounded-[5px]" href="#">Download</a>"##),
            )
            .mount(&page)
            .await;

        let cdn_miss = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&cdn_miss)
            .await;

        let cdn_hit = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/file-xyz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&cdn_hit)
            .await;

        let resolver = make_resolver(vec![cdn_miss.uri(), cdn_hit.uri()]);
        let candidate = CandidateLink::new(format!("{}/d/file-xyz", page.uri()));
        let item = resolver.resolve(&candidate).await.unwrap();
        assert_eq!(item.download_url, format!("{}/file-xyz", cdn_hit.uri()));
    }

    #[tokio::test]
    async fn test_cdn_probe_403_short_circuits() {
        let page = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r##"<a class="rounded-[5px]" href="#">Download</a>"##),
            )
            .mount(&page)
            .await;

        let blocked = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&blocked)
            .await;

        // Never reached: the 403 abandons the item before the next host.
        let untouched = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&untouched)
            .await;

        let resolver = make_resolver(vec![blocked.uri(), untouched.uri()]);
        let candidate = CandidateLink::new(format!("{}/d/file-xyz", page.uri()));
        assert!(resolver.resolve(&candidate).await.is_none());
    }

    #[tokio::test]
    async fn test_cdn_probe_empty_list_abandons() {
        let page = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r##"<a class="rounded-[5px]" href="#">Download</a>"##),
            )
            .mount(&page)
            .await;

        let resolver = make_resolver(vec![]);
        let candidate = CandidateLink::new(format!("{}/d/file-xyz", page.uri()));
        assert!(resolver.resolve(&candidate).await.is_none());
    }

    #[test]
    fn test_extension_allowed() {
        let allow = vec!["jpg".to_string(), "mp4".to_string()];
        assert!(extension_allowed(&allow, "https://cdn.example.com/a.JPG"));
        assert!(extension_allowed(&allow, "https://cdn.example.com/b.mp4"));
        assert!(!extension_allowed(&allow, "https://cdn.example.com/c.gif"));
        assert!(!extension_allowed(&allow, "https://cdn.example.com/noext"));
        assert!(extension_allowed(&[], "https://cdn.example.com/c.gif"));
    }
}
