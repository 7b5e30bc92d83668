//! The two-stage download pipeline.
//!
//! Candidate links flow through a resolver pool into a download pool over
//! bounded channels, with the rate-limit controller running alongside. Each
//! stage's receiver is shared by its workers; closing the senders is the
//! drain/shutdown signal, so a stage is complete once its channel is closed
//! and its workers have been joined.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::HttpSession;
use crate::config::Config;
use crate::dedup::{CompletedLedger, InFlightSet};
use crate::download::{DownloadOutcome, Downloader};
use crate::error::Result;
use crate::export::UrlExporter;
use crate::extract::{CandidateLink, LinkExtractor, ResolvedItem};
use crate::rate::run_controller;
use crate::resolver::{extension_allowed, Resolver};

/// Totals reported after a pipeline run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub candidates: u64,
    pub resolved: u64,
    pub downloaded: u64,
    pub exported: u64,
    pub filtered: u64,
    pub already_done: u64,
    pub duplicate_skips: u64,
    pub resolution_failed: u64,
    pub download_failed: u64,
}

/// The assembled pipeline for one album.
pub struct Pipeline {
    config: Arc<Config>,
    session: Arc<HttpSession>,
    extractor: Arc<dyn LinkExtractor>,
}

struct ResolverCtx {
    resolver: Resolver,
    ledger: Arc<CompletedLedger>,
    exporter: Option<Arc<UrlExporter>>,
    extensions: Vec<String>,
    stats: Arc<Mutex<RunStats>>,
}

struct DownloadCtx {
    downloader: Downloader,
    dest_dir: PathBuf,
    stats: Arc<Mutex<RunStats>>,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        session: Arc<HttpSession>,
        extractor: Arc<dyn LinkExtractor>,
    ) -> Self {
        Self {
            config,
            session,
            extractor,
        }
    }

    /// Run the full pipeline over `candidates`, downloading into `dest_dir`
    /// (or exporting URLs when export mode is on).
    pub async fn run(&self, candidates: Vec<CandidateLink>, dest_dir: &Path) -> Result<RunStats> {
        let ledger = Arc::new(CompletedLedger::open(dest_dir)?);
        let in_flight = Arc::new(InFlightSet::new());
        let exporter = if self.config.options.export_urls {
            Some(Arc::new(UrlExporter::open(dest_dir)?))
        } else {
            None
        };

        let stats = Arc::new(Mutex::new(RunStats {
            candidates: candidates.len() as u64,
            ..Default::default()
        }));

        let capacity = self.config.pools.queue_capacity;
        let (candidate_tx, candidate_rx) = mpsc::channel::<CandidateLink>(capacity);
        let candidate_rx = Arc::new(Mutex::new(candidate_rx));
        let (item_tx, item_rx) = mpsc::channel::<ResolvedItem>(capacity);
        let item_rx = Arc::new(Mutex::new(item_rx));

        // Resolver pool
        let resolver_ctx = Arc::new(ResolverCtx {
            resolver: Resolver::new(
                self.session.clone(),
                self.extractor.clone(),
                self.config.sources.cdn_hosts.clone(),
            ),
            ledger: ledger.clone(),
            exporter,
            extensions: self.config.options.extensions.clone(),
            stats: stats.clone(),
        });

        let mut resolver_handles = Vec::new();
        for worker_id in 0..self.config.pools.resolver_workers {
            resolver_handles.push(spawn_resolver_worker(
                worker_id,
                resolver_ctx.clone(),
                candidate_rx.clone(),
                item_tx.clone(),
            ));
        }

        // Download pool
        let download_ctx = Arc::new(DownloadCtx {
            downloader: Downloader::new(
                self.session.clone(),
                ledger.clone(),
                in_flight.clone(),
                self.config.options.retries,
                self.config.sources.maintenance_markers.clone(),
                self.config.options.show_downloads,
            ),
            dest_dir: dest_dir.to_path_buf(),
            stats: stats.clone(),
        });

        let mut download_handles = Vec::new();
        for worker_id in 0..self.config.pools.download_workers {
            download_handles.push(spawn_download_worker(
                worker_id,
                download_ctx.clone(),
                item_rx.clone(),
            ));
        }

        // Rate controller runs for the whole span of the pipeline.
        let stop = CancellationToken::new();
        let controller = tokio::spawn(run_controller(
            self.session.limiter().clone(),
            stop.clone(),
        ));

        // Feed the resolution stage, then close it.
        for candidate in candidates {
            if candidate_tx.send(candidate).await.is_err() {
                break;
            }
        }
        drop(candidate_tx);

        // Resolution stage drains first.
        for handle in resolver_handles {
            let _ = handle.await;
        }

        // All resolver-held senders are gone; dropping ours closes the
        // download stage once it drains.
        drop(item_tx);
        for handle in download_handles {
            let _ = handle.await;
        }

        stop.cancel();
        let _ = controller.await;

        let stats = stats.lock().await.clone();
        tracing::info!(
            "Pipeline finished: {} resolved, {} downloaded, {} exported, {} failed",
            stats.resolved,
            stats.downloaded,
            stats.exported,
            stats.resolution_failed + stats.download_failed
        );
        Ok(stats)
    }
}

fn spawn_resolver_worker(
    worker_id: usize,
    ctx: Arc<ResolverCtx>,
    candidate_rx: Arc<Mutex<mpsc::Receiver<CandidateLink>>>,
    item_tx: mpsc::Sender<ResolvedItem>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let candidate = { candidate_rx.lock().await.recv().await };
            let Some(candidate) = candidate else {
                break;
            };

            let Some(item) = ctx.resolver.resolve(&candidate).await else {
                ctx.stats.lock().await.resolution_failed += 1;
                continue;
            };

            if !extension_allowed(&ctx.extensions, &item.download_url) {
                tracing::debug!("Filtered by extension: {}", item.download_url);
                ctx.stats.lock().await.filtered += 1;
                continue;
            }

            if ctx.ledger.contains(&item.download_url).await {
                tracing::debug!("Already downloaded: {}", item.download_url);
                ctx.stats.lock().await.already_done += 1;
                continue;
            }

            ctx.stats.lock().await.resolved += 1;

            if let Some(exporter) = &ctx.exporter {
                match exporter.export(&item.download_url).await {
                    Ok(()) => ctx.stats.lock().await.exported += 1,
                    Err(e) => {
                        tracing::error!("Failed to export {}: {}", item.download_url, e);
                        ctx.stats.lock().await.resolution_failed += 1;
                    }
                }
            } else if item_tx.send(item).await.is_err() {
                // Download stage gone; nothing left to do with this item.
                break;
            }
        }
        tracing::debug!("resolver worker {} exiting", worker_id);
    })
}

fn spawn_download_worker(
    worker_id: usize,
    ctx: Arc<DownloadCtx>,
    item_rx: Arc<Mutex<mpsc::Receiver<ResolvedItem>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let item = { item_rx.lock().await.recv().await };
            let Some(item) = item else {
                break;
            };

            match ctx.downloader.download(&item, &ctx.dest_dir).await {
                Ok(DownloadOutcome::Completed) => {
                    ctx.stats.lock().await.downloaded += 1;
                }
                Ok(DownloadOutcome::SkippedDuplicate) => {
                    ctx.stats.lock().await.duplicate_skips += 1;
                }
                Ok(DownloadOutcome::Failed(_)) => {
                    // Reason already logged at the failure site.
                    ctx.stats.lock().await.download_failed += 1;
                }
                Err(e) => {
                    tracing::error!("Processing {} failed: {}", item.download_url, e);
                    ctx.stats.lock().await.download_failed += 1;
                }
            }
        }
        tracing::debug!("download worker {} exiting", worker_id);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::LEDGER_FILENAME;
    use crate::export::URL_LIST_FILENAME;
    use crate::extract::GenericExtractor;
    use crate::rate::RateLimiter;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_pipeline(config: Config) -> Pipeline {
        let config = Arc::new(config);
        let limiter = Arc::new(RateLimiter::new(
            &config.rate_limit,
            config.pools.download_workers,
        ));
        let session = Arc::new(HttpSession::new(&config.session, limiter).unwrap());
        Pipeline::new(config, session, Arc::new(GenericExtractor::new()))
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.rate_limit.initial_delay_seconds = 0.0;
        config.rate_limit.backoff_factor = 0.0;
        config.options.retries = 2;
        config.pools.resolver_workers = 2;
        config.pools.download_workers = 2;
        config
    }

    fn item_page(media_url: &str) -> String {
        format!(r#"<video><source src="{}"></video>"#, media_url)
    }

    #[tokio::test]
    async fn test_same_url_downloaded_once() {
        let server = MockServer::start().await;
        let media_url = format!("{}/media/shared.mp4", server.uri());

        for page in ["/f/a", "/f/b"] {
            Mock::given(method("GET"))
                .and(url_path(page))
                .respond_with(ResponseTemplate::new(200).set_body_string(item_page(&media_url)))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(url_path("/media/shared.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(fast_config());
        let candidates = vec![
            CandidateLink::new(format!("{}/f/a", server.uri())),
            CandidateLink::new(format!("{}/f/b", server.uri())),
        ];

        let stats = pipeline.run(candidates, dir.path()).await.unwrap();

        assert_eq!(stats.downloaded, 1);
        // The loser is skipped either at its in-flight claim or, if the
        // winner already finished, at a ledger check.
        assert_eq!(stats.duplicate_skips + stats.already_done, 1);
        let ledger = std::fs::read_to_string(dir.path().join(LEDGER_FILENAME)).unwrap();
        assert_eq!(ledger.lines().count(), 1);
        assert_eq!(ledger.lines().next(), Some(media_url.as_str()));
    }

    #[tokio::test]
    async fn test_seeded_ledger_url_never_reenqueued() {
        let server = MockServer::start().await;
        let media_url = format!("{}/media/old.jpg", server.uri());

        Mock::given(method("GET"))
            .and(url_path("/f/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(item_page(&media_url)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/media/old.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(LEDGER_FILENAME), format!("{}\n", media_url)).unwrap();

        let pipeline = make_pipeline(fast_config());
        let candidates = vec![CandidateLink::new(format!("{}/f/a", server.uri()))];
        let stats = pipeline.run(candidates, dir.path()).await.unwrap();

        assert_eq!(stats.downloaded, 0);
        assert_eq!(stats.already_done, 1);
    }

    #[tokio::test]
    async fn test_export_mode_writes_urls_and_downloads_nothing() {
        let server = MockServer::start().await;
        for (page, media) in [("/f/a", "/media/a.jpg"), ("/f/b", "/media/b.mp4")] {
            let media_url = format!("{}{}", server.uri(), media);
            Mock::given(method("GET"))
                .and(url_path(page))
                .respond_with(ResponseTemplate::new(200).set_body_string(item_page(&media_url)))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(url_path(media))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;
        }

        let dir = tempdir().unwrap();
        let mut config = fast_config();
        config.options.export_urls = true;
        let pipeline = make_pipeline(config);

        let candidates = vec![
            CandidateLink::new(format!("{}/f/a", server.uri())),
            CandidateLink::new(format!("{}/f/b", server.uri())),
        ];
        let stats = pipeline.run(candidates, dir.path()).await.unwrap();

        assert_eq!(stats.exported, 2);
        assert_eq!(stats.downloaded, 0);
        let list = std::fs::read_to_string(dir.path().join(URL_LIST_FILENAME)).unwrap();
        assert_eq!(list.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_extension_filter_drops_silently() {
        let server = MockServer::start().await;
        let media_url = format!("{}/media/pic.gif", server.uri());

        Mock::given(method("GET"))
            .and(url_path("/f/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(item_page(&media_url)))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let mut config = fast_config();
        config.options.extensions = vec!["jpg".to_string()];
        let pipeline = make_pipeline(config);

        let candidates = vec![CandidateLink::new(format!("{}/f/a", server.uri()))];
        let stats = pipeline.run(candidates, dir.path()).await.unwrap();

        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.downloaded, 0);
        assert_eq!(stats.resolution_failed, 0);
    }

    #[tokio::test]
    async fn test_per_item_failures_do_not_abort_run() {
        let server = MockServer::start().await;
        let good_url = format!("{}/media/good.jpg", server.uri());

        Mock::given(method("GET"))
            .and(url_path("/f/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/f/good"))
            .respond_with(ResponseTemplate::new(200).set_body_string(item_page(&good_url)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/media/good.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(fast_config());
        let candidates = vec![
            CandidateLink::new(format!("{}/f/broken", server.uri())),
            CandidateLink::new(format!("{}/f/good", server.uri())),
        ];
        let stats = pipeline.run(candidates, dir.path()).await.unwrap();

        assert_eq!(stats.resolution_failed, 1);
        assert_eq!(stats.downloaded, 1);
    }
}
