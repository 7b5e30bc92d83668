//! Download execution with retry, backoff, and integrity checking.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

use crate::client::HttpSession;
use crate::dedup::{CompletedLedger, InFlightSet};
use crate::error::{Error, Result};
use crate::extract::ResolvedItem;
use crate::fs::file_name_from_url;

/// Minimum file size to show progress bar (20 MB).
const PROGRESS_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Fixed sleep between attempts after a transport-level failure.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Final disposition of one resolved item.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// File written, integrity verified, ledger updated.
    Completed,
    /// Another worker already holds this URL.
    SkippedDuplicate,
    /// Permanent per-item failure; the run continues.
    Failed(String),
}

/// Outcome of a single fetch attempt.
enum Attempt {
    Success { declared: Option<u64>, written: u64 },
    RateLimited,
    ConnectFailed(String),
    Fatal(String),
}

pub struct Downloader {
    session: Arc<HttpSession>,
    ledger: Arc<CompletedLedger>,
    in_flight: Arc<InFlightSet>,
    retries: u32,
    maintenance_markers: Vec<String>,
    show_progress: bool,
}

impl Downloader {
    pub fn new(
        session: Arc<HttpSession>,
        ledger: Arc<CompletedLedger>,
        in_flight: Arc<InFlightSet>,
        retries: u32,
        maintenance_markers: Vec<String>,
        show_progress: bool,
    ) -> Self {
        Self {
            session,
            ledger,
            in_flight,
            retries,
            maintenance_markers,
            show_progress,
        }
    }

    /// Download one resolved item into `dest_dir`.
    ///
    /// Transport failures that survive every retry surface as an error; all
    /// other failure modes are per-item outcomes.
    pub async fn download(&self, item: &ResolvedItem, dest_dir: &Path) -> Result<DownloadOutcome> {
        let url = &item.download_url;

        // Resolution dedups only against the completed ledger, so the same
        // URL can arrive twice; first claim wins.
        if !self.in_flight.try_claim(url).await {
            tracing::debug!("Skipping {}: already being downloaded", url);
            return Ok(DownloadOutcome::SkippedDuplicate);
        }

        // The other copy of a doubly-enqueued URL may already have finished
        // and left the in-flight set, so the ledger is re-checked here.
        if self.ledger.contains(url).await {
            self.in_flight.release(url).await;
            tracing::debug!("Skipping {}: completed earlier in this run", url);
            return Ok(DownloadOutcome::SkippedDuplicate);
        }

        let result = self.run_attempts(item, dest_dir).await;
        self.in_flight.release(url).await;
        result
    }

    async fn run_attempts(&self, item: &ResolvedItem, dest_dir: &Path) -> Result<DownloadOutcome> {
        let file_name = match &item.display_name {
            Some(name) => name.clone(),
            None => match file_name_from_url(&item.download_url) {
                Ok(name) => name,
                Err(e) => return Ok(DownloadOutcome::Failed(e.to_string())),
            },
        };
        let final_path = dest_dir.join(&file_name);

        for attempt in 1..=self.retries {
            match self.try_fetch(&item.download_url, &final_path, &file_name).await {
                Attempt::Success { declared, written } => {
                    self.session.limiter().record_success().await;
                    return self.complete_download(item, declared, written, &file_name).await;
                }
                Attempt::RateLimited => {
                    tracing::warn!(
                        "Error downloading \"{}\": 429 Too Many Requests (attempt {}/{})",
                        file_name,
                        attempt,
                        self.retries
                    );
                    self.session.limiter().record_throttle().await;
                    sleep(self.session.limiter().backoff_for_attempt(attempt)).await;
                }
                Attempt::ConnectFailed(message) => {
                    tracing::debug!(
                        "Connection error on attempt {} for {}: {}",
                        attempt,
                        item.download_url,
                        message
                    );
                    if attempt < self.retries {
                        sleep(CONNECT_RETRY_DELAY).await;
                    } else {
                        return Err(Error::ConnectionExhausted {
                            attempts: self.retries,
                            message,
                        });
                    }
                }
                Attempt::Fatal(reason) => {
                    tracing::warn!("Error downloading \"{}\": {}", file_name, reason);
                    return Ok(DownloadOutcome::Failed(reason));
                }
            }
        }

        Ok(DownloadOutcome::Failed(format!(
            "rate limited on all {} attempts",
            self.retries
        )))
    }

    /// Post-download bookkeeping: integrity check, then ledger append. The
    /// ledger write happens only after the check passes, so a mismatched
    /// item stays eligible for re-download on a future run.
    async fn complete_download(
        &self,
        item: &ResolvedItem,
        declared: Option<u64>,
        written: u64,
        file_name: &str,
    ) -> Result<DownloadOutcome> {
        if item.verify_length {
            if let Some(declared) = declared {
                if declared != written {
                    tracing::warn!(
                        "{} size check failed ({} of {} bytes), file could be broken",
                        file_name,
                        written,
                        declared
                    );
                    return Ok(DownloadOutcome::Failed(format!(
                        "size mismatch: wrote {} of {} declared bytes",
                        written, declared
                    )));
                }
            }
        }

        self.ledger.mark_done(&item.download_url).await?;
        tracing::info!("Downloaded: {}", file_name);
        Ok(DownloadOutcome::Completed)
    }

    async fn try_fetch(&self, url: &str, path: &Path, file_name: &str) -> Attempt {
        let response = match self.session.get(url).await {
            Ok(response) => response,
            Err(e) => return Attempt::ConnectFailed(e.to_string()),
        };

        match response.status().as_u16() {
            200 => {}
            429 => return Attempt::RateLimited,
            other => return Attempt::Fatal(format!("HTTP {}", other)),
        }

        // Some hosts 302 broken files to a placeholder instead of erroring.
        let final_url = response.url().as_str();
        if self.maintenance_markers.iter().any(|m| m == final_url) {
            return Attempt::Fatal("server is down for maintenance".to_string());
        }

        let declared = response.content_length();
        let progress = if self.show_progress
            && declared.map(|len| len > PROGRESS_THRESHOLD).unwrap_or(false)
        {
            let pb = ProgressBar::new(declared.unwrap_or(0));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_message(file_name.to_string());
            Some(pb)
        } else {
            None
        };

        let mut file = match File::create(path).await {
            Ok(file) => file,
            Err(e) => return Attempt::Fatal(format!("cannot create {}: {}", path.display(), e)),
        };

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Attempt::ConnectFailed(format!("stream error: {}", e)),
            };
            if let Err(e) = file.write_all(&chunk).await {
                return Attempt::Fatal(format!("write error: {}", e));
            }
            written += chunk.len() as u64;
            if let Some(ref pb) = progress {
                pb.set_position(written);
            }
        }

        if let Err(e) = file.flush().await {
            return Attempt::Fatal(format!("write error: {}", e));
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Attempt::Success { declared, written }
    }
}
