//! Gallery Downloader - batch media downloads from gallery-style web pages.
//!
//! This library resolves item links discovered on gallery/album pages into
//! direct download URLs and fetches them under a shared, adaptively
//! throttled concurrency budget.
//!
//! # Features
//!
//! - Two-stage pipeline: a resolver worker pool feeding a download worker pool
//! - Adaptive rate limiting driven by HTTP 429 feedback
//! - Retry with backoff and post-download integrity checking
//! - Persistent dedup ledger (`already_downloaded.txt`)
//! - Export mode (`url_list.txt`) for external download tools
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use gallery_downloader::{
//!     client::HttpSession, config::Config, extract::{CandidateLink, GenericExtractor},
//!     pipeline::Pipeline, rate::RateLimiter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::default());
//!     let limiter = Arc::new(RateLimiter::new(&config.rate_limit, 4));
//!     let session = Arc::new(HttpSession::new(&config.session, limiter)?);
//!     let pipeline = Pipeline::new(config, session, Arc::new(GenericExtractor::new()));
//!
//!     let candidates = vec![CandidateLink::new("https://gallery.example.com/f/abc")];
//!     let stats = pipeline.run(candidates, Path::new("downloads")).await?;
//!     println!("downloaded {}", stats.downloaded);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod dedup;
pub mod download;
pub mod error;
pub mod export;
pub mod extract;
pub mod fs;
pub mod output;
pub mod pipeline;
pub mod rate;
pub mod resolver;

// Re-exports for convenience
pub use client::HttpSession;
pub use config::Config;
pub use dedup::{CompletedLedger, InFlightSet};
pub use download::{DownloadOutcome, Downloader};
pub use error::{Error, Result};
pub use extract::{CandidateLink, GenericExtractor, LinkExtractor, ResolvedItem};
pub use pipeline::{Pipeline, RunStats};
pub use rate::{RateLimiter, RateState};
