//! Download stage: streaming file downloads with retry and backoff.

pub mod worker;

pub use worker::{DownloadOutcome, Downloader};
