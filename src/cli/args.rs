//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Gallery media downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "gallery-downloader",
    version,
    about = "Batch-download media from gallery-style web pages",
    long_about = "Resolves item links found on gallery pages into direct download URLs and\n\
                  fetches them concurrently, adapting request rate to server throttling."
)]
pub struct Args {
    /// Album URL to fetch.
    #[arg(short, long)]
    pub url: Option<String>,

    /// File containing album URLs, one per line.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Number of attempts per item when the connection fails or the server
    /// rate-limits.
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Extensions to download, comma separated (e.g. jpg,mp4). Empty accepts all.
    #[arg(short, long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Custom downloads folder.
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Export the resolved URL list (e.g. for wget) instead of downloading.
    #[arg(short = 'w', long)]
    pub export: bool,

    /// Number of download worker threads.
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Hide download progress information.
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(retries) = self.retries {
            config.options.retries = retries;
        }

        if let Some(extensions) = &self.extensions {
            config.options.extensions = extensions
                .iter()
                .map(|ext| ext.trim().to_string())
                .filter(|ext| !ext.is_empty())
                .collect();
        }

        if let Some(path) = &self.path {
            config.options.download_directory = Some(path.clone());
        }

        if self.export {
            config.options.export_urls = true;
        }

        if let Some(threads) = self.threads {
            config.pools.download_workers = threads;
        }

        if self.quiet {
            config.options.show_downloads = false;
        }
    }
}
