//! Export mode: write resolved URLs to a list instead of downloading.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

/// Name of the export file inside the download directory.
pub const URL_LIST_FILENAME: &str = "url_list.txt";

/// Serialized appender for `url_list.txt`, one URL per line.
pub struct UrlExporter {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl UrlExporter {
    /// Open (or create) the export file in `dir` for appending.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(URL_LIST_FILENAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(tokio::fs::File::from_std(file)),
        })
    }

    /// Append one resolved URL. Safe to call from multiple resolver workers.
    pub async fn export(&self, url: &str) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(format!("{}\n", url).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Where the list is being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
