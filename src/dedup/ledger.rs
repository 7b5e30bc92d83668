//! Persisted record of completed downloads.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

/// Name of the ledger file inside the download directory.
pub const LEDGER_FILENAME: &str = "already_downloaded.txt";

/// Append-only set of URLs whose download fully succeeded.
///
/// The file is read once at pipeline start to seed the skip filter and
/// appended to once per successful download. Entries are never removed
/// within a run. Repeated entries across runs are tolerated since the file
/// is only ever read into a set.
pub struct CompletedLedger {
    path: PathBuf,
    inner: Mutex<HashSet<String>>,
}

impl CompletedLedger {
    /// Open the ledger in `dir`, creating an empty file if none exists.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(LEDGER_FILENAME);

        let completed = if path.is_file() {
            fs::read_to_string(&path)?
                .lines()
                .filter(|line| !line.is_empty())
                .map(|line| line.to_string())
                .collect()
        } else {
            fs::File::create(&path)?;
            HashSet::new()
        };

        tracing::debug!(
            "Seeded ledger with {} completed URL(s) from {}",
            completed.len(),
            path.display()
        );

        Ok(Self {
            path,
            inner: Mutex::new(completed),
        })
    }

    /// Whether `url` completed in this run or a previous one.
    pub async fn contains(&self, url: &str) -> bool {
        self.inner.lock().await.contains(url)
    }

    /// Record a completed download. Safe to call from multiple workers; the
    /// mutex serializes appends to the backing file.
    pub async fn mark_done(&self, url: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.insert(url.to_string()) {
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", url).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Number of completed URLs currently known.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
