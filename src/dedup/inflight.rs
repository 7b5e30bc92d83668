//! Tracking of URLs currently being downloaded.

use std::collections::HashSet;

use tokio::sync::Mutex;

/// Set of URLs with an active download worker.
///
/// A URL is a member for the exact span between worker pick-up and
/// completion or failure. Two resolvers may enqueue the same URL (resolution
/// only dedups against the completed ledger), so workers claim here before
/// starting and drop the item if another worker already holds it.
#[derive(Debug, Default)]
pub struct InFlightSet {
    inner: Mutex<HashSet<String>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check-and-insert. Returns false if the URL is already
    /// being downloaded by another worker.
    pub async fn try_claim(&self, url: &str) -> bool {
        self.inner.lock().await.insert(url.to_string())
    }

    /// Release a claim made with [`try_claim`](Self::try_claim).
    pub async fn release(&self, url: &str) {
        self.inner.lock().await.remove(url);
    }

    /// Number of downloads currently in flight.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
