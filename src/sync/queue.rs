//! Durable queue of writes deferred while offline.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::{Clock, KeyValueStorage, SystemClock};

/// Storage key holding the serialized queue.
pub const SYNC_QUEUE_KEY: &str = "pulpit_sync_queue";

/// Maximum age of a queued write before it is dropped unreplayed.
pub fn max_item_age() -> Duration {
  Duration::hours(24)
}

/// HTTP method of a deferred write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMethod {
  #[default]
  Post,
  Put,
  Delete,
}

impl SyncMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      SyncMethod::Post => "POST",
      SyncMethod::Put => "PUT",
      SyncMethod::Delete => "DELETE",
    }
  }
}

/// A write waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
  #[serde(default)]
  pub method: SyncMethod,
  pub endpoint: String,
  pub payload: Value,
  pub enqueued_at: DateTime<Utc>,
}

/// Outcome of a flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
  /// Items replayed successfully and removed
  pub replayed: usize,
  /// Items dropped for being older than the maximum age
  pub expired: usize,
  /// Items that failed again and remain queued
  pub failed: usize,
}

/// FIFO queue persisted as one JSON array under [`SYNC_QUEUE_KEY`].
pub struct SyncQueue<S: KeyValueStorage> {
  storage: Arc<S>,
  clock: Arc<dyn Clock>,
  // Serializes flush passes across clones.
  flushing: Arc<Mutex<()>>,
}

impl<S: KeyValueStorage> SyncQueue<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      clock: Arc::new(SystemClock),
      flushing: Arc::new(Mutex::new(())),
    }
  }

  /// Replace the clock used for timestamps and age checks.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Load the queued items in enqueue order.
  ///
  /// An unreadable queue is logged and treated as empty; the next write
  /// replaces it.
  pub fn items(&self) -> Result<Vec<SyncQueueItem>> {
    let Some(raw) = self.storage.get(SYNC_QUEUE_KEY)? else {
      return Ok(Vec::new());
    };

    match serde_json::from_str(&raw) {
      Ok(items) => Ok(items),
      Err(e) => {
        tracing::warn!("discarding corrupted sync queue: {}", e);
        Ok(Vec::new())
      }
    }
  }

  pub fn len(&self) -> Result<usize> {
    Ok(self.items()?.len())
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Append a write and persist the full queue.
  pub fn enqueue(&self, method: SyncMethod, endpoint: &str, payload: Value) -> Result<()> {
    let mut items = self.items()?;
    items.push(SyncQueueItem {
      method,
      endpoint: endpoint.to_string(),
      payload,
      enqueued_at: self.clock.now(),
    });
    self.persist(&items)?;

    tracing::info!(
      method = method.as_str(),
      endpoint,
      queued = items.len(),
      "queued write for background sync"
    );
    Ok(())
  }

  /// Replay queued writes.
  ///
  /// Items older than [`max_item_age`] are dropped without a replay attempt.
  /// Every other item is handed to `replay` in FIFO order; failures stay
  /// queued and do not stop later items. The queue is persisted once the
  /// pass completes, whatever the outcome. Writes enqueued while the pass
  /// was running are kept after the failed items.
  ///
  /// Only one flush runs at a time; a second caller waits for the first.
  pub async fn flush<F, Fut, E>(&self, mut replay: F) -> Result<FlushReport>
  where
    F: FnMut(SyncQueueItem) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
  {
    let _guard = self.flushing.lock().await;
    let items = self.items()?;
    let snapshot_len = items.len();
    let now = self.clock.now();
    let mut report = FlushReport::default();
    let mut remaining = Vec::new();

    for item in items {
      if now - item.enqueued_at > max_item_age() {
        tracing::debug!(endpoint = %item.endpoint, "dropping expired queued write");
        report.expired += 1;
        continue;
      }

      match replay(item.clone()).await {
        Ok(()) => report.replayed += 1,
        Err(e) => {
          tracing::warn!(endpoint = %item.endpoint, "replay failed, keeping queued: {}", e);
          report.failed += 1;
          remaining.push(item);
        }
      }
    }

    // enqueue only appends, so anything past the snapshot arrived mid-pass
    let arrived: Vec<_> = self.items()?.into_iter().skip(snapshot_len).collect();
    if !arrived.is_empty() {
      tracing::debug!(count = arrived.len(), "keeping writes queued during flush");
    }
    remaining.extend(arrived);

    self.persist(&remaining)?;
    Ok(report)
  }

  fn persist(&self, items: &[SyncQueueItem]) -> Result<()> {
    let data =
      serde_json::to_string(items).map_err(|e| eyre!("Failed to serialize sync queue: {}", e))?;
    self.storage.set(SYNC_QUEUE_KEY, &data)
  }
}

impl<S: KeyValueStorage> Clone for SyncQueue<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
      flushing: Arc::clone(&self.flushing),
    }
  }
}
