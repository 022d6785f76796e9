//! Flush the sync queue whenever connectivity comes back.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::api::HttpTransport;
use crate::cache::KeyValueStorage;

/// Spawn a task that replays queued writes on every offline -> online
/// transition. The task holds the transport, so it runs until aborted.
///
/// Transitions are detected through the reconnect counter, so an
/// offline/online flap that lands before the task is polled still flushes.
pub fn spawn_reconnect_flush<S>(transport: Arc<HttpTransport<S>>) -> JoinHandle<()>
where
  S: KeyValueStorage + 'static,
{
  let mut rx = transport.connectivity().subscribe();
  let mut seen = rx.borrow_and_update().reconnects;

  tokio::spawn(async move {
    while rx.changed().await.is_ok() {
      let link = *rx.borrow_and_update();
      if link.reconnects == seen {
        continue;
      }
      seen = link.reconnects;

      match transport.flush_sync_queue().await {
        Ok(report) if report.failed > 0 => {
          tracing::warn!(failed = report.failed, "some queued writes are still pending")
        }
        Ok(_) => {}
        Err(e) => tracing::error!("sync queue flush failed: {}", e),
      }
    }
  })
}
