//! Background sync of writes made while offline.

mod queue;
mod reconnect;

pub use queue::{max_item_age, FlushReport, SyncMethod, SyncQueue, SyncQueueItem, SYNC_QUEUE_KEY};
pub use reconnect::spawn_reconnect_flush;
