//! Shared online/offline flag.
//!
//! A single `ConnectivityState` is created at startup and cloned into every
//! component that needs it. An external network observer calls
//! [`ConnectivityState::set_online`]; the transport reads the flag before
//! each request and subscribers are woken on every change.

use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot published to subscribers.
///
/// `reconnects` counts offline -> online transitions. A `watch` receiver
/// only sees the newest value, so a quick offline/online flap still shows
/// up as a moved counter even when `online` looks unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Link {
  pub online: bool,
  pub reconnects: u64,
}

#[derive(Clone, Debug)]
pub struct ConnectivityState {
  tx: Arc<watch::Sender<Link>>,
}

impl ConnectivityState {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(Link {
      online,
      reconnects: 0,
    });
    Self { tx: Arc::new(tx) }
  }

  pub fn is_online(&self) -> bool {
    self.tx.borrow().online
  }

  /// Update the flag. Returns true if this was an offline -> online transition.
  pub fn set_online(&self, online: bool) -> bool {
    let changed = self.tx.send_if_modified(|link| {
      if link.online == online {
        return false;
      }
      link.online = online;
      if online {
        link.reconnects += 1;
      }
      true
    });

    match (changed, online) {
      (true, true) => tracing::info!("connectivity restored"),
      (true, false) => tracing::info!("connectivity lost"),
      _ => {}
    }
    changed && online
  }

  /// Subscribe to changes. The receiver only wakes when the flag flips.
  pub fn subscribe(&self) -> watch::Receiver<Link> {
    self.tx.subscribe()
  }
}

impl Default for ConnectivityState {
  fn default() -> Self {
    Self::new(true)
  }
}
