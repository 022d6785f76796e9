//! Client facade bundling the transport with every content API.

use color_eyre::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::api::types::SermonKind;
use crate::api::{
  AnalyticsApi, AnnouncementsApi, ApiResult, CategoriesApi, DevotionalsApi, HttpTransport,
  SermonsApi,
};
use crate::cache::{KeyValueStorage, SqliteStorage};
use crate::config::Config;
use crate::connectivity::ConnectivityState;
use crate::sync::{spawn_reconnect_flush, FlushReport};

/// Content client with transparent caching and background sync.
///
/// Every API handle shares one transport, so they all see the same
/// connectivity state, cache and sync queue.
pub struct PulpitClient<S: KeyValueStorage> {
  transport: Arc<HttpTransport<S>>,
  analytics_enabled: bool,
}

impl PulpitClient<SqliteStorage> {
  /// Create a client backed by the on-disk store.
  pub fn open(config: &Config, connectivity: ConnectivityState) -> Result<Self> {
    let storage = SqliteStorage::open()?;
    Self::with_storage(config, Arc::new(storage), connectivity)
  }
}

impl<S: KeyValueStorage + 'static> PulpitClient<S> {
  pub fn with_storage(
    config: &Config,
    storage: Arc<S>,
    connectivity: ConnectivityState,
  ) -> Result<Self> {
    let transport = HttpTransport::new(config, storage, connectivity)?;
    Ok(Self::from_transport(
      Arc::new(transport),
      config.analytics.enabled,
    ))
  }

  pub fn from_transport(transport: Arc<HttpTransport<S>>, analytics_enabled: bool) -> Self {
    Self {
      transport,
      analytics_enabled,
    }
  }

  pub fn transport(&self) -> &Arc<HttpTransport<S>> {
    &self.transport
  }

  pub fn connectivity(&self) -> &ConnectivityState {
    self.transport.connectivity()
  }

  pub fn devotionals(&self) -> DevotionalsApi<S> {
    DevotionalsApi::new(Arc::clone(&self.transport))
  }

  pub fn video_sermons(&self) -> SermonsApi<S> {
    SermonsApi::new(Arc::clone(&self.transport), SermonKind::Video)
  }

  pub fn audio_sermons(&self) -> SermonsApi<S> {
    SermonsApi::new(Arc::clone(&self.transport), SermonKind::Audio)
  }

  pub fn announcements(&self) -> AnnouncementsApi<S> {
    AnnouncementsApi::new(Arc::clone(&self.transport))
  }

  pub fn categories(&self) -> CategoriesApi<S> {
    CategoriesApi::new(Arc::clone(&self.transport))
  }

  pub fn analytics(&self) -> AnalyticsApi<S> {
    AnalyticsApi::new(Arc::clone(&self.transport), self.analytics_enabled)
  }

  /// Replay queued writes now (if online).
  pub async fn sync_now(&self) -> ApiResult<FlushReport> {
    self.transport.flush_sync_queue().await
  }

  /// Start flushing the sync queue on every reconnect.
  pub fn start_background_sync(&self) -> JoinHandle<()> {
    spawn_reconnect_flush(Arc::clone(&self.transport))
  }
}

impl<S: KeyValueStorage> Clone for PulpitClient<S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      analytics_enabled: self.analytics_enabled,
    }
  }
}
