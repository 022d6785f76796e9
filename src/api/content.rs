//! Typed per-resource wrappers over the shared transport.

use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;

use crate::cache::KeyValueStorage;

use super::envelope::{normalize_list, normalize_one};
use super::error::ApiResult;
use super::transport::HttpTransport;
use super::types::{
  AnalyticsEvent, AnalyticsSession, Announcement, Category, Devotional, Sermon, SermonKind,
};

fn query_value(value: &str) -> String {
  url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Percent-encode one path segment so ids cannot reshape the endpoint.
fn path_segment(value: &str) -> String {
  // form encoding writes spaces as '+', which a path would keep literally
  query_value(value).replace('+', "%20")
}

pub struct DevotionalsApi<S: KeyValueStorage> {
  transport: Arc<HttpTransport<S>>,
}

impl<S: KeyValueStorage> DevotionalsApi<S> {
  pub fn new(transport: Arc<HttpTransport<S>>) -> Self {
    Self { transport }
  }

  pub async fn get_all(&self) -> ApiResult<Vec<Devotional>> {
    let value = self.transport.get_value("/devotionals", true).await?;
    normalize_list(value, "devotionals")
  }

  pub async fn get_by_id(&self, id: &str) -> ApiResult<Devotional> {
    let value = self
      .transport
      .get_value(&format!("/devotionals/{}", path_segment(id)), true)
      .await?;
    normalize_one(value, "devotional")
  }

  /// Devotional scheduled for a calendar date.
  pub async fn get_by_date(&self, date: NaiveDate) -> ApiResult<Devotional> {
    let value = self
      .transport
      .get_value(&format!("/devotionals/date/{}", date.format("%Y-%m-%d")), true)
      .await?;
    normalize_one(value, "devotional")
  }

  pub async fn get_featured(&self) -> ApiResult<Vec<Devotional>> {
    let value = self.transport.get_value("/devotionals/featured", true).await?;
    normalize_list(value, "devotionals")
  }
}

pub struct SermonsApi<S: KeyValueStorage> {
  transport: Arc<HttpTransport<S>>,
  kind: SermonKind,
}

impl<S: KeyValueStorage> SermonsApi<S> {
  pub fn new(transport: Arc<HttpTransport<S>>, kind: SermonKind) -> Self {
    Self { transport, kind }
  }

  pub async fn get_all(&self) -> ApiResult<Vec<Sermon>> {
    let value = self.transport.get_value(self.kind.path(), true).await?;
    normalize_list(value, "sermons")
  }

  pub async fn get_by_id(&self, id: &str) -> ApiResult<Sermon> {
    let value = self
      .transport
      .get_value(&format!("{}/{}", self.kind.path(), path_segment(id)), true)
      .await?;
    normalize_one(value, "sermon")
  }

  pub async fn get_featured(&self) -> ApiResult<Vec<Sermon>> {
    let value = self
      .transport
      .get_value(&format!("{}/featured", self.kind.path()), true)
      .await?;
    normalize_list(value, "sermons")
  }

  pub async fn get_by_category(&self, category_id: &str) -> ApiResult<Vec<Sermon>> {
    let value = self
      .transport
      .get_value(
        &format!("{}?category={}", self.kind.path(), query_value(category_id)),
        true,
      )
      .await?;
    normalize_list(value, "sermons")
  }
}

pub struct AnnouncementsApi<S: KeyValueStorage> {
  transport: Arc<HttpTransport<S>>,
}

impl<S: KeyValueStorage> AnnouncementsApi<S> {
  pub fn new(transport: Arc<HttpTransport<S>>) -> Self {
    Self { transport }
  }

  pub async fn get_all(&self) -> ApiResult<Vec<Announcement>> {
    let value = self.transport.get_value("/announcements", true).await?;
    normalize_list(value, "announcements")
  }

  pub async fn get_by_id(&self, id: &str) -> ApiResult<Announcement> {
    let value = self
      .transport
      .get_value(&format!("/announcements/{}", path_segment(id)), true)
      .await?;
    normalize_one(value, "announcement")
  }

  /// Announcements currently inside their display window.
  pub async fn get_active(&self) -> ApiResult<Vec<Announcement>> {
    let value = self.transport.get_value("/announcements/active", true).await?;
    normalize_list(value, "announcements")
  }
}

pub struct CategoriesApi<S: KeyValueStorage> {
  transport: Arc<HttpTransport<S>>,
}

impl<S: KeyValueStorage> CategoriesApi<S> {
  pub fn new(transport: Arc<HttpTransport<S>>) -> Self {
    Self { transport }
  }

  pub async fn get_all(&self) -> ApiResult<Vec<Category>> {
    let value = self.transport.get_value("/categories", true).await?;
    normalize_list(value, "categories")
  }

  pub async fn get_by_id(&self, id: &str) -> ApiResult<Category> {
    let value = self
      .transport
      .get_value(&format!("/categories/{}", path_segment(id)), true)
      .await?;
    normalize_one(value, "category")
  }
}

/// Fire-and-forget analytics. Nothing here ever returns an error.
pub struct AnalyticsApi<S: KeyValueStorage> {
  transport: Arc<HttpTransport<S>>,
  enabled: bool,
}

impl<S: KeyValueStorage> AnalyticsApi<S> {
  pub fn new(transport: Arc<HttpTransport<S>>, enabled: bool) -> Self {
    Self { transport, enabled }
  }

  /// Record an event. Failures are logged and swallowed.
  pub async fn track(&self, event: &AnalyticsEvent) {
    if !self.enabled {
      return;
    }
    self.send("/analytics/track", event, &event.event).await;
  }

  /// Announce a new app session. Failures are logged and swallowed.
  pub async fn start_session(&self, session: &AnalyticsSession) {
    if !self.enabled {
      return;
    }
    self
      .send("/analytics/session", session, &session.session_id)
      .await;
  }

  async fn send(&self, endpoint: &str, body: &impl serde::Serialize, label: &str) {
    match self.transport.post::<Value>(endpoint, body).await {
      Ok(_) => tracing::trace!(endpoint, label, "analytics sent"),
      Err(e) if e.is_deferred() => tracing::debug!(endpoint, label, "analytics queued offline"),
      Err(e) => tracing::debug!(endpoint, label, "analytics dropped: {}", e),
    }
  }
}

impl<S: KeyValueStorage> Clone for DevotionalsApi<S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
    }
  }
}

impl<S: KeyValueStorage> Clone for SermonsApi<S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      kind: self.kind,
    }
  }
}

impl<S: KeyValueStorage> Clone for AnnouncementsApi<S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
    }
  }
}

impl<S: KeyValueStorage> Clone for CategoriesApi<S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
    }
  }
}

impl<S: KeyValueStorage> Clone for AnalyticsApi<S> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      enabled: self.enabled,
    }
  }
}
