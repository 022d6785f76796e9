//! Domain types for content endpoints.
//!
//! Incoming types see payloads after field transformation, so they use
//! snake_case names. Outgoing analytics types serialize as camelCase,
//! which is what the backend accepts on write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Ids arrive as strings from some endpoints and numbers from others.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Text(String),
    Number(i64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Text(s) => s,
    RawId::Number(n) => n.to_string(),
  })
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  struct Wrapper(#[serde(deserialize_with = "deserialize_id")] String);

  Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

fn default_true() -> bool {
  true
}

/// Daily devotional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Devotional {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub content: Option<String>,
  #[serde(default)]
  pub scripture_reference: Option<String>,
  #[serde(default)]
  pub bible_verse: Option<String>,
  #[serde(default)]
  pub author: Option<String>,
  /// Calendar date the devotional is for (YYYY-MM-DD)
  #[serde(default)]
  pub publish_date: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub is_featured: bool,
  #[serde(default)]
  pub created_at: Option<String>,
}

/// Video or audio sermon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sermon {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub speaker: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub youtube_id: Option<String>,
  #[serde(default)]
  pub video_url: Option<String>,
  #[serde(default)]
  pub audio_url: Option<String>,
  #[serde(default)]
  pub thumbnail_url: Option<String>,
  #[serde(default)]
  pub duration_seconds: Option<u64>,
  #[serde(default, deserialize_with = "deserialize_opt_id")]
  pub category_id: Option<String>,
  #[serde(default)]
  pub is_featured: bool,
  #[serde(default)]
  pub published_at: Option<String>,
}

/// Which sermon collection to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SermonKind {
  Video,
  Audio,
}

impl SermonKind {
  pub fn path(&self) -> &'static str {
    match self {
      SermonKind::Video => "/video-sermons",
      SermonKind::Audio => "/audio-sermons",
    }
  }
}

/// Church announcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub content: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub start_date: Option<String>,
  #[serde(default)]
  pub end_date: Option<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default)]
  pub created_at: Option<String>,
}

/// Content category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub content_type: Option<String>,
}

/// Analytics event sent to `/analytics/track`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
  pub event: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub properties: Option<serde_json::Value>,
  pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
  pub fn new(event: impl Into<String>) -> Self {
    Self {
      event: event.into(),
      content_id: None,
      content_type: None,
      properties: None,
      timestamp: Utc::now(),
    }
  }

  /// Attach the content item the event refers to.
  pub fn with_content(
    mut self,
    content_type: impl Into<String>,
    content_id: impl Into<String>,
  ) -> Self {
    self.content_type = Some(content_type.into());
    self.content_id = Some(content_id.into());
    self
  }

  pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
    self.properties = Some(properties);
    self
  }
}

/// App session announced to `/analytics/session`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSession {
  pub session_id: String,
  pub platform: String,
  pub app_version: String,
  pub started_at: DateTime<Utc>,
}
