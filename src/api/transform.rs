//! Field-name normalization between backend and client schemas.
//!
//! The backend mixes camelCase and snake_case across endpoints. Every
//! payload is passed through a [`FieldTransformer`] so that domain types
//! only ever see the snake_case form.

use serde_json::{Map, Value};

/// Backend field name -> client field name, applied in order.
///
/// No target may also appear as a source, which keeps the transform
/// idempotent.
pub const FIELD_MAPPINGS: &[(&str, &str)] = &[
  ("youtubeId", "youtube_id"),
  ("youtubeUrl", "youtube_url"),
  ("videoUrl", "video_url"),
  ("audioUrl", "audio_url"),
  ("thumbnailUrl", "thumbnail_url"),
  ("imageUrl", "image_url"),
  ("durationSeconds", "duration_seconds"),
  ("scriptureReference", "scripture_reference"),
  ("bibleVerse", "bible_verse"),
  ("categoryId", "category_id"),
  ("categoryName", "category_name"),
  ("isFeatured", "is_featured"),
  ("isActive", "is_active"),
  ("isPublished", "is_published"),
  ("publishDate", "publish_date"),
  ("publishedAt", "published_at"),
  ("startDate", "start_date"),
  ("endDate", "end_date"),
  ("createdAt", "created_at"),
  ("updatedAt", "updated_at"),
  ("viewCount", "view_count"),
  ("contentId", "content_id"),
  ("contentType", "content_type"),
  ("sessionId", "session_id"),
];

/// Recursive key renamer driven by an ordered mapping table.
#[derive(Debug, Clone, Copy)]
pub struct FieldTransformer {
  mappings: &'static [(&'static str, &'static str)],
}

impl Default for FieldTransformer {
  fn default() -> Self {
    Self::new(FIELD_MAPPINGS)
  }
}

impl FieldTransformer {
  pub const fn new(mappings: &'static [(&'static str, &'static str)]) -> Self {
    Self { mappings }
  }

  fn rename<'a>(&self, key: &'a str) -> &'a str {
    self
      .mappings
      .iter()
      .find(|(from, _)| *from == key)
      .map(|(_, to)| *to)
      .unwrap_or(key)
  }

  /// Rename mapped keys at every depth. Scalars pass through unchanged.
  pub fn transform(&self, value: Value) -> Value {
    match value {
      Value::Object(map) => {
        let mut out = Map::with_capacity(map.len());
        for (key, child) in map {
          let renamed = self.rename(&key).to_string();
          out.insert(renamed, self.transform(child));
        }
        Value::Object(out)
      }
      Value::Array(items) => Value::Array(items.into_iter().map(|v| self.transform(v)).collect()),
      scalar => scalar,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_no_target_is_a_source() {
    for (_, to) in FIELD_MAPPINGS {
      assert!(
        !FIELD_MAPPINGS.iter().any(|(from, _)| from == to),
        "{} is both a target and a source",
        to
      );
    }
  }

  #[test]
  fn test_renames_nested_objects_and_arrays() {
    let input = json!({
      "items": [
        {"youtubeId": "abc123", "title": "Grace", "speaker": {"imageUrl": "x.png"}},
        {"audioUrl": "a.mp3", "tags": ["isFeatured"]}
      ],
      "createdAt": "2024-01-01"
    });

    let out = FieldTransformer::default().transform(input);

    assert_eq!(
      out,
      json!({
        "items": [
          {"youtube_id": "abc123", "title": "Grace", "speaker": {"image_url": "x.png"}},
          {"audio_url": "a.mp3", "tags": ["isFeatured"]}
        ],
        "created_at": "2024-01-01"
      })
    );
  }

  #[test]
  fn test_scalars_pass_through() {
    let t = FieldTransformer::default();
    assert_eq!(t.transform(json!("youtubeId")), json!("youtubeId"));
    assert_eq!(t.transform(json!(42)), json!(42));
    assert_eq!(t.transform(Value::Null), Value::Null);
  }

  #[test]
  fn test_transform_is_idempotent() {
    let t = FieldTransformer::default();
    let input = json!([{"youtubeId": "abc", "nested": {"thumbnailUrl": "t", "keep": 1}}]);
    let once = t.transform(input);
    let twice = t.transform(once.clone());
    assert_eq!(once, twice);
  }

  #[test]
  fn test_custom_mapping() {
    const MAP: &[(&str, &str)] = &[("a", "b")];
    let out = FieldTransformer::new(MAP).transform(json!({"a": {"a": 1}, "c": 2}));
    assert_eq!(out, json!({"b": {"b": 1}, "c": 2}));
  }
}
