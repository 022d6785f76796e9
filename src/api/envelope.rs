//! Response envelope handling and list-shape normalization.
//!
//! The backend answers either with an envelope
//! `{ "success": bool, "data": T, "pagination"?: {..} }` or with the bare
//! payload. List endpoints additionally vary in where the array lives.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiError, ApiResult};

/// Parse a raw response body. An empty body reads as `null`.
pub fn parse_body(body: &[u8]) -> ApiResult<Value> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Null);
  }

  serde_json::from_slice(body).map_err(|e| {
    let preview: String = String::from_utf8_lossy(body).chars().take(80).collect();
    ApiError::InvalidResponseFormat(format!("{} (body starts with {:?})", e, preview))
  })
}

/// Return the payload, unwrapping `{success, data}` when present.
///
/// An envelope with `success: false` is reported as a server error even
/// when the HTTP status was 2xx.
pub fn unwrap_envelope(body: Value, status: Option<u16>) -> ApiResult<Value> {
  let Value::Object(mut map) = body else {
    return Ok(body);
  };

  match map.get("success").and_then(Value::as_bool) {
    Some(false) => {
      let message = ["message", "error"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .unwrap_or("request was not successful")
        .to_string();
      Err(ApiError::Server { status, message })
    }
    Some(true) if map.contains_key("data") => Ok(map.remove("data").unwrap_or(Value::Null)),
    _ => Ok(Value::Object(map)),
  }
}

/// The list layouts the backend is known to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
  /// `[ ... ]`
  Bare(Vec<Value>),
  /// `{ "items": [ ... ] }`
  Items(Vec<Value>),
  /// `{ "<collection>": [ ... ] }`
  Named(Vec<Value>),
  /// `{ "data": { "<collection>": [ ... ] } }`
  NestedNamed(Vec<Value>),
}

impl ResponseShape {
  /// Work out which layout `value` uses for the named collection.
  pub fn classify(value: Value, collection: &str) -> ApiResult<Self> {
    match value {
      Value::Array(items) => Ok(Self::Bare(items)),
      Value::Object(mut map) => {
        if let Some(Value::Array(items)) = map.remove("items") {
          return Ok(Self::Items(items));
        }
        if let Some(Value::Array(items)) = map.remove(collection) {
          return Ok(Self::Named(items));
        }
        if let Some(Value::Object(mut data)) = map.remove("data") {
          if let Some(Value::Array(items)) = data.remove(collection) {
            return Ok(Self::NestedNamed(items));
          }
        }
        Err(ApiError::InvalidResponseFormat(format!(
          "expected a list of {}",
          collection
        )))
      }
      other => Err(ApiError::InvalidResponseFormat(format!(
        "expected a list of {}, got {}",
        collection,
        kind(&other)
      ))),
    }
  }

  pub fn into_items(self) -> Vec<Value> {
    match self {
      Self::Bare(items) | Self::Items(items) | Self::Named(items) | Self::NestedNamed(items) => {
        items
      }
    }
  }
}

/// Normalize any known list layout and deserialize its elements.
pub fn normalize_list<T: DeserializeOwned>(value: Value, collection: &str) -> ApiResult<Vec<T>> {
  ResponseShape::classify(value, collection)?
    .into_items()
    .into_iter()
    .map(|item| decode(item, collection))
    .collect()
}

/// Deserialize a single item, unwrapping `{ "<name>": { .. } }` if present.
pub fn normalize_one<T: DeserializeOwned>(value: Value, name: &str) -> ApiResult<T> {
  let value = match value {
    Value::Object(mut map) if matches!(map.get(name), Some(Value::Object(_))) => {
      map.remove(name).unwrap_or(Value::Null)
    }
    other => other,
  };
  decode(value, name)
}

/// Deserialize a single payload into a domain type.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> ApiResult<T> {
  serde_json::from_value(value)
    .map_err(|e| ApiError::InvalidResponseFormat(format!("failed to parse {}: {}", what, e)))
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
