//! HTTP transport with cache fallback and offline write deferral.

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheResult, Clock, KeyValueStorage, ResponseCache};
use crate::config::Config;
use crate::connectivity::ConnectivityState;
use crate::sync::{FlushReport, SyncMethod, SyncQueue, SyncQueueItem};

use super::envelope::{decode, parse_body, unwrap_envelope};
use super::error::{ApiError, ApiResult};
use super::transform::FieldTransformer;

pub const HEADER_APP_VERSION: &str = "X-App-Version";
pub const HEADER_PLATFORM: &str = "X-Platform";
pub const HEADER_NETWORK_STATUS: &str = "X-Network-Status";

impl From<SyncMethod> for Method {
  fn from(method: SyncMethod) -> Self {
    match method {
      SyncMethod::Post => Method::POST,
      SyncMethod::Put => Method::PUT,
      SyncMethod::Delete => Method::DELETE,
    }
  }
}

/// Shared transport used by every content API.
///
/// Reads go to the network while online and fall back to the response
/// cache when the request fails or the device is offline. Writes made
/// while offline are queued for background sync and reported as
/// [`ApiError::QueuedOffline`].
pub struct HttpTransport<S: KeyValueStorage> {
  client: reqwest::Client,
  base_url: String,
  timeout_ms: u64,
  app_version: String,
  platform: String,
  token: Option<String>,
  connectivity: ConnectivityState,
  cache: Option<ResponseCache<S>>,
  queue: SyncQueue<S>,
  transformer: FieldTransformer,
}

impl<S: KeyValueStorage> HttpTransport<S> {
  /// Build a transport from configuration. Cache and queue share `storage`.
  pub fn new(config: &Config, storage: Arc<S>, connectivity: ConnectivityState) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(std::time::Duration::from_millis(config.api.timeout_ms))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let cache = if config.cache.enabled {
      let ttl = i64::try_from(config.cache.ttl_ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .ok_or_else(|| eyre!("cache.ttl_ms out of range: {}", config.cache.ttl_ms))?;
      Some(ResponseCache::new(Arc::clone(&storage), ttl)?)
    } else {
      None
    };

    Ok(Self {
      client,
      base_url: config.api.base_url.trim_end_matches('/').to_string(),
      timeout_ms: config.api.timeout_ms,
      app_version: config.app.version(),
      platform: config.app.platform(),
      token: Config::get_api_token(),
      connectivity,
      cache,
      queue: SyncQueue::new(storage),
      transformer: FieldTransformer::default(),
    })
  }

  /// Set or clear the bearer token sent with every request.
  pub fn with_token(mut self, token: Option<String>) -> Self {
    self.token = token;
    self
  }

  /// Replace the clock used by the cache and queue.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.cache = self.cache.map(|c| c.with_clock(Arc::clone(&clock)));
    self.queue = self.queue.with_clock(clock);
    self
  }

  pub fn connectivity(&self) -> &ConnectivityState {
    &self.connectivity
  }

  pub fn cache(&self) -> Option<&ResponseCache<S>> {
    self.cache.as_ref()
  }

  pub fn queue(&self) -> &SyncQueue<S> {
    &self.queue
  }

  /// GET and deserialize into `T`.
  pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, use_cache: bool) -> ApiResult<T> {
    decode(self.get_value(endpoint, use_cache).await?, endpoint)
  }

  /// GET the transformed payload.
  pub async fn get_value(&self, endpoint: &str, use_cache: bool) -> ApiResult<Value> {
    Ok(self.get_with_source(endpoint, use_cache).await?.data)
  }

  /// GET the transformed payload along with where it came from.
  ///
  /// Successful network responses are always cached. `use_cache` only
  /// controls whether a cached entry may stand in for a failed request.
  pub async fn get_with_source(
    &self,
    endpoint: &str,
    use_cache: bool,
  ) -> ApiResult<CacheResult<Value>> {
    if !self.connectivity.is_online() {
      if !use_cache {
        return Err(ApiError::Network(format!(
          "offline, cache bypassed for {}",
          endpoint
        )));
      }
      tracing::debug!(endpoint, "offline, reading from cache");
      return self
        .cached(endpoint)
        .map(|entry| CacheResult::offline(entry.payload, entry.stored_at))
        .ok_or_else(|| ApiError::NoCachedData {
          endpoint: endpoint.to_string(),
        });
    }

    match self.send(Method::GET, endpoint, None).await {
      Ok(payload) => {
        if let Some(cache) = &self.cache {
          if let Err(e) = cache.store(endpoint, &payload) {
            tracing::warn!(endpoint, "failed to cache response: {}", e);
          }
        }
        Ok(CacheResult::from_network(payload))
      }
      Err(err) => {
        if use_cache {
          if let Some(entry) = self.cached(endpoint) {
            tracing::warn!(endpoint, "request failed, serving cached response: {}", err);
            return Ok(CacheResult::fallback(entry.payload, entry.stored_at));
          }
        }
        Err(err)
      }
    }
  }

  /// POST `data`. Queued for background sync when offline.
  pub async fn post<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    data: &impl Serialize,
  ) -> ApiResult<T> {
    let payload = encode(data)?;
    decode(self.mutate(SyncMethod::Post, endpoint, payload).await?, endpoint)
  }

  /// PUT `data`. Queued for background sync when offline.
  pub async fn put<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    data: &impl Serialize,
  ) -> ApiResult<T> {
    let payload = encode(data)?;
    decode(self.mutate(SyncMethod::Put, endpoint, payload).await?, endpoint)
  }

  /// DELETE. Queued for background sync when offline.
  pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
    decode(
      self.mutate(SyncMethod::Delete, endpoint, Value::Null).await?,
      endpoint,
    )
  }

  /// Replay queued writes. Does nothing while offline.
  pub async fn flush_sync_queue(&self) -> ApiResult<FlushReport> {
    if !self.connectivity.is_online() {
      tracing::debug!("still offline, not flushing sync queue");
      return Ok(FlushReport::default());
    }

    let report = self.queue.flush(|item| self.replay(item)).await?;

    tracing::info!(
      replayed = report.replayed,
      expired = report.expired,
      failed = report.failed,
      "flushed sync queue"
    );
    Ok(report)
  }

  async fn replay(&self, item: SyncQueueItem) -> ApiResult<()> {
    let body = (item.method != SyncMethod::Delete).then_some(&item.payload);
    self
      .send(item.method.into(), &item.endpoint, body)
      .await
      .map(|_| ())
  }

  async fn mutate(&self, method: SyncMethod, endpoint: &str, payload: Value) -> ApiResult<Value> {
    if !self.connectivity.is_online() {
      self.queue.enqueue(method, endpoint, payload)?;
      return Err(ApiError::QueuedOffline {
        endpoint: endpoint.to_string(),
      });
    }

    let body = (method != SyncMethod::Delete).then_some(&payload);
    self.send(method.into(), endpoint, body).await
  }

  fn cached(&self, endpoint: &str) -> Option<CacheEntry> {
    self.cache.as_ref()?.fetch_entry(endpoint)
  }

  fn url(&self, endpoint: &str) -> ApiResult<url::Url> {
    let joined = if endpoint.starts_with('/') {
      format!("{}{}", self.base_url, endpoint)
    } else {
      format!("{}/{}", self.base_url, endpoint)
    };
    url::Url::parse(&joined)
      .map_err(|e| ApiError::Network(format!("invalid request URL {}: {}", joined, e)))
  }

  /// Perform one request and return the unwrapped, transformed payload.
  async fn send(&self, method: Method, endpoint: &str, body: Option<&Value>) -> ApiResult<Value> {
    let url = self.url(endpoint)?;
    let network_status = if self.connectivity.is_online() {
      "online"
    } else {
      "offline"
    };

    let mut request = self
      .client
      .request(method.clone(), url)
      .header(ACCEPT, "application/json")
      .header(HEADER_APP_VERSION, &self.app_version)
      .header(HEADER_PLATFORM, &self.platform)
      .header(HEADER_NETWORK_STATUS, network_status);

    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    if let Some(body) = body {
      let bytes = serde_json::to_vec(body).map_err(|e| ApiError::Encode(e.to_string()))?;
      request = request.header(CONTENT_TYPE, "application/json").body(bytes);
    }

    tracing::debug!(%method, endpoint, "sending request");

    let response = request
      .send()
      .await
      .map_err(|e| ApiError::from_reqwest(e, self.timeout_ms))?;
    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| ApiError::from_reqwest(e, self.timeout_ms))?;

    if !status.is_success() {
      let message = parse_body(&bytes)
        .ok()
        .and_then(|body| error_message(&body))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
      tracing::debug!(%method, endpoint, status = status.as_u16(), "request failed");
      return Err(ApiError::Server {
        status: Some(status.as_u16()),
        message,
      });
    }

    let payload = unwrap_envelope(parse_body(&bytes)?, Some(status.as_u16()))?;
    Ok(self.transformer.transform(payload))
  }
}

impl<S: KeyValueStorage> Clone for HttpTransport<S> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      base_url: self.base_url.clone(),
      timeout_ms: self.timeout_ms,
      app_version: self.app_version.clone(),
      platform: self.platform.clone(),
      token: self.token.clone(),
      connectivity: self.connectivity.clone(),
      cache: self.cache.clone(),
      queue: self.queue.clone(),
      transformer: self.transformer,
    }
  }
}

fn encode(data: &impl Serialize) -> ApiResult<Value> {
  serde_json::to_value(data).map_err(|e| ApiError::Encode(e.to_string()))
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &Value) -> Option<String> {
  ["message", "error"]
    .iter()
    .find_map(|k| body.get(*k).and_then(Value::as_str))
    .map(String::from)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{ManualClock, MemoryStorage};
  use mockito::{Matcher, Server};
  use serde_json::json;

  fn config(url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = url.to_string();
    config.api.timeout_ms = 2_000;
    config.app.version = Some("9.9.9".to_string());
    config.app.platform = Some("android".to_string());
    config
  }

  fn transport(url: &str, online: bool) -> HttpTransport<MemoryStorage> {
    HttpTransport::new(
      &config(url),
      Arc::new(MemoryStorage::new()),
      ConnectivityState::new(online),
    )
    .unwrap()
    .with_token(None)
  }

  #[tokio::test]
  async fn test_get_unwraps_envelope_and_transforms() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/video-sermons")
      .with_status(200)
      .with_body(r#"{"success":true,"data":[{"youtubeId":"abc123"}]}"#)
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    let value = t.get_value("/video-sermons", true).await.unwrap();

    assert_eq!(value, json!([{"youtube_id": "abc123"}]));
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_get_sends_diagnostic_headers() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/categories")
      .match_header(HEADER_APP_VERSION, "9.9.9")
      .match_header(HEADER_PLATFORM, "android")
      .match_header(HEADER_NETWORK_STATUS, "online")
      .match_header("authorization", "Bearer s3cret")
      .with_body("[]")
      .create_async()
      .await;

    let t = transport(&server.url(), true).with_token(Some("s3cret".into()));
    t.get_value("/categories", true).await.unwrap();

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_online_failure_falls_back_to_cache() {
    let mut server = Server::new_async().await;
    let ok = server
      .mock("GET", "/devotionals")
      .with_body(r#"[{"id":"d1"}]"#)
      .expect(1)
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    t.get_value("/devotionals", true).await.unwrap();
    ok.remove_async().await;

    server
      .mock("GET", "/devotionals")
      .with_status(500)
      .with_body(r#"{"message":"db down"}"#)
      .create_async()
      .await;

    let result = t.get_with_source("/devotionals", true).await.unwrap();
    assert_eq!(result.source, crate::cache::CacheSource::CacheFallback);
    assert_eq!(result.data, json!([{"id": "d1"}]));

    match t.get_value("/devotionals", false).await {
      Err(ApiError::Server { status, message }) => {
        assert_eq!(status, Some(500));
        assert_eq!(message, "db down");
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_offline_get_uses_cache_without_network() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/announcements")
      .with_body(r#"[{"id":"a1","isActive":true}]"#)
      .expect(1)
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    t.get_value("/announcements", true).await.unwrap();

    t.connectivity().set_online(false);
    let result = t.get_with_source("/announcements", true).await.unwrap();

    assert_eq!(result.source, crate::cache::CacheSource::Offline);
    assert_eq!(result.data, json!([{"id": "a1", "is_active": true}]));
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_offline_get_cold_cache() {
    let t = transport("http://127.0.0.1:9", false);
    assert!(matches!(
      t.get_value("/devotionals", true).await,
      Err(ApiError::NoCachedData { .. })
    ));
    assert!(matches!(
      t.get_value("/devotionals", false).await,
      Err(ApiError::Network(_))
    ));
  }

  #[tokio::test]
  async fn test_expired_cache_not_served_offline() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/categories")
      .with_body("[]")
      .create_async()
      .await;

    let clock = Arc::new(ManualClock::new());
    let t = transport(&server.url(), true).with_clock(clock.clone());
    t.get_value("/categories", true).await.unwrap();

    t.connectivity().set_online(false);
    clock.advance(Duration::hours(25));
    assert!(matches!(
      t.get_value("/categories", true).await,
      Err(ApiError::NoCachedData { .. })
    ));
  }

  #[tokio::test]
  async fn test_offline_post_is_queued() {
    let t = transport("http://127.0.0.1:9", false);
    let err = t
      .post::<Value>("/analytics/track", &json!({"event": "open"}))
      .await
      .unwrap_err();

    assert!(err.is_deferred());
    let items = t.queue().items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].endpoint, "/analytics/track");
    assert_eq!(items[0].payload, json!({"event": "open"}));
  }

  #[tokio::test]
  async fn test_online_post_failure_carries_status() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/announcements")
      .match_body(Matcher::Json(json!({"title": "Picnic"})))
      .with_status(422)
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    let err = t
      .post::<Value>("/announcements", &json!({"title": "Picnic"}))
      .await
      .unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert!(t.queue().is_empty().unwrap());
  }

  #[tokio::test]
  async fn test_post_result_not_cached() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/analytics/session")
      .with_body(r#"{"success":true,"data":{"sessionId":"s1"}}"#)
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    let value: Value = t.post("/analytics/session", &json!({})).await.unwrap();
    assert_eq!(value, json!({"session_id": "s1"}));

    t.connectivity().set_online(false);
    assert!(t.get_value("/analytics/session", true).await.is_err());
  }

  #[tokio::test]
  async fn test_invalid_body_reported() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/devotionals")
      .with_body("<html>gateway</html>")
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    assert!(matches!(
      t.get_value("/devotionals", false).await,
      Err(ApiError::InvalidResponseFormat(_))
    ));
  }

  #[tokio::test]
  async fn test_flush_replays_queued_writes() {
    let mut server = Server::new_async().await;
    let first = server
      .mock("POST", "/analytics/track")
      .match_body(Matcher::Json(json!({"event": "a"})))
      .with_body(r#"{"success":true}"#)
      .create_async()
      .await;
    let second = server
      .mock("PUT", "/announcements/7")
      .with_status(503)
      .create_async()
      .await;

    let t = transport(&server.url(), false);
    let _ = t.post::<Value>("/analytics/track", &json!({"event": "a"})).await;
    let _ = t.put::<Value>("/announcements/7", &json!({"title": "b"})).await;
    assert_eq!(t.queue().len().unwrap(), 2);

    // still offline: nothing happens
    assert_eq!(t.flush_sync_queue().await.unwrap(), FlushReport::default());

    t.connectivity().set_online(true);
    let report = t.flush_sync_queue().await.unwrap();

    assert_eq!(report.replayed, 1);
    assert_eq!(report.failed, 1);
    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(t.queue().items().unwrap()[0].method, SyncMethod::Put);
  }

  #[tokio::test]
  async fn test_offline_delete_replayed_without_body() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("DELETE", "/announcements/7")
      .match_header("content-type", Matcher::Missing)
      .match_body("")
      .with_status(204)
      .create_async()
      .await;

    let t = transport(&server.url(), false);
    let err = t.delete::<Value>("/announcements/7").await.unwrap_err();
    assert!(err.is_deferred());

    let items = t.queue().items().unwrap();
    assert_eq!(items[0].method, SyncMethod::Delete);
    assert_eq!(items[0].payload, Value::Null);

    t.connectivity().set_online(true);
    let report = t.flush_sync_queue().await.unwrap();

    assert_eq!(report.replayed, 1);
    assert!(t.queue().is_empty().unwrap());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_slow_server_reports_timeout() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((socket, _)) = listener.accept().await {
        held.push(socket);
      }
    });

    let mut config = config(&format!("http://{}", addr));
    config.api.timeout_ms = 50;
    let t = HttpTransport::new(
      &config,
      Arc::new(MemoryStorage::new()),
      ConnectivityState::new(true),
    )
    .unwrap()
    .with_token(None);

    let err = t.get_value("/devotionals", false).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(50)), "got {:?}", err);
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn test_typed_get() {
    #[derive(serde::Deserialize)]
    struct Verse {
      scripture_reference: String,
    }

    let mut server = Server::new_async().await;
    server
      .mock("GET", "/verse-of-the-day")
      .with_body(r#"{"success":true,"data":{"scriptureReference":"John 3:16"}}"#)
      .create_async()
      .await;

    let t = transport(&server.url(), true);
    let verse: Verse = t.get("/verse-of-the-day", true).await.unwrap();
    assert_eq!(verse.scripture_reference, "John 3:16");
  }
}
