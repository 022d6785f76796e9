//! Error kinds surfaced by the transport and content APIs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("network unavailable: {0}")]
  Network(String),

  #[error("request timed out after {0}ms")]
  Timeout(u64),

  #[error("server returned {}: {message}", format_status(.status))]
  Server {
    status: Option<u16>,
    message: String,
  },

  #[error("offline and no cached data for {endpoint}")]
  NoCachedData { endpoint: String },

  #[error("offline: request to {endpoint} queued for background sync")]
  QueuedOffline { endpoint: String },

  #[error("invalid response format: {0}")]
  InvalidResponseFormat(String),

  #[error("failed to encode request body: {0}")]
  Encode(String),

  #[error("local storage error: {0}")]
  Storage(String),
}

impl ApiError {
  /// The write was deferred, not lost. UI layers treat this as a soft success.
  pub fn is_deferred(&self) -> bool {
    matches!(self, ApiError::QueuedOffline { .. })
  }

  /// Whether retrying the same call later could succeed.
  pub fn is_retryable(&self) -> bool {
    !matches!(
      self,
      ApiError::QueuedOffline { .. } | ApiError::InvalidResponseFormat(_) | ApiError::Encode(_)
    )
  }

  /// HTTP status of the failed request, if the server answered.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Server { status, .. } => *status,
      _ => None,
    }
  }

  /// Map a reqwest failure onto our error kinds.
  pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
    if err.is_timeout() {
      ApiError::Timeout(timeout_ms)
    } else if let Some(status) = err.status() {
      ApiError::Server {
        status: Some(status.as_u16()),
        message: err.to_string(),
      }
    } else if err.is_decode() {
      ApiError::InvalidResponseFormat(err.to_string())
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

impl From<color_eyre::Report> for ApiError {
  fn from(err: color_eyre::Report) -> Self {
    ApiError::Storage(err.to_string())
  }
}

fn format_status(status: &Option<u16>) -> String {
  match status {
    Some(code) => code.to_string(),
    None => "an error".to_string(),
  }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_queued_offline_is_soft() {
    let err = ApiError::QueuedOffline {
      endpoint: "/analytics/track".to_string(),
    };
    assert!(err.is_deferred());
    assert!(!err.is_retryable());
  }

  #[test]
  fn test_server_error_carries_status() {
    let err = ApiError::Server {
      status: Some(503),
      message: "maintenance".to_string(),
    };
    assert_eq!(err.status(), Some(503));
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "server returned 503: maintenance");
  }

  #[test]
  fn test_failures_are_retryable() {
    assert!(ApiError::Timeout(10_000).is_retryable());
    assert!(ApiError::Network("refused".into()).is_retryable());
    assert!(ApiError::NoCachedData {
      endpoint: "/devotionals".into()
    }
    .is_retryable());
    assert!(!ApiError::InvalidResponseFormat("html".into()).is_retryable());
  }
}
