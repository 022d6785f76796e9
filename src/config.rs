use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub analytics: AnalyticsConfig,
  #[serde(default)]
  pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL all endpoints are joined onto (e.g. "https://church.example/api")
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Request timeout in milliseconds
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_ms: default_timeout_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Disable to always go to the network (offline reads then fail)
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Time-to-live of cached responses in milliseconds
  #[serde(default = "default_cache_ttl_ms")]
  pub ttl_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_ms: default_cache_ttl_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl Default for AnalyticsConfig {
  fn default() -> Self {
    Self { enabled: true }
  }
}

/// Values reported in diagnostic headers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  pub version: Option<String>,
  pub platform: Option<String>,
}

impl AppConfig {
  pub fn version(&self) -> String {
    self
      .version
      .clone()
      .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
  }

  pub fn platform(&self) -> String {
    self
      .platform
      .clone()
      .unwrap_or_else(|| std::env::consts::OS.to_string())
  }
}

fn default_base_url() -> String {
  "http://localhost:3000/api".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_cache_ttl_ms() -> u64 {
  24 * 60 * 60 * 1000
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./pulpit.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pulpit/config.yaml
  ///
  /// `PULPIT_API_URL` overrides the base URL from any source.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        tracing::debug!("no config file found, using defaults");
        Self::default()
      }
    };

    if let Ok(url) = std::env::var("PULPIT_API_URL") {
      config.api.base_url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pulpit.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pulpit").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
    if self.api.timeout_ms == 0 {
      return Err(eyre!("api.timeout_ms must be greater than zero"));
    }
    if self.cache.ttl_ms == 0 {
      return Err(eyre!("cache.ttl_ms must be greater than zero"));
    }
    Ok(())
  }

  /// Get the admin bearer token from environment variables, if any.
  ///
  /// Checks PULPIT_API_TOKEN first, then PULPIT_ADMIN_TOKEN as fallback.
  pub fn get_api_token() -> Option<String> {
    std::env::var("PULPIT_API_TOKEN")
      .or_else(|_| std::env::var("PULPIT_ADMIN_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }
}
