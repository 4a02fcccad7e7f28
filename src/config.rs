use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Scheme and authority of the storefront backend
  pub base_url: String,
  /// Path prefix shared by every API resource (e.g. "/api")
  pub root: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080".to_string(),
      root: "/api".to_string(),
      timeout_secs: 30,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// Response cache options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// Default time-to-live for cached reads
  pub ttl_secs: u64,
  /// Entry count above which the oldest entries are evicted
  pub max_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: 5 * 60,
      max_size: 50,
    }
  }
}

impl CacheConfig {
  /// The TTL as a duration, saturating for values chrono cannot represent.
  pub fn ttl(&self) -> chrono::Duration {
    i64::try_from(self.ttl_secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
      .unwrap_or_else(|| chrono::Duration::milliseconds(i64::MAX))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file for the durable store (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shopsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shopsync/config.yaml
  ///
  /// Falls back to defaults when no file exists. `SHOPSYNC_API_URL` overrides
  /// the configured base URL.
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
      None => Self::default(),
    };

    if let Ok(url) = std::env::var("SHOPSYNC_API_URL") {
      config.api.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shopsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shopsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get a bearer token from the environment.
  ///
  /// Used only when no session has been persisted by a previous login.
  pub fn env_token() -> Option<String> {
    std::env::var("SHOPSYNC_TOKEN").ok().filter(|t| !t.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "http://localhost:8080");
    assert_eq!(config.api.root, "/api");
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl(), chrono::Duration::minutes(5));
    assert_eq!(config.cache.max_size, 50);
    assert!(config.storage.path.is_none());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      r#"
api:
  base_url: https://shop.example.com
cache:
  max_size: 10
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "https://shop.example.com");
    assert_eq!(config.api.root, "/api");
    assert_eq!(config.api.timeout(), Duration::from_secs(30));
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.cache.max_size, 10);
  }

  #[test]
  fn test_cache_can_be_disabled() {
    let config = Config::parse("cache:\n  enabled: false\n").unwrap();
    assert!(!config.cache.enabled);
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_huge_ttl_saturates() {
    let config = Config::parse("cache:\n  ttl_secs: 18446744073709551615\n").unwrap();
    assert_eq!(config.cache.ttl_secs, u64::MAX);
    assert!(config.cache.ttl() > chrono::Duration::days(365 * 1000));

    let config = Config::parse("cache:\n  ttl_secs: 9223372036854775807\n").unwrap();
    assert!(config.cache.ttl() > chrono::Duration::zero());
  }
}
