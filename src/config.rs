use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::Role;
use crate::cache::CacheSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  pub user: UserConfig,
  /// Custom title for header (defaults to the portal host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
  /// Per-request timeout for the portal API
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
  pub id: u64,
  #[serde(default)]
  pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Entries older than this are never served
  pub ttl_secs: i64,
  /// Entries older than this are served but refreshed in the background
  pub stale_after_secs: i64,
  /// How often views re-check whether their data went stale
  pub stale_check_secs: i64,
  /// Optional cap on the number of cached entries
  pub max_entries: Option<usize>,
  /// Keep the cache in SQLite between runs
  pub persist: bool,
  /// Database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: 600,
      stale_after_secs: 300,
      stale_check_secs: 30,
      max_entries: None,
      persist: true,
      path: None,
    }
  }
}

impl CacheConfig {
  /// Validated store settings.
  pub fn settings(&self) -> Result<CacheSettings> {
    if self.stale_check_secs <= 0 {
      return Err(eyre!("cache.stale_check_secs must be positive"));
    }
    let settings = CacheSettings::new(
      Duration::seconds(self.ttl_secs),
      Duration::seconds(self.stale_after_secs),
    )?
    .with_max_entries(self.max_entries);
    settings.validate()?;
    Ok(settings)
  }

  pub fn stale_check_interval(&self) -> Duration {
    Duration::seconds(self.stale_check_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./campus-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/campus-cache/config.yaml
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/campus-cache/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("campus-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("campus-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;

    config.cache.settings()?;
    url::Url::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", config.api.base_url, e))?;

    Ok(config)
  }

  /// Get the portal API token from environment variables.
  ///
  /// Checks CAMPUS_API_TOKEN. Anonymous access is allowed when unset.
  pub fn get_api_token() -> Option<String> {
    std::env::var("CAMPUS_API_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}
