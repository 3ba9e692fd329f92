use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub discogs: DiscogsConfig,
  /// Username to load when none is given on the command line
  pub username: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsConfig {
  /// API base URL; only overridden in tests
  #[serde(default = "default_url")]
  pub url: String,
  /// Page size for collection listing requests
  #[serde(default = "default_per_page")]
  pub per_page: u64,
  /// Remaining-quota value at or below which requests are throttled
  #[serde(default = "default_rate_limit_threshold")]
  pub rate_limit_threshold: u64,
  /// How long to pause before releasing queued requests, in milliseconds
  #[serde(default = "default_throttle_delay_ms")]
  pub throttle_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Cache database path (default: $XDG_DATA_HOME/waxcrate/cache.db)
  pub path: Option<PathBuf>,
}

fn default_url() -> String {
  "https://api.discogs.com".to_string()
}

fn default_per_page() -> u64 {
  100
}

fn default_rate_limit_threshold() -> u64 {
  2
}

fn default_throttle_delay_ms() -> u64 {
  2000
}

impl Default for DiscogsConfig {
  fn default() -> Self {
    Self {
      url: default_url(),
      per_page: default_per_page(),
      rate_limit_threshold: default_rate_limit_threshold(),
      throttle_delay_ms: default_throttle_delay_ms(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./waxcrate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/waxcrate/config.yaml
  ///
  /// Every setting has a default, so a missing config file is fine.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("waxcrate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("waxcrate").join("config.yaml");
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

  /// Get the Discogs personal access token from environment variables.
  ///
  /// Checks WAXCRATE_DISCOGS_TOKEN first, then DISCOGS_TOKEN as fallback.
  /// The token is optional; public collections work without one.
  pub fn get_api_token() -> Result<String> {
    std::env::var("WAXCRATE_DISCOGS_TOKEN")
      .or_else(|_| std::env::var("DISCOGS_TOKEN"))
      .map_err(|_| eyre!("Discogs token not found. Set WAXCRATE_DISCOGS_TOKEN or DISCOGS_TOKEN."))
  }
}
