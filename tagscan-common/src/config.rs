//! Configuration loading and data folder resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument or its `TAGSCAN_*` environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default (fallback)

use crate::db::StoreBackend;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;
/// Upper bound on `scan_timeout_secs`; one hour
pub const MAX_SCAN_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_MAX_CONCURRENT_SCANS: usize = 16;

/// One configuration layer; every field is optional so layers can be merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub backend: Option<StoreBackend>,
    pub api_token: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_ids: Option<Vec<i64>>,
    pub telegram_api_url: Option<String>,
    pub base_url: Option<String>,
    pub scan_timeout_secs: Option<u64>,
    pub max_concurrent_scans: Option<usize>,
}

impl ConfigLayer {
    /// Fill every unset field of `self` from `lower`
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            port: self.port.or(lower.port),
            data_dir: self.data_dir.or(lower.data_dir),
            backend: self.backend.or(lower.backend),
            api_token: self.api_token.or(lower.api_token),
            telegram_token: self.telegram_token.or(lower.telegram_token),
            telegram_chat_ids: self.telegram_chat_ids.or(lower.telegram_chat_ids),
            telegram_api_url: self.telegram_api_url.or(lower.telegram_api_url),
            base_url: self.base_url.or(lower.base_url),
            scan_timeout_secs: self.scan_timeout_secs.or(lower.scan_timeout_secs),
            max_concurrent_scans: self.max_concurrent_scans.or(lower.max_concurrent_scans),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }
}

/// Telegram Bot API credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_ids: Vec<i64>,
    pub api_url: String,
}

/// Fully resolved server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub data_dir: PathBuf,
    pub backend: StoreBackend,
    /// `None` leaves the API unprotected
    pub api_token: Option<String>,
    /// `None` falls back to log-only notifications
    pub telegram: Option<TelegramConfig>,
    /// Public URL of the admin UI, used in unknown-tag notifications
    pub base_url: Option<String>,
    pub scan_timeout: Duration,
    pub max_concurrent_scans: usize,
}

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

impl Settings {
    /// Resolve settings from a command-line layer over a config-file layer
    pub fn from_layers(cli: ConfigLayer, file: ConfigLayer) -> Result<Self> {
        let layer = cli.or(file);

        let telegram = match (layer.telegram_token, layer.telegram_chat_ids) {
            (Some(token), Some(chat_ids)) if !token.is_empty() && !chat_ids.is_empty() => {
                Some(TelegramConfig {
                    token,
                    chat_ids,
                    api_url: layer
                        .telegram_api_url
                        .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
                })
            }
            (Some(token), _) if !token.is_empty() => {
                return Err(Error::Config(
                    "telegram token is set but no telegram chat ids are configured".to_string(),
                ));
            }
            _ => None,
        };

        let max_concurrent_scans = layer
            .max_concurrent_scans
            .unwrap_or(DEFAULT_MAX_CONCURRENT_SCANS);
        if max_concurrent_scans == 0 {
            return Err(Error::Config("max_concurrent_scans must be at least 1".to_string()));
        }

        let scan_timeout_secs = layer.scan_timeout_secs.unwrap_or(DEFAULT_SCAN_TIMEOUT_SECS);
        if !(1..=MAX_SCAN_TIMEOUT_SECS).contains(&scan_timeout_secs) {
            return Err(Error::Config(format!(
                "scan_timeout_secs must be between 1 and {}, got {}",
                MAX_SCAN_TIMEOUT_SECS, scan_timeout_secs
            )));
        }

        Ok(Self {
            port: layer.port.unwrap_or(DEFAULT_PORT),
            data_dir: layer.data_dir.unwrap_or_else(get_default_data_dir),
            backend: layer.backend.unwrap_or_default(),
            api_token: layer.api_token.filter(|t| !t.is_empty()),
            telegram,
            base_url: layer
                .base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            scan_timeout: Duration::from_secs(scan_timeout_secs),
            max_concurrent_scans,
        })
    }
}

/// Load the config-file layer
///
/// An explicitly requested file must exist. Without one, the platform default
/// location is tried and a missing file yields an empty layer.
pub fn load_config_file(explicit: Option<&Path>) -> Result<ConfigLayer> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {}", path.display())));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                info!("No config file found, using command line and defaults");
                return Ok(ConfigLayer::default());
            }
        },
    };

    info!("Loading config file: {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    let layer = ConfigLayer::from_toml_str(&content)?;
    if layer.api_token.is_some() {
        warn!("Config file {} contains the API token; keep it private", path.display());
    }
    Ok(layer)
}

/// Platform config file location (`~/.config/tagscan/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tagscan").join("config.toml"))
}

/// Get OS-dependent default data folder path
pub fn get_default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/tagscan (or /var/lib/tagscan for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("tagscan"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tagscan"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tagscan"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tagscan"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tagscan"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tagscan"))
    } else {
        PathBuf::from("./tagscan_data")
    }
}
