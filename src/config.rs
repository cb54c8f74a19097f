//! Construction-time configuration for a sync core.
//!
//! The backend address travels inside [`SyncConfig`] and is handed to the
//! remote client when it is built; nothing in the crate reads process-wide
//! settings.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const DEFAULT_STORE_PATH: &str = "field_sync";
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

/// How a successful refresh treats entries already present in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// The remote response replaces the snapshot wholesale. Last refresh wins.
    #[default]
    ReplaceAll,
    /// Cached entries without an `id` are kept after the remote response.
    PreserveUnconfirmed,
}

/// Configuration accepted by [`crate::SyncCore`] and the FFI entry point.
///
/// ```rust
/// use field_sync_core::config::{RefreshStrategy, SyncConfig};
///
/// let config: SyncConfig = serde_json::from_str(
///     r#"{"base_url":"http://10.0.2.2:8000","store_path":"ranger"}"#,
/// )?;
/// assert_eq!(config.refresh_strategy, RefreshStrategy::ReplaceAll);
/// assert!(config.request_timeout_ms.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub base_url: String,

    #[serde(default = "default_store_path")]
    pub store_path: String,

    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Absent means the transport default (no client-side timeout).
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub refresh_strategy: RefreshStrategy,
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            store_path: default_store_path(),
            map_size: default_map_size(),
            request_timeout_ms: None,
            refresh_strategy: RefreshStrategy::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)
            .map_err(|e| SyncError::InvalidConfig(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_path.trim().is_empty() {
            return Err(SyncError::InvalidConfig("store_path must not be empty".to_string()));
        }
        if self.map_size == 0 {
            return Err(SyncError::InvalidConfig("map_size must be positive".to_string()));
        }
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SyncError::InvalidConfig(format!("invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidConfig(format!(
                "unsupported base_url scheme: {}",
                url.scheme()
            )));
        }
        Ok(())
    }
}
