//! User configuration
//!
//! Read from `<config dir>/uilink/config.json`. Every field is optional; a
//! missing file means defaults.
//!
//! ```json
//! {
//!   "dynamic_prefix": "_",
//!   "delivery": "immediate",
//!   "channel_rules": [
//!     { "attribute": "text", "channel": "textChanged", "argument": "string" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::link::{ChannelRules, Resolver};
use crate::object::Delivery;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extended attributes starting with this prefix declare bindings.
    pub dynamic_prefix: String,
    /// How change notifications reach links.
    pub delivery: Delivery,
    /// Replacement for the built-in change-channel heuristics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_rules: Option<ChannelRules>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dynamic_prefix: "_".to_string(),
            delivery: Delivery::Immediate,
            channel_rules: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("uilink").join("config.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, or the default location when `None`. Missing files give
    /// the defaults; unreadable or malformed ones are reported and ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(p) => p,
            None => return Self::default(),
        };
        if !path.exists() {
            log::debug!("No config at {}; using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.channel_rules.clone().unwrap_or_default())
    }
}
