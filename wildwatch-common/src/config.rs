//! Configuration file model and resolution
//!
//! Settings are resolved per field in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns tiers 3 and 4: locating the TOML file, parsing it, and
//! degrading to defaults when it is missing. Tiers 1 and 2 are handled by each
//! service's `clap` arguments.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "WILDWATCH_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Classifier Service location
    #[serde(default)]
    pub classifier: ClassifierSection,

    /// Messaging gateway credentials
    #[serde(default)]
    pub gateway: GatewaySection,

    /// Alert recipients, in dispatch order
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Carousel timing
    #[serde(default)]
    pub carousel: CarouselSection,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log filter directive (trace, debug, info, warn, error, or full EnvFilter syntax)
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ClassifierSection {
    /// Base URL of the Classifier Service (e.g. http://localhost:5000)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GatewaySection {
    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number (without channel prefix)
    #[serde(default)]
    pub from_number: Option<String>,

    /// "whatsapp" or "sms"
    #[serde(default)]
    pub channel: Option<String>,

    /// Per-recipient delivery timeout in milliseconds
    #[serde(default)]
    pub delivery_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CarouselSection {
    /// Autoplay interval in milliseconds
    #[serde(default)]
    pub autoplay_ms: Option<u64>,

    /// Navigation lockout while a slide transition runs, in milliseconds
    #[serde(default)]
    pub transition_ms: Option<u64>,
}

/// Locate the TOML config file for a module
///
/// `WILDWATCH_CONFIG` wins when set; otherwise
/// `<config_dir>/wildwatch/<module_name>.toml`.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("wildwatch").join(format!("{}.toml", module_name)))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load the module's TOML config, degrading to defaults
///
/// A missing file is normal (warning + defaults). A file that exists but
/// cannot be parsed is an error so that typos are not silently ignored.
pub fn load_or_default(module_name: &str) -> Result<TomlConfig> {
    let Some(path) = config_file_path(module_name) else {
        warn!("Could not determine config directory, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(&path)?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}
