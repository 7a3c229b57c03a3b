//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Which client backend to construct: "mock" or "bridge".
    #[serde(default)]
    pub backend: BackendKind,

    /// Mock backend settings.
    #[serde(default)]
    pub mock: MockConfig,

    /// Bridge backend settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.python.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "bridge.python must not be empty".to_string(),
            });
        }
        if self.bridge.kicad_cli.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "bridge.kicad_cli must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Selects which `KiCadClient` implementation the process uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory simulation backend. No subprocesses, no file I/O.
    #[default]
    Mock,
    /// Real backend driving the Python helper and kicad-cli.
    Bridge,
}

/// Mock backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    /// Artificial latency applied before every mock operation, in
    /// milliseconds. Tests usually set this to 0.
    #[serde(default = "default_simulate_delay_ms")]
    pub simulate_delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            simulate_delay_ms: default_simulate_delay_ms(),
        }
    }
}

const fn default_simulate_delay_ms() -> u64 {
    50
}

/// Bridge backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Python interpreter used to run the bridge helper.
    #[serde(default = "default_python")]
    pub python: String,

    /// Path to the bridge helper script.
    #[serde(default = "default_bridge_script")]
    pub script: String,

    /// Name or path of the KiCad command-line tool.
    #[serde(default = "default_kicad_cli")]
    pub kicad_cli: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            script: default_bridge_script(),
            kicad_cli: default_kicad_cli(),
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_bridge_script() -> String {
    "bridge/kicad_bridge.py".to_string()
}

fn default_kicad_cli() -> String {
    "kicad-cli".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
