use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zel_common::platform::parse_flag;

use crate::error::CoreError;

pub const ENV_CONFIG_FILE: &str = "ZEL_LOADER_CONFIG";
pub const ENV_PARAMETER_VALIDATION: &str = "ZE_ENABLE_PARAMETER_VALIDATION";
pub const ENV_BASIC_LEAK_CHECKER: &str = "ZEL_ENABLE_BASIC_LEAK_CHECKER";
pub const ENV_TRACING_LAYER: &str = "ZE_ENABLE_TRACING_LAYER";
pub const ENV_RESOURCE_TRACKER: &str = "ZEL_ENABLE_SYSTEM_RESOURCE_TRACKER_CHECKER";
pub const ENV_TRACKER_CSV: &str = "ZEL_SYSTEM_RESOURCE_TRACKER_CSV";
pub const ENV_NULL_DRIVER: &str = "ZE_ENABLE_NULL_DRIVER";
pub const ENV_ALT_DRIVERS: &str = "ZE_ENABLE_ALT_DRIVERS";

/// Loader configuration, read once at initialization.
///
/// Precedence: defaults, then the TOML file, then environment variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub layers: LayerToggles,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub drivers: DriverConfig,
}

/// Which built-in layers are active. All off unless asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerToggles {
    #[serde(default)]
    pub parameter_validation: bool,
    #[serde(default)]
    pub basic_leak_checker: bool,
    #[serde(default)]
    pub api_tracing: bool,
    #[serde(default)]
    pub system_resource_tracker: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Telemetry output; the process id is spliced in before the extension.
    pub csv_path: Option<PathBuf>,
    /// RSS growth (KB) across a single create that triggers a leak warning
    #[serde(default = "default_leak_threshold_kb")]
    pub leak_threshold_kb: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Route calls to the in-process null driver
    #[serde(default)]
    pub enable_null_driver: bool,
    /// Replaces the platform's default driver library list when non-empty
    #[serde(default)]
    pub alt_drivers: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            leak_threshold_kb: default_leak_threshold_kb(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::ConfigError(format!("{}: {}", path.display(), e)))?;
        // an empty path means "no telemetry", same as the environment variable
        config.tracker.csv_path = config
            .tracker
            .csv_path
            .filter(|p| !p.to_string_lossy().trim().is_empty());
        Ok(config)
    }

    /// Load configuration from file if it parses, otherwise return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("using default loader configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Full resolution against the process environment: defaults, the file
    /// named by `ZEL_LOADER_CONFIG` if any, then the individual variables.
    pub fn from_env() -> Self {
        let mut config = match std::env::var_os(ENV_CONFIG_FILE) {
            Some(path) => Self::load_or_default(PathBuf::from(path)),
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Overlay environment overrides. Only variables that are present change
    /// anything, so a file setting survives an unset variable.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_PARAMETER_VALIDATION) {
            self.layers.parameter_validation = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_BASIC_LEAK_CHECKER) {
            self.layers.basic_leak_checker = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_TRACING_LAYER) {
            self.layers.api_tracing = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_RESOURCE_TRACKER) {
            self.layers.system_resource_tracker = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_TRACKER_CSV) {
            let v = v.trim();
            if !v.is_empty() {
                self.tracker.csv_path = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = lookup(ENV_NULL_DRIVER) {
            self.drivers.enable_null_driver = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_ALT_DRIVERS) {
            self.drivers.alt_drivers = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
}

fn default_leak_threshold_kb() -> i64 {
    1024
}
