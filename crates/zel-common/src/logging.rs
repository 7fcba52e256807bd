use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::platform::env_flag;

/// File name used inside `ZEL_LOADER_LOG_DIR`.
pub const LOADER_LOG_FILE: &str = "ze_loader.log";

/// Logging knobs read from the loader's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// `ZEL_ENABLE_LOADER_LOGGING`
    pub enabled: bool,
    /// `ZEL_LOADER_LOGGING_LEVEL`
    pub level: Option<String>,
    /// `ZEL_LOADER_LOG_DIR`
    pub log_dir: Option<PathBuf>,
    /// `ZEL_LOADER_LOG`, a raw filter directive that wins over everything else.
    pub directive: Option<String>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("ZEL_ENABLE_LOADER_LOGGING"),
            level: std::env::var("ZEL_LOADER_LOGGING_LEVEL").ok(),
            log_dir: std::env::var_os("ZEL_LOADER_LOG_DIR").map(PathBuf::from),
            directive: std::env::var("ZEL_LOADER_LOG").ok().filter(|d| !d.is_empty()),
        }
    }

    /// The `EnvFilter` directive these settings resolve to.
    pub fn filter_directive(&self) -> String {
        if let Some(directive) = &self.directive {
            return directive.clone();
        }
        if !self.enabled {
            return "warn".to_string();
        }
        normalize_level(self.level.as_deref().unwrap_or("warn")).to_string()
    }
}

/// Map the loader's level names onto `tracing` levels.
/// Unknown names fall back to `warn`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        "off" => "off",
        _ => "warn",
    }
}

/// Initialize structured logging from the environment.
/// Set ZEL_ENABLE_LOADER_LOGGING=1 and ZEL_LOADER_LOGGING_LEVEL=debug for verbose output.
pub fn init_logging() {
    init_logging_with(&LogSettings::from_env());
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging_with(settings: &LogSettings) {
    let filter = EnvFilter::try_new(settings.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let mut file_error = None;
    if settings.enabled {
        if let Some(dir) = &settings.log_dir {
            match open_log_file(dir) {
                Ok(file) => {
                    let _ = builder
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .try_init();
                    return;
                }
                Err(e) => file_error = Some((dir.join(LOADER_LOG_FILE), e)),
            }
        }
    }

    let _ = builder.try_init();

    if let Some((path, e)) = file_error {
        tracing::warn!("unable to open log file {}: {}, logging to stderr", path.display(), e);
    }
}

fn open_log_file(dir: &Path) -> io::Result<File> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOADER_LOG_FILE))
}
