//! Finding vendor driver libraries on this machine.
//!
//! Only checks whether a library loads and exports the driver entry symbol;
//! binding its dispatch tables is not done here.

use libloading::Library;
use tracing::{debug, info, warn};
use zel_common::platform::library_file_name;
use zel_core::config::LoaderConfig;

/// Symbol every conforming driver exports.
pub const DRIVER_ENTRY_SYMBOL: &str = "zeGetGlobalProcAddrTable";

const KNOWN_DRIVERS: &[&str] = &["ze_intel_gpu"];
const DRIVER_MAJOR: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    pub name: String,
    pub loaded: bool,
    pub has_entry_symbol: bool,
    pub error: Option<String>,
}

/// Library names to try, in order. `alt_drivers` replaces the defaults.
pub fn discover_enabled_drivers(config: &LoaderConfig) -> Vec<String> {
    if !config.drivers.alt_drivers.is_empty() {
        info!(
            "using alternate driver list: {}",
            config.drivers.alt_drivers.join(", ")
        );
        return config.drivers.alt_drivers.clone();
    }
    KNOWN_DRIVERS
        .iter()
        .map(|stem| library_file_name(stem, DRIVER_MAJOR))
        .collect()
}

/// Try to open each library. Failures are reported, never fatal.
pub fn inspect_drivers(names: &[String]) -> Vec<DriverStatus> {
    names.iter().map(|name| inspect(name)).collect()
}

fn inspect(name: &str) -> DriverStatus {
    // SAFETY: loading runs the library's initializers; that is the point of a
    // driver library and matches what the C loader does.
    match unsafe { Library::new(name) } {
        Ok(lib) => {
            // SAFETY: only the symbol's presence is checked, it is never called.
            let symbol =
                unsafe { lib.get::<unsafe extern "C" fn()>(DRIVER_ENTRY_SYMBOL.as_bytes()) };
            let has_entry_symbol = symbol.is_ok();
            if has_entry_symbol {
                info!("found driver: {}", name);
            } else {
                warn!("{} loaded but does not export {}", name, DRIVER_ENTRY_SYMBOL);
            }
            DriverStatus {
                name: name.to_string(),
                loaded: true,
                has_entry_symbol,
                error: None,
            }
        }
        Err(e) => {
            debug!("failed to load {}: {}", name, e);
            DriverStatus {
                name: name.to_string(),
                loaded: false,
                has_entry_symbol: false,
                error: Some(e.to_string()),
            }
        }
    }
}
