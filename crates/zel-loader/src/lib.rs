//! zel loader: composes layers in front of a driver and routes every call
//! through them.
//!
//! Build a [`Loader`], optionally register extra layers, then `dispatch`.
//! The C ABI exports in [`ffi`] wrap a single process-wide loader.

pub mod discovery;
pub mod ffi;
pub mod loader;
pub mod null_driver;
pub mod registry;

pub use discovery::{discover_enabled_drivers, inspect_drivers, DriverStatus};
pub use loader::Loader;
pub use null_driver::NullDriver;
pub use registry::LayerRegistry;
