//! The loader context: owns configuration, the driver, and the layer registry.
//!
//! Layers are collected until the first `initialize` (explicit, or implied by
//! the first dispatch). From then on the registry is frozen and read without
//! locks. `teardown` runs at most once, also from `Drop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info};
use zel_core::config::LoaderConfig;
use zel_core::version::{ApiVersion, ComponentVersion, LibraryVersion};
use zel_core::{ApiCall, CallOutput, CoreError, Driver, Layer, LayerContext, ZeResult};
use zel_tracker::SystemResourceTrackerLayer;
use zel_validation::{ApiTracingLayer, BasicLeakChecker, ParameterValidationLayer};

use crate::discovery;
use crate::null_driver::NullDriver;
use crate::registry::LayerRegistry;

pub const LOADER_COMPONENT: &str = "loader";

type TeardownCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Pending {
    layers: Vec<Arc<dyn Layer>>,
    callbacks: Vec<TeardownCallback>,
    frozen: bool,
}

pub struct Loader {
    context: LayerContext,
    driver: Arc<dyn Driver>,
    pending: Mutex<Pending>,
    registry: OnceLock<LayerRegistry>,
    torn_down: AtomicBool,
}

impl Loader {
    /// Pick a driver for `config`. Only the null driver can be bound.
    pub fn new(config: LoaderConfig) -> Result<Self, CoreError> {
        if config.drivers.enable_null_driver {
            info!("using the null driver");
            return Ok(Self::with_driver(config, Arc::new(NullDriver::new())));
        }
        let statuses = discovery::inspect_drivers(&discovery::discover_enabled_drivers(&config));
        let found: Vec<&str> = statuses
            .iter()
            .filter(|p| p.has_entry_symbol)
            .map(|p| p.name.as_str())
            .collect();
        if found.is_empty() {
            Err(CoreError::NoDriver("no driver library could be loaded".into()))
        } else {
            Err(CoreError::NoDriver(format!(
                "found {} but binding vendor drivers is not supported; set ZE_ENABLE_NULL_DRIVER=1",
                found.join(", ")
            )))
        }
    }

    /// Loader configured from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::new(LoaderConfig::from_env())
    }

    pub fn with_driver(config: LoaderConfig, driver: Arc<dyn Driver>) -> Self {
        Self {
            context: LayerContext::new(config),
            driver,
            pending: Mutex::new(Pending::default()),
            registry: OnceLock::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.context.config
    }

    pub fn context(&self) -> &LayerContext {
        &self.context
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Append a layer after the built-in ones. Fails once the loader is initialized.
    pub fn register_layer(&self, layer: Arc<dyn Layer>) -> Result<(), CoreError> {
        let mut pending = self.pending.lock();
        if pending.frozen {
            return Err(CoreError::RegistryFrozen(layer.name().to_string()));
        }
        debug!("registered layer {}", layer.name());
        pending.layers.push(layer);
        Ok(())
    }

    /// Run `callback` at teardown, before any layer reports.
    pub fn register_teardown_callback<F>(&self, callback: F) -> Result<(), CoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if self.is_torn_down() {
            return Err(CoreError::TornDown);
        }
        pending.callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Build the enabled built-in layers and freeze the registry. Idempotent.
    pub fn initialize(&self) -> &LayerRegistry {
        self.registry.get_or_init(|| {
            let mut pending = self.pending.lock();
            pending.frozen = true;

            let toggles = &self.context.config.layers;
            let mut layers: Vec<Arc<dyn Layer>> = Vec::new();
            if toggles.parameter_validation {
                layers.push(Arc::new(ParameterValidationLayer::new()));
            }
            if toggles.basic_leak_checker {
                layers.push(Arc::new(BasicLeakChecker::new()));
            }
            if toggles.api_tracing {
                layers.push(Arc::new(ApiTracingLayer::new()));
            }
            if toggles.system_resource_tracker {
                layers.push(Arc::new(SystemResourceTrackerLayer::new(&self.context)));
            }
            layers.append(&mut pending.layers);

            let registry = LayerRegistry::new(layers);
            info!(
                "loader initialized: driver={}, layers=[{}]",
                self.driver.name(),
                registry.layer_names().join(", ")
            );
            registry
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Route one call through the layers to the driver.
    pub fn dispatch(&self, call: &ApiCall, output: &mut CallOutput) -> ZeResult {
        if self.is_torn_down() {
            return ZeResult::ErrorUninitialized;
        }
        self.initialize().dispatch(self.driver.as_ref(), call, output)
    }

    /// Dispatch a create and hand back the new handle on success.
    pub fn create(&self, call: &ApiCall) -> Result<zel_core::Handle, ZeResult> {
        let mut output = CallOutput::default();
        match self.dispatch(call, &mut output) {
            ZeResult::Success => Ok(output.handle),
            other => Err(other),
        }
    }

    /// `loader` first, then each layer in registration order.
    pub fn component_versions(&self) -> Vec<ComponentVersion> {
        let registry = self.initialize();
        let mut versions = Vec::with_capacity(1 + registry.layers().len());
        versions.push(loader_version());
        versions.extend(registry.layers().iter().map(|layer| {
            ComponentVersion::new(layer.name(), layer.spec_version(), layer.library_version())
        }));
        versions
    }

    /// Let callbacks and layers report, once. A loader that was never
    /// initialized has no layers to report.
    pub fn teardown(&self) {
        let callbacks = {
            let mut pending = self.pending.lock();
            if self.torn_down.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut pending.callbacks)
        };
        for callback in callbacks {
            callback();
        }
        let Some(registry) = self.registry.get() else {
            return;
        };
        for layer in registry.layers() {
            debug!("tearing down layer {}", layer.name());
            layer.teardown();
        }
        info!("loader torn down");
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub fn loader_version() -> ComponentVersion {
    ComponentVersion::new(LOADER_COMPONENT, ApiVersion::CURRENT, LibraryVersion::of_loader())
}
