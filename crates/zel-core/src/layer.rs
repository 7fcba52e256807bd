//! The interception seam.
//!
//! A layer declares, per entry point, whether it wants a prologue (before the
//! driver, may veto) and/or an epilogue (after the driver, observe only).
//! State that must survive from prologue to epilogue of the *same* call goes
//! in the [`CallFrame`], never in thread-keyed maps: a call always finishes
//! on the thread that started it, but two calls on one thread may nest.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bitflags::bitflags;

use crate::call::{ApiCall, CallOutput};
use crate::config::LoaderConfig;
use crate::entry_point::EntryPoint;
use crate::result::ZeResult;
use crate::version::{ApiVersion, LibraryVersion};

bitflags! {
    /// Hooks a layer installs for one entry point.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookSet: u8 {
        const PROLOGUE = 0b01;
        const EPILOGUE = 0b10;
        const BOTH = Self::PROLOGUE.bits() | Self::EPILOGUE.bits();
    }
}

pub trait Layer: Send + Sync {
    /// Component name reported by the version query.
    fn name(&self) -> &str;

    /// Queried once per entry point when the loader freezes its hook table.
    fn hooks(&self, entry_point: EntryPoint) -> HookSet;

    /// Runs before the driver. Anything but `Success` vetoes the call: the
    /// driver and all remaining layers are skipped and this result returned.
    fn prologue(&self, _frame: &mut CallFrame<'_>) -> ZeResult {
        ZeResult::Success
    }

    /// Runs after the driver. Not called when a prologue vetoed the call.
    fn epilogue(&self, _frame: &mut CallFrame<'_>, _output: &CallOutput, _result: ZeResult) {}

    /// Flush reports. Called once, in registration order.
    fn teardown(&self) {}

    fn spec_version(&self) -> ApiVersion {
        ApiVersion::CURRENT
    }

    fn library_version(&self) -> LibraryVersion {
        LibraryVersion::of_loader()
    }
}

/// Process-wide facts handed to every layer constructor.
#[derive(Debug, Clone)]
pub struct LayerContext {
    pub config: LoaderConfig,
    pub pid: u32,
    pub started: Instant,
}

impl LayerContext {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            pid: zel_common::platform::process_id(),
            started: Instant::now(),
        }
    }
}

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Per-call context threaded through every hook of one dispatch.
pub struct CallFrame<'a> {
    id: u64,
    call: &'a ApiCall,
    entry_point: EntryPoint,
    layer: usize,
    slots: Vec<(usize, Box<dyn Any + Send>)>,
}

impl<'a> CallFrame<'a> {
    pub fn new(call: &'a ApiCall) -> Self {
        Self {
            id: NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed),
            call,
            entry_point: call.entry_point(),
            layer: 0,
            slots: Vec::new(),
        }
    }

    /// Process-unique, monotonically increasing.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn call(&self) -> &'a ApiCall {
        self.call
    }

    pub fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    /// Select the layer whose slot `stash`/`take` address. Set by the dispatcher.
    pub fn for_layer(&mut self, index: usize) -> &mut Self {
        self.layer = index;
        self
    }

    /// Keep a value for this layer's epilogue. Replaces an earlier stash.
    pub fn stash<T: Any + Send>(&mut self, value: T) {
        let layer = self.layer;
        self.slots.retain(|(owner, _)| *owner != layer);
        self.slots.push((layer, Box::new(value)));
    }

    /// Retrieve what this layer stashed, if it stashed a `T`.
    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        let layer = self.layer;
        let pos = self
            .slots
            .iter()
            .position(|(owner, v)| *owner == layer && v.is::<T>())?;
        let (_, boxed) = self.slots.swap_remove(pos);
        boxed.downcast::<T>().ok().map(|b| *b)
    }
}
