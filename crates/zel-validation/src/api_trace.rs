use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info};
use zel_core::{CallFrame, CallOutput, EntryPoint, HookSet, Layer, Timeout, ZeResult};

pub const LAYER_NAME: &str = "api_tracing";

/// Logs entry and exit of every call with its id, result and latency.
#[derive(Default)]
pub struct ApiTracingLayer {
    entered: AtomicU64,
    exited: AtomicU64,
}

impl ApiTracingLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prologues seen, including calls a later layer vetoed.
    pub fn entered(&self) -> u64 {
        self.entered.load(Ordering::Relaxed)
    }

    /// Epilogues seen.
    pub fn exited(&self) -> u64 {
        self.exited.load(Ordering::Relaxed)
    }
}

impl Layer for ApiTracingLayer {
    fn name(&self) -> &str {
        LAYER_NAME
    }

    fn hooks(&self, _entry_point: EntryPoint) -> HookSet {
        HookSet::BOTH
    }

    fn prologue(&self, frame: &mut CallFrame<'_>) -> ZeResult {
        self.entered.fetch_add(1, Ordering::Relaxed);
        match frame.call().timeout().map(Timeout::from_nanos) {
            Some(timeout) => debug!(
                "--> {} call {} timeout {:?}",
                frame.entry_point(),
                frame.id(),
                timeout
            ),
            None => debug!("--> {} call {}", frame.entry_point(), frame.id()),
        }
        frame.stash(Instant::now());
        ZeResult::Success
    }

    fn epilogue(&self, frame: &mut CallFrame<'_>, output: &CallOutput, result: ZeResult) {
        self.exited.fetch_add(1, Ordering::Relaxed);
        let elapsed = frame.take::<Instant>().map(|t| t.elapsed()).unwrap_or_default();
        if output.handle.is_null() {
            debug!("<-- {} call {}: {} ({:?})", frame.entry_point(), frame.id(), result, elapsed);
        } else {
            debug!(
                "<-- {} call {}: {} handle {:?} ({:?})",
                frame.entry_point(),
                frame.id(),
                result,
                output.handle,
                elapsed
            );
        }
    }

    fn teardown(&self) {
        info!(
            "api tracing: {} calls entered, {} completed",
            self.entered(),
            self.exited()
        );
    }
}
