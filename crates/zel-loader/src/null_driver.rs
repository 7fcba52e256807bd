//! In-process driver that does no device work.
//!
//! Mints unique handles, remembers which are live, and completes every
//! submission immediately. Used when `ZE_ENABLE_NULL_DRIVER` is set and as the
//! backend for tests and the synthetic workload.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{debug, trace};
use zel_core::{ApiCall, CallKind, CallOutput, Driver, EntryPoint, Handle, HandleCategory, ZeResult};

pub const NULL_DRIVER_NAME: &str = "null";

const HANDLE_BASE: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;

/// A scripted failure for one entry point.
#[derive(Debug, Clone, Copy)]
struct Failure {
    result: ZeResult,
    /// `None` fails forever
    remaining: Option<u32>,
}

pub struct NullDriver {
    next: AtomicUsize,
    live: DashMap<Handle, HandleCategory>,
    /// Host memory standing in for device allocations, when enabled.
    backing: DashMap<Handle, Box<[u8]>>,
    back_allocations: bool,
    signaled: DashMap<Handle, bool>,
    failures: DashMap<EntryPoint, Failure>,
}

impl Default for NullDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl NullDriver {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(HANDLE_BASE),
            live: DashMap::new(),
            backing: DashMap::new(),
            back_allocations: false,
            signaled: DashMap::new(),
            failures: DashMap::new(),
        }
    }

    /// Back memory allocations with touched host pages so process RSS moves
    /// the way it would with a real driver.
    pub fn with_backed_allocations(mut self) -> Self {
        self.back_allocations = true;
        self
    }

    /// Fail the next `times` calls of `entry_point` with `result`.
    pub fn fail_next(&self, entry_point: EntryPoint, result: ZeResult, times: u32) {
        self.failures.insert(
            entry_point,
            Failure {
                result,
                remaining: Some(times),
            },
        );
    }

    /// Fail every call of `entry_point` until cleared.
    pub fn fail_always(&self, entry_point: EntryPoint, result: ZeResult) {
        self.failures.insert(
            entry_point,
            Failure {
                result,
                remaining: None,
            },
        );
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    pub fn live_in(&self, category: HandleCategory) -> usize {
        self.live.iter().filter(|e| *e.value() == category).count()
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.live.contains_key(&handle)
    }

    fn mint(&self) -> Handle {
        Handle::from_raw(self.next.fetch_add(HANDLE_STRIDE, Ordering::Relaxed))
    }

    fn scripted_failure(&self, entry_point: EntryPoint) -> Option<ZeResult> {
        let mut entry = self.failures.get_mut(&entry_point)?;
        let result = entry.result;
        match entry.remaining.as_mut() {
            None => Some(result),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(result)
            }
        }
    }

    fn create(
        &self,
        call: &ApiCall,
        category: HandleCategory,
        output: &mut CallOutput,
    ) -> ZeResult {
        let backing = match call.requested_size() {
            Some(size) if self.back_allocations => match touched_block(size) {
                Some(block) => Some(block),
                None => {
                    debug!("{}: cannot back {} bytes", call.entry_point(), size);
                    return ZeResult::ErrorOutOfHostMemory;
                }
            },
            _ => None,
        };

        let handle = self.mint();
        self.live.insert(handle, category);
        if let Some(block) = backing {
            self.backing.insert(handle, block);
        }
        if let ApiCall::EventCreate { .. } = call {
            self.signaled.insert(handle, false);
        }
        output.handle = handle;
        trace!("{}: minted {}", call.entry_point(), handle);
        ZeResult::Success
    }

    fn destroy(&self, call: &ApiCall, category: HandleCategory) -> ZeResult {
        let Some(handle) = call.released_handle() else {
            return ZeResult::ErrorInvalidArgument;
        };
        match self.live.remove_if(&handle, |_, c| *c == category) {
            Some(_) => {
                self.backing.remove(&handle);
                self.signaled.remove(&handle);
                ZeResult::Success
            }
            None => {
                debug!("{}: unknown handle {}", call.entry_point(), handle);
                ZeResult::ErrorInvalidNullHandle
            }
        }
    }

    fn set_signaled(&self, event: Handle, value: bool) -> ZeResult {
        match self.signaled.get_mut(&event) {
            Some(mut state) => {
                *state = value;
                ZeResult::Success
            }
            None => ZeResult::ErrorInvalidNullHandle,
        }
    }
}

/// Host block of `size` bytes with every page written, or `None` if the
/// allocation cannot be made.
fn touched_block(size: usize) -> Option<Box<[u8]>> {
    let mut block = Vec::new();
    block.try_reserve_exact(size).ok()?;
    // fresh zeroed pages may stay unmapped; writing faults them in
    block.resize(size, 0xa5u8);
    Some(block.into_boxed_slice())
}

impl Driver for NullDriver {
    fn name(&self) -> &str {
        NULL_DRIVER_NAME
    }

    fn call(&self, call: &ApiCall, output: &mut CallOutput) -> ZeResult {
        let entry_point = call.entry_point();
        if let Some(result) = self.scripted_failure(entry_point) {
            return result;
        }
        match entry_point.kind() {
            CallKind::Create(category) => self.create(call, category, output),
            CallKind::Destroy(category) => self.destroy(call, category),
            CallKind::Append | CallKind::Other => match *call {
                ApiCall::EventHostSignal { event }
                | ApiCall::CommandListAppendSignalEvent { event, .. } => {
                    self.set_signaled(event, true)
                }
                ApiCall::EventHostReset { event }
                | ApiCall::CommandListAppendEventReset { event, .. } => {
                    self.set_signaled(event, false)
                }
                ApiCall::EventQueryStatus { event } => match self.signaled.get(&event) {
                    Some(state) if *state => ZeResult::Success,
                    Some(_) => ZeResult::NotReady,
                    None => ZeResult::ErrorInvalidNullHandle,
                },
                _ => ZeResult::Success,
            },
        }
    }
}
