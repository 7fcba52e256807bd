//! Entry-point arguments as a sum type.
//!
//! One variant per [`EntryPoint`]. Handles are carried by value; the out-pointer
//! of create calls is modelled by [`CallOutput`], which the driver fills.

use std::time::Duration;

use crate::entry_point::EntryPoint;
use crate::handle::Handle;

/// Command queue / immediate command list descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandQueueDesc {
    pub ordinal: u32,
    pub index: u32,
    pub flags: u32,
    /// 0 = default, 1 = synchronous, 2 = asynchronous
    pub mode: u32,
    /// 0 = normal, 1 = low, 2 = high
    pub priority: u32,
}

impl CommandQueueDesc {
    pub const MAX_FLAGS: u32 = 0x1;
    pub const MAX_MODE: u32 = 2;
    pub const MAX_PRIORITY: u32 = 2;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u64,
    pub height: u32,
    pub depth: u32,
}

/// Origin and extent of a 3D copy region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupCount {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// A counted list of event handles, as passed through `(count, ptr)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitList {
    pub count: u32,
    pub events: Vec<Handle>,
}

impl WaitList {
    pub fn new(events: Vec<Handle>) -> Self {
        Self {
            count: events.len() as u32,
            events,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Timeout argument of the host synchronize calls, in nanoseconds.
///
/// The loader forwards the raw value untouched; this only classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately with the current status.
    Poll,
    /// Block up to the duration, then report not-ready.
    Bounded(Duration),
    /// Block until completion or device loss.
    Infinite,
}

impl Timeout {
    pub fn from_nanos(raw: u64) -> Self {
        match raw {
            0 => Timeout::Poll,
            u64::MAX => Timeout::Infinite,
            n => Timeout::Bounded(Duration::from_nanos(n)),
        }
    }

    pub fn as_nanos(self) -> u64 {
        match self {
            Timeout::Poll => 0,
            Timeout::Infinite => u64::MAX,
            Timeout::Bounded(d) => u64::try_from(d.as_nanos()).unwrap_or(u64::MAX - 1),
        }
    }
}

/// Out-parameters written by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOutput {
    /// Newly created handle; stays null unless a create call succeeds.
    pub handle: Handle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    // ── Context ─────────────────────────────────────────────
    ContextCreate { driver: Handle, flags: u32 },
    ContextDestroy { context: Handle },

    // ── Command Queue ───────────────────────────────────────
    CommandQueueCreate { context: Handle, device: Handle, desc: CommandQueueDesc },
    CommandQueueDestroy { command_queue: Handle },
    CommandQueueExecuteCommandLists {
        command_queue: Handle,
        command_lists: Vec<Handle>,
        fence: Handle,
    },
    CommandQueueSynchronize { command_queue: Handle, timeout: u64 },

    // ── Command List ────────────────────────────────────────
    CommandListCreate { context: Handle, device: Handle, ordinal: u32, flags: u32 },
    CommandListCreateImmediate { context: Handle, device: Handle, desc: CommandQueueDesc },
    CommandListDestroy { command_list: Handle },
    CommandListClose { command_list: Handle },
    CommandListReset { command_list: Handle },

    // ── Command List Append ─────────────────────────────────
    CommandListAppendBarrier { command_list: Handle, signal_event: Handle, wait: WaitList },
    CommandListAppendMemoryRangesBarrier {
        command_list: Handle,
        range_sizes: Vec<usize>,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendMemoryCopy {
        command_list: Handle,
        dst: Handle,
        src: Handle,
        size: usize,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendMemoryFill {
        command_list: Handle,
        ptr: Handle,
        pattern_size: usize,
        size: usize,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendMemoryCopyRegion {
        command_list: Handle,
        dst: Handle,
        dst_region: Region,
        src: Handle,
        src_region: Region,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendMemoryCopyFromContext {
        command_list: Handle,
        dst: Handle,
        src_context: Handle,
        src: Handle,
        size: usize,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendImageCopy {
        command_list: Handle,
        dst_image: Handle,
        src_image: Handle,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendImageCopyRegion {
        command_list: Handle,
        dst_image: Handle,
        src_image: Handle,
        dst_region: Option<Region>,
        src_region: Option<Region>,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendImageCopyToMemory {
        command_list: Handle,
        dst: Handle,
        src_image: Handle,
        region: Option<Region>,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendImageCopyFromMemory {
        command_list: Handle,
        dst_image: Handle,
        src: Handle,
        region: Option<Region>,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendMemoryPrefetch { command_list: Handle, ptr: Handle, size: usize },
    CommandListAppendMemAdvise {
        command_list: Handle,
        device: Handle,
        ptr: Handle,
        size: usize,
        advice: u32,
    },
    CommandListAppendSignalEvent { command_list: Handle, event: Handle },
    CommandListAppendWaitOnEvents { command_list: Handle, events: WaitList },
    CommandListAppendEventReset { command_list: Handle, event: Handle },
    CommandListAppendQueryKernelTimestamps {
        command_list: Handle,
        events: WaitList,
        dst: Handle,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendLaunchKernel {
        command_list: Handle,
        kernel: Handle,
        group_count: GroupCount,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendLaunchCooperativeKernel {
        command_list: Handle,
        kernel: Handle,
        group_count: GroupCount,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendLaunchKernelIndirect {
        command_list: Handle,
        kernel: Handle,
        arguments_buffer: Handle,
        signal_event: Handle,
        wait: WaitList,
    },
    CommandListAppendWriteGlobalTimestamp {
        command_list: Handle,
        dst: Handle,
        signal_event: Handle,
        wait: WaitList,
    },

    // ── Module / Kernel ─────────────────────────────────────
    ModuleCreate { context: Handle, device: Handle, format: u32, input_size: usize },
    ModuleDestroy { module: Handle },
    KernelCreate { module: Handle, name: String },
    KernelDestroy { kernel: Handle },

    // ── Events ──────────────────────────────────────────────
    EventPoolCreate { context: Handle, flags: u32, count: u32, devices: Vec<Handle> },
    EventPoolDestroy { event_pool: Handle },
    EventCreate { event_pool: Handle, index: u32 },
    EventDestroy { event: Handle },
    EventHostSynchronize { event: Handle, timeout: u64 },
    EventQueryStatus { event: Handle },
    EventHostSignal { event: Handle },
    EventHostReset { event: Handle },

    // ── Fences ──────────────────────────────────────────────
    FenceCreate { command_queue: Handle, flags: u32 },
    FenceDestroy { fence: Handle },
    FenceHostSynchronize { fence: Handle, timeout: u64 },
    FenceQueryStatus { fence: Handle },
    FenceReset { fence: Handle },

    // ── Images / Samplers ───────────────────────────────────
    ImageCreate { context: Handle, device: Handle, desc: ImageDesc },
    ImageViewCreateExt { context: Handle, device: Handle, desc: ImageDesc, image: Handle },
    ImageDestroy { image: Handle },
    SamplerCreate {
        context: Handle,
        device: Handle,
        address_mode: u32,
        filter_mode: u32,
        normalized: bool,
    },
    SamplerDestroy { sampler: Handle },

    // ── Memory ──────────────────────────────────────────────
    MemAllocDevice { context: Handle, size: usize, alignment: usize, device: Handle },
    MemAllocHost { context: Handle, size: usize, alignment: usize },
    MemAllocShared { context: Handle, size: usize, alignment: usize, device: Handle },
    MemFree { context: Handle, ptr: Handle },
    MemFreeExt { context: Handle, ptr: Handle, policy: u32 },
}

impl ApiCall {
    pub fn entry_point(&self) -> EntryPoint {
        match self {
            ApiCall::ContextCreate { .. } => EntryPoint::ContextCreate,
            ApiCall::ContextDestroy { .. } => EntryPoint::ContextDestroy,
            ApiCall::CommandQueueCreate { .. } => EntryPoint::CommandQueueCreate,
            ApiCall::CommandQueueDestroy { .. } => EntryPoint::CommandQueueDestroy,
            ApiCall::CommandQueueExecuteCommandLists { .. } => {
                EntryPoint::CommandQueueExecuteCommandLists
            }
            ApiCall::CommandQueueSynchronize { .. } => EntryPoint::CommandQueueSynchronize,
            ApiCall::CommandListCreate { .. } => EntryPoint::CommandListCreate,
            ApiCall::CommandListCreateImmediate { .. } => EntryPoint::CommandListCreateImmediate,
            ApiCall::CommandListDestroy { .. } => EntryPoint::CommandListDestroy,
            ApiCall::CommandListClose { .. } => EntryPoint::CommandListClose,
            ApiCall::CommandListReset { .. } => EntryPoint::CommandListReset,
            ApiCall::CommandListAppendBarrier { .. } => EntryPoint::CommandListAppendBarrier,
            ApiCall::CommandListAppendMemoryRangesBarrier { .. } => {
                EntryPoint::CommandListAppendMemoryRangesBarrier
            }
            ApiCall::CommandListAppendMemoryCopy { .. } => EntryPoint::CommandListAppendMemoryCopy,
            ApiCall::CommandListAppendMemoryFill { .. } => EntryPoint::CommandListAppendMemoryFill,
            ApiCall::CommandListAppendMemoryCopyRegion { .. } => {
                EntryPoint::CommandListAppendMemoryCopyRegion
            }
            ApiCall::CommandListAppendMemoryCopyFromContext { .. } => {
                EntryPoint::CommandListAppendMemoryCopyFromContext
            }
            ApiCall::CommandListAppendImageCopy { .. } => EntryPoint::CommandListAppendImageCopy,
            ApiCall::CommandListAppendImageCopyRegion { .. } => {
                EntryPoint::CommandListAppendImageCopyRegion
            }
            ApiCall::CommandListAppendImageCopyToMemory { .. } => {
                EntryPoint::CommandListAppendImageCopyToMemory
            }
            ApiCall::CommandListAppendImageCopyFromMemory { .. } => {
                EntryPoint::CommandListAppendImageCopyFromMemory
            }
            ApiCall::CommandListAppendMemoryPrefetch { .. } => {
                EntryPoint::CommandListAppendMemoryPrefetch
            }
            ApiCall::CommandListAppendMemAdvise { .. } => EntryPoint::CommandListAppendMemAdvise,
            ApiCall::CommandListAppendSignalEvent { .. } => {
                EntryPoint::CommandListAppendSignalEvent
            }
            ApiCall::CommandListAppendWaitOnEvents { .. } => {
                EntryPoint::CommandListAppendWaitOnEvents
            }
            ApiCall::CommandListAppendEventReset { .. } => EntryPoint::CommandListAppendEventReset,
            ApiCall::CommandListAppendQueryKernelTimestamps { .. } => {
                EntryPoint::CommandListAppendQueryKernelTimestamps
            }
            ApiCall::CommandListAppendLaunchKernel { .. } => {
                EntryPoint::CommandListAppendLaunchKernel
            }
            ApiCall::CommandListAppendLaunchCooperativeKernel { .. } => {
                EntryPoint::CommandListAppendLaunchCooperativeKernel
            }
            ApiCall::CommandListAppendLaunchKernelIndirect { .. } => {
                EntryPoint::CommandListAppendLaunchKernelIndirect
            }
            ApiCall::CommandListAppendWriteGlobalTimestamp { .. } => {
                EntryPoint::CommandListAppendWriteGlobalTimestamp
            }
            ApiCall::ModuleCreate { .. } => EntryPoint::ModuleCreate,
            ApiCall::ModuleDestroy { .. } => EntryPoint::ModuleDestroy,
            ApiCall::KernelCreate { .. } => EntryPoint::KernelCreate,
            ApiCall::KernelDestroy { .. } => EntryPoint::KernelDestroy,
            ApiCall::EventPoolCreate { .. } => EntryPoint::EventPoolCreate,
            ApiCall::EventPoolDestroy { .. } => EntryPoint::EventPoolDestroy,
            ApiCall::EventCreate { .. } => EntryPoint::EventCreate,
            ApiCall::EventDestroy { .. } => EntryPoint::EventDestroy,
            ApiCall::EventHostSynchronize { .. } => EntryPoint::EventHostSynchronize,
            ApiCall::EventQueryStatus { .. } => EntryPoint::EventQueryStatus,
            ApiCall::EventHostSignal { .. } => EntryPoint::EventHostSignal,
            ApiCall::EventHostReset { .. } => EntryPoint::EventHostReset,
            ApiCall::FenceCreate { .. } => EntryPoint::FenceCreate,
            ApiCall::FenceDestroy { .. } => EntryPoint::FenceDestroy,
            ApiCall::FenceHostSynchronize { .. } => EntryPoint::FenceHostSynchronize,
            ApiCall::FenceQueryStatus { .. } => EntryPoint::FenceQueryStatus,
            ApiCall::FenceReset { .. } => EntryPoint::FenceReset,
            ApiCall::ImageCreate { .. } => EntryPoint::ImageCreate,
            ApiCall::ImageViewCreateExt { .. } => EntryPoint::ImageViewCreateExt,
            ApiCall::ImageDestroy { .. } => EntryPoint::ImageDestroy,
            ApiCall::SamplerCreate { .. } => EntryPoint::SamplerCreate,
            ApiCall::SamplerDestroy { .. } => EntryPoint::SamplerDestroy,
            ApiCall::MemAllocDevice { .. } => EntryPoint::MemAllocDevice,
            ApiCall::MemAllocHost { .. } => EntryPoint::MemAllocHost,
            ApiCall::MemAllocShared { .. } => EntryPoint::MemAllocShared,
            ApiCall::MemFree { .. } => EntryPoint::MemFree,
            ApiCall::MemFreeExt { .. } => EntryPoint::MemFreeExt,
        }
    }

    /// The handle a destroy call consumes.
    pub fn released_handle(&self) -> Option<Handle> {
        match *self {
            ApiCall::ContextDestroy { context } => Some(context),
            ApiCall::CommandQueueDestroy { command_queue } => Some(command_queue),
            ApiCall::CommandListDestroy { command_list } => Some(command_list),
            ApiCall::ModuleDestroy { module } => Some(module),
            ApiCall::KernelDestroy { kernel } => Some(kernel),
            ApiCall::EventPoolDestroy { event_pool } => Some(event_pool),
            ApiCall::EventDestroy { event } => Some(event),
            ApiCall::FenceDestroy { fence } => Some(fence),
            ApiCall::ImageDestroy { image } => Some(image),
            ApiCall::SamplerDestroy { sampler } => Some(sampler),
            ApiCall::MemFree { ptr, .. } | ApiCall::MemFreeExt { ptr, .. } => Some(ptr),
            _ => None,
        }
    }

    /// Byte size requested by a memory allocation call.
    pub fn requested_size(&self) -> Option<usize> {
        match *self {
            ApiCall::MemAllocDevice { size, .. }
            | ApiCall::MemAllocHost { size, .. }
            | ApiCall::MemAllocShared { size, .. } => Some(size),
            _ => None,
        }
    }

    /// Raw timeout of the host synchronize calls.
    pub fn timeout(&self) -> Option<u64> {
        match *self {
            ApiCall::CommandQueueSynchronize { timeout, .. }
            | ApiCall::FenceHostSynchronize { timeout, .. }
            | ApiCall::EventHostSynchronize { timeout, .. } => Some(timeout),
            _ => None,
        }
    }
}
