//! The closed set of entry points the loader can dispatch.
//!
//! Each entry point is a fieldless variant so it can index hook tables and
//! counter arrays directly. Arguments travel separately in [`crate::ApiCall`].

use std::fmt;

use crate::handle::HandleCategory;

/// What an entry point does to handle lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Mints a new handle of the category through the out-pointer.
    Create(HandleCategory),
    /// Consumes exactly one handle of the category.
    Destroy(HandleCategory),
    /// Records work into a command list.
    Append,
    Other,
}

macro_rules! entry_points {
    ($($variant:ident => $name:literal, $kind:expr;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EntryPoint {
            $($variant,)+
        }

        impl EntryPoint {
            pub const ALL: &'static [EntryPoint] = &[$(EntryPoint::$variant,)+];
            pub const COUNT: usize = Self::ALL.len();

            /// C symbol name, e.g. `zeContextCreate`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(EntryPoint::$variant => $name,)+
                }
            }

            pub const fn kind(self) -> CallKind {
                match self {
                    $(EntryPoint::$variant => $kind,)+
                }
            }
        }
    };
}

use self::CallKind::{Append, Create, Destroy, Other};
use crate::handle::HandleCategory as C;

entry_points! {
    // ── Context ─────────────────────────────────────────────
    ContextCreate => "zeContextCreate", Create(C::Context);
    ContextDestroy => "zeContextDestroy", Destroy(C::Context);

    // ── Command Queue ───────────────────────────────────────
    CommandQueueCreate => "zeCommandQueueCreate", Create(C::CommandQueue);
    CommandQueueDestroy => "zeCommandQueueDestroy", Destroy(C::CommandQueue);
    CommandQueueExecuteCommandLists => "zeCommandQueueExecuteCommandLists", Other;
    CommandQueueSynchronize => "zeCommandQueueSynchronize", Other;

    // ── Command List ────────────────────────────────────────
    CommandListCreate => "zeCommandListCreate", Create(C::CommandList);
    CommandListCreateImmediate => "zeCommandListCreateImmediate", Create(C::CommandList);
    CommandListDestroy => "zeCommandListDestroy", Destroy(C::CommandList);
    CommandListClose => "zeCommandListClose", Other;
    CommandListReset => "zeCommandListReset", Other;

    // ── Command List Append ─────────────────────────────────
    CommandListAppendBarrier => "zeCommandListAppendBarrier", Append;
    CommandListAppendMemoryRangesBarrier => "zeCommandListAppendMemoryRangesBarrier", Append;
    CommandListAppendMemoryCopy => "zeCommandListAppendMemoryCopy", Append;
    CommandListAppendMemoryFill => "zeCommandListAppendMemoryFill", Append;
    CommandListAppendMemoryCopyRegion => "zeCommandListAppendMemoryCopyRegion", Append;
    CommandListAppendMemoryCopyFromContext => "zeCommandListAppendMemoryCopyFromContext", Append;
    CommandListAppendImageCopy => "zeCommandListAppendImageCopy", Append;
    CommandListAppendImageCopyRegion => "zeCommandListAppendImageCopyRegion", Append;
    CommandListAppendImageCopyToMemory => "zeCommandListAppendImageCopyToMemory", Append;
    CommandListAppendImageCopyFromMemory => "zeCommandListAppendImageCopyFromMemory", Append;
    CommandListAppendMemoryPrefetch => "zeCommandListAppendMemoryPrefetch", Append;
    CommandListAppendMemAdvise => "zeCommandListAppendMemAdvise", Append;
    CommandListAppendSignalEvent => "zeCommandListAppendSignalEvent", Append;
    CommandListAppendWaitOnEvents => "zeCommandListAppendWaitOnEvents", Append;
    CommandListAppendEventReset => "zeCommandListAppendEventReset", Append;
    CommandListAppendQueryKernelTimestamps => "zeCommandListAppendQueryKernelTimestamps", Append;
    CommandListAppendLaunchKernel => "zeCommandListAppendLaunchKernel", Append;
    CommandListAppendLaunchCooperativeKernel => "zeCommandListAppendLaunchCooperativeKernel", Append;
    CommandListAppendLaunchKernelIndirect => "zeCommandListAppendLaunchKernelIndirect", Append;
    CommandListAppendWriteGlobalTimestamp => "zeCommandListAppendWriteGlobalTimestamp", Append;

    // ── Module / Kernel ─────────────────────────────────────
    ModuleCreate => "zeModuleCreate", Create(C::Module);
    ModuleDestroy => "zeModuleDestroy", Destroy(C::Module);
    KernelCreate => "zeKernelCreate", Create(C::Kernel);
    KernelDestroy => "zeKernelDestroy", Destroy(C::Kernel);

    // ── Events ──────────────────────────────────────────────
    EventPoolCreate => "zeEventPoolCreate", Create(C::EventPool);
    EventPoolDestroy => "zeEventPoolDestroy", Destroy(C::EventPool);
    EventCreate => "zeEventCreate", Create(C::Event);
    EventDestroy => "zeEventDestroy", Destroy(C::Event);
    EventHostSynchronize => "zeEventHostSynchronize", Other;
    EventQueryStatus => "zeEventQueryStatus", Other;
    EventHostSignal => "zeEventHostSignal", Other;
    EventHostReset => "zeEventHostReset", Other;

    // ── Fences ──────────────────────────────────────────────
    FenceCreate => "zeFenceCreate", Create(C::Fence);
    FenceDestroy => "zeFenceDestroy", Destroy(C::Fence);
    FenceHostSynchronize => "zeFenceHostSynchronize", Other;
    FenceQueryStatus => "zeFenceQueryStatus", Other;
    FenceReset => "zeFenceReset", Other;

    // ── Images / Samplers ───────────────────────────────────
    ImageCreate => "zeImageCreate", Create(C::Image);
    ImageViewCreateExt => "zeImageViewCreateExt", Create(C::Image);
    ImageDestroy => "zeImageDestroy", Destroy(C::Image);
    SamplerCreate => "zeSamplerCreate", Create(C::Sampler);
    SamplerDestroy => "zeSamplerDestroy", Destroy(C::Sampler);

    // ── Memory ──────────────────────────────────────────────
    MemAllocDevice => "zeMemAllocDevice", Create(C::MemoryAllocation);
    MemAllocHost => "zeMemAllocHost", Create(C::MemoryAllocation);
    MemAllocShared => "zeMemAllocShared", Create(C::MemoryAllocation);
    MemFree => "zeMemFree", Destroy(C::MemoryAllocation);
    MemFreeExt => "zeMemFreeExt", Destroy(C::MemoryAllocation);
}

impl EntryPoint {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ep| ep.name() == name)
    }

    pub const fn is_create(self) -> bool {
        matches!(self.kind(), CallKind::Create(_))
    }

    pub const fn is_destroy(self) -> bool {
        matches!(self.kind(), CallKind::Destroy(_))
    }

    /// Category this entry point creates or destroys, if any.
    pub const fn category(self) -> Option<HandleCategory> {
        match self.kind() {
            CallKind::Create(c) | CallKind::Destroy(c) => Some(c),
            CallKind::Append | CallKind::Other => None,
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
