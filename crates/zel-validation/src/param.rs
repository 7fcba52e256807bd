//! Argument checks run before the driver sees a call.
//!
//! This is the only built-in layer whose prologue can return something other
//! than success, which stops the call before it reaches the driver.

use tracing::warn;
use zel_core::call::{CommandQueueDesc, WaitList};
use zel_core::{ApiCall, CallFrame, EntryPoint, Handle, HookSet, Layer, ZeResult};

pub const LAYER_NAME: &str = "parameter_validation";

#[derive(Debug, Default)]
pub struct ParameterValidationLayer;

impl ParameterValidationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for ParameterValidationLayer {
    fn name(&self) -> &str {
        LAYER_NAME
    }

    fn hooks(&self, _entry_point: EntryPoint) -> HookSet {
        HookSet::PROLOGUE
    }

    fn prologue(&self, frame: &mut CallFrame<'_>) -> ZeResult {
        let result = validate(frame.call());
        if !result.is_success() {
            warn!("{} rejected: {}", frame.entry_point(), result);
        }
        result
    }
}

macro_rules! ensure {
    ($e:expr) => {
        let r = $e;
        if !r.is_success() {
            return r;
        }
    };
}

fn handles(hs: &[Handle]) -> ZeResult {
    if hs.iter().any(|h| h.is_null()) {
        ZeResult::ErrorInvalidNullHandle
    } else {
        ZeResult::Success
    }
}

fn pointers(ps: &[Handle]) -> ZeResult {
    if ps.iter().any(|p| p.is_null()) {
        ZeResult::ErrorInvalidNullPointer
    } else {
        ZeResult::Success
    }
}

fn wait_list(wait: &WaitList) -> ZeResult {
    if wait.count as usize != wait.events.len() {
        return ZeResult::ErrorInvalidSize;
    }
    handles(&wait.events)
}

fn queue_desc(desc: &CommandQueueDesc) -> ZeResult {
    if desc.flags > CommandQueueDesc::MAX_FLAGS
        || desc.mode > CommandQueueDesc::MAX_MODE
        || desc.priority > CommandQueueDesc::MAX_PRIORITY
    {
        ZeResult::ErrorInvalidEnumeration
    } else {
        ZeResult::Success
    }
}

fn allocation(size: usize, alignment: usize) -> ZeResult {
    if size == 0 {
        ZeResult::ErrorUnsupportedSize
    } else if alignment != 0 && !alignment.is_power_of_two() {
        ZeResult::ErrorUnsupportedAlignment
    } else {
        ZeResult::Success
    }
}

/// Check one call's arguments. Optional handles (signal events, fences) may be null.
pub fn validate(call: &ApiCall) -> ZeResult {
    use ApiCall::*;

    match call {
        ContextCreate { driver, .. } => handles(&[*driver]),

        CommandQueueCreate { context, device, desc }
        | CommandListCreateImmediate { context, device, desc } => {
            ensure!(handles(&[*context, *device]));
            queue_desc(desc)
        }
        CommandQueueExecuteCommandLists { command_queue, command_lists, .. } => {
            ensure!(handles(&[*command_queue]));
            if command_lists.is_empty() {
                return ZeResult::ErrorInvalidSize;
            }
            handles(command_lists)
        }
        CommandQueueSynchronize { command_queue, .. } => handles(&[*command_queue]),
        CommandListCreate { context, device, .. } => handles(&[*context, *device]),
        CommandListClose { command_list } | CommandListReset { command_list } => {
            handles(&[*command_list])
        }

        CommandListAppendBarrier { command_list, wait, .. }
        | CommandListAppendImageCopy { command_list, wait, .. }
        | CommandListAppendImageCopyRegion { command_list, wait, .. }
        | CommandListAppendLaunchKernelIndirect { command_list, wait, .. } => {
            ensure!(handles(&[*command_list]));
            ensure!(image_or_kernel_handles(call));
            wait_list(wait)
        }
        CommandListAppendMemoryRangesBarrier { command_list, wait, .. } => {
            ensure!(handles(&[*command_list]));
            wait_list(wait)
        }
        CommandListAppendMemoryCopy { command_list, dst, src, wait, .. } => {
            ensure!(handles(&[*command_list]));
            ensure!(pointers(&[*dst, *src]));
            wait_list(wait)
        }
        CommandListAppendMemoryFill { command_list, ptr, pattern_size, wait, .. } => {
            ensure!(handles(&[*command_list]));
            ensure!(pointers(&[*ptr]));
            if *pattern_size == 0 {
                return ZeResult::ErrorInvalidSize;
            }
            wait_list(wait)
        }
        CommandListAppendMemoryCopyRegion { command_list, dst, src, wait, .. } => {
            ensure!(handles(&[*command_list]));
            ensure!(pointers(&[*dst, *src]));
            wait_list(wait)
        }
        CommandListAppendMemoryCopyFromContext {
            command_list,
            dst,
            src_context,
            src,
            wait,
            ..
        } => {
            ensure!(handles(&[*command_list, *src_context]));
            ensure!(pointers(&[*dst, *src]));
            wait_list(wait)
        }
        CommandListAppendImageCopyToMemory { command_list, dst, src_image, wait, .. } => {
            ensure!(handles(&[*command_list, *src_image]));
            ensure!(pointers(&[*dst]));
            wait_list(wait)
        }
        CommandListAppendImageCopyFromMemory { command_list, dst_image, src, wait, .. } => {
            ensure!(handles(&[*command_list, *dst_image]));
            ensure!(pointers(&[*src]));
            wait_list(wait)
        }
        CommandListAppendMemoryPrefetch { command_list, ptr, .. } => {
            ensure!(handles(&[*command_list]));
            pointers(&[*ptr])
        }
        CommandListAppendMemAdvise { command_list, device, ptr, .. } => {
            ensure!(handles(&[*command_list, *device]));
            pointers(&[*ptr])
        }
        CommandListAppendSignalEvent { command_list, event }
        | CommandListAppendEventReset { command_list, event } => handles(&[*command_list, *event]),
        CommandListAppendWaitOnEvents { command_list, events } => {
            ensure!(handles(&[*command_list]));
            wait_list(events)
        }
        CommandListAppendQueryKernelTimestamps { command_list, events, dst, wait, .. } => {
            ensure!(handles(&[*command_list]));
            ensure!(pointers(&[*dst]));
            ensure!(wait_list(events));
            wait_list(wait)
        }
        CommandListAppendLaunchKernel { command_list, kernel, wait, .. }
        | CommandListAppendLaunchCooperativeKernel { command_list, kernel, wait, .. } => {
            ensure!(handles(&[*command_list, *kernel]));
            wait_list(wait)
        }
        CommandListAppendWriteGlobalTimestamp { command_list, dst, wait, .. } => {
            ensure!(handles(&[*command_list]));
            ensure!(pointers(&[*dst]));
            wait_list(wait)
        }

        ModuleCreate { context, device, input_size, .. } => {
            ensure!(handles(&[*context, *device]));
            if *input_size == 0 {
                ZeResult::ErrorInvalidSize
            } else {
                ZeResult::Success
            }
        }
        KernelCreate { module, name } => {
            ensure!(handles(&[*module]));
            if name.is_empty() {
                ZeResult::ErrorInvalidArgument
            } else {
                ZeResult::Success
            }
        }

        EventPoolCreate { context, count, devices, .. } => {
            ensure!(handles(&[*context]));
            ensure!(handles(devices));
            if *count == 0 {
                ZeResult::ErrorInvalidSize
            } else {
                ZeResult::Success
            }
        }
        EventCreate { event_pool, .. } => handles(&[*event_pool]),
        EventHostSynchronize { event, .. }
        | EventQueryStatus { event }
        | EventHostSignal { event }
        | EventHostReset { event } => handles(&[*event]),

        FenceCreate { command_queue, .. } => handles(&[*command_queue]),
        FenceHostSynchronize { fence, .. } | FenceQueryStatus { fence } | FenceReset { fence } => {
            handles(&[*fence])
        }

        ImageCreate { context, device, .. } => handles(&[*context, *device]),
        ImageViewCreateExt { context, device, image, .. } => handles(&[*context, *device, *image]),
        SamplerCreate { context, device, .. } => handles(&[*context, *device]),

        MemAllocDevice { context, size, alignment, device }
        | MemAllocShared { context, size, alignment, device } => {
            ensure!(handles(&[*context, *device]));
            allocation(*size, *alignment)
        }
        MemAllocHost { context, size, alignment } => {
            ensure!(handles(&[*context]));
            allocation(*size, *alignment)
        }
        MemFree { context, ptr } | MemFreeExt { context, ptr, .. } => {
            ensure!(handles(&[*context]));
            pointers(&[*ptr])
        }

        ContextDestroy { .. }
        | CommandQueueDestroy { .. }
        | CommandListDestroy { .. }
        | ModuleDestroy { .. }
        | KernelDestroy { .. }
        | EventPoolDestroy { .. }
        | EventDestroy { .. }
        | FenceDestroy { .. }
        | ImageDestroy { .. }
        | SamplerDestroy { .. } => handles(&[call.released_handle().unwrap_or(Handle::NULL)]),
    }
}

/// Secondary object handles of the appends that share a match arm above.
fn image_or_kernel_handles(call: &ApiCall) -> ZeResult {
    match call {
        ApiCall::CommandListAppendImageCopy { dst_image, src_image, .. }
        | ApiCall::CommandListAppendImageCopyRegion { dst_image, src_image, .. } => {
            handles(&[*dst_image, *src_image])
        }
        ApiCall::CommandListAppendLaunchKernelIndirect { kernel, arguments_buffer, .. } => {
            ensure!(handles(&[*kernel]));
            pointers(&[*arguments_buffer])
        }
        _ => ZeResult::Success,
    }
}
