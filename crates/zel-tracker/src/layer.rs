use zel_core::{
    ApiCall, CallFrame, CallKind, CallOutput, EntryPoint, HookSet, Layer, LayerContext, ZeResult,
};

use crate::snapshot::ResourceSnapshot;
use crate::tracker::{ResourceTracker, TrackerReport};

pub const LAYER_NAME: &str = "system_resource_tracker";

/// Pre-call snapshot carried from prologue to epilogue.
struct PreCall(ResourceSnapshot);

/// Hooks creates, destroys and appends; ignores everything else.
pub struct SystemResourceTrackerLayer {
    tracker: ResourceTracker,
}

impl SystemResourceTrackerLayer {
    pub fn new(ctx: &LayerContext) -> Self {
        Self {
            tracker: ResourceTracker::new(&ctx.config.tracker, ctx.pid, ctx.started),
        }
    }

    pub fn from_tracker(tracker: ResourceTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn report(&self) -> TrackerReport {
        self.tracker.report()
    }
}

impl Layer for SystemResourceTrackerLayer {
    fn name(&self) -> &str {
        LAYER_NAME
    }

    fn hooks(&self, entry_point: EntryPoint) -> HookSet {
        match entry_point.kind() {
            CallKind::Create(_) | CallKind::Append => HookSet::BOTH,
            CallKind::Destroy(_) => HookSet::EPILOGUE,
            CallKind::Other => HookSet::empty(),
        }
    }

    fn prologue(&self, frame: &mut CallFrame<'_>) -> ZeResult {
        frame.stash(PreCall(self.tracker.snapshot()));
        ZeResult::Success
    }

    fn epilogue(&self, frame: &mut CallFrame<'_>, output: &CallOutput, result: ZeResult) {
        let before = frame.take::<PreCall>().map(|p| p.0);
        if !result.is_success() {
            return;
        }
        let entry_point = frame.entry_point();
        match entry_point.kind() {
            CallKind::Create(category) => self.tracker.on_create(
                entry_point,
                category,
                output.handle,
                before,
                frame.call().requested_size(),
            ),
            CallKind::Destroy(category) => {
                if let Some(handle) = frame.call().released_handle() {
                    self.tracker.on_destroy(entry_point, category, handle);
                }
            }
            CallKind::Append => {
                self.tracker
                    .on_append(entry_point, before, &append_detail(frame.call()))
            }
            CallKind::Other => {}
        }
    }

    fn teardown(&self) {
        self.tracker.teardown();
    }
}

/// The argument worth logging for an append.
fn append_detail(call: &ApiCall) -> String {
    match call {
        ApiCall::CommandListAppendMemoryCopy { size, .. }
        | ApiCall::CommandListAppendMemoryCopyFromContext { size, .. }
        | ApiCall::CommandListAppendMemoryFill { size, .. }
        | ApiCall::CommandListAppendMemoryPrefetch { size, .. }
        | ApiCall::CommandListAppendMemAdvise { size, .. } => format!("size={}", size),
        ApiCall::CommandListAppendLaunchKernel { group_count, .. }
        | ApiCall::CommandListAppendLaunchCooperativeKernel { group_count, .. } => format!(
            "groups=({}, {}, {})",
            group_count.x, group_count.y, group_count.z
        ),
        ApiCall::CommandListAppendWaitOnEvents { events, .. }
        | ApiCall::CommandListAppendQueryKernelTimestamps { events, .. } => {
            format!("events={}", events.count)
        }
        ApiCall::CommandListAppendMemoryRangesBarrier { range_sizes, .. } => {
            format!("ranges={}", range_sizes.len())
        }
        ApiCall::CommandListAppendBarrier { wait, .. } => format!("waits={}", wait.count),
        other => other.entry_point().name().to_string(),
    }
}
