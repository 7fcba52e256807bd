//! Frozen layer list plus the per-entry-point hook table.

use std::sync::Arc;

use tracing::trace;
use zel_core::{ApiCall, CallFrame, CallOutput, Driver, EntryPoint, HookSet, Layer, ZeResult};

/// Layers in registration order, and for every entry point the subset that
/// asked for a hook. Immutable once built, so dispatch takes no lock.
pub struct LayerRegistry {
    layers: Vec<Arc<dyn Layer>>,
    table: Vec<Vec<(usize, HookSet)>>,
}

impl LayerRegistry {
    pub fn new(layers: Vec<Arc<dyn Layer>>) -> Self {
        let table = EntryPoint::ALL
            .iter()
            .map(|&ep| {
                layers
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, layer)| {
                        let hooks = layer.hooks(ep);
                        (!hooks.is_empty()).then_some((idx, hooks))
                    })
                    .collect()
            })
            .collect();
        Self { layers, table }
    }

    pub fn layers(&self) -> &[Arc<dyn Layer>] {
        &self.layers
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Layers hooked on `entry_point`, with what they hook.
    pub fn hooks_for(&self, entry_point: EntryPoint) -> &[(usize, HookSet)] {
        &self.table[entry_point.index()]
    }

    /// Prologues in order, stopping at the first veto; then the driver; then
    /// every epilogue in order with the driver's result.
    pub fn dispatch(
        &self,
        driver: &dyn Driver,
        call: &ApiCall,
        output: &mut CallOutput,
    ) -> ZeResult {
        let hooked = self.hooks_for(call.entry_point());
        if hooked.is_empty() {
            return driver.call(call, output);
        }

        let mut frame = CallFrame::new(call);
        for &(idx, hooks) in hooked {
            if !hooks.contains(HookSet::PROLOGUE) {
                continue;
            }
            let result = self.layers[idx].prologue(frame.for_layer(idx));
            if !result.is_success() {
                trace!(
                    "call {} {} vetoed by {}: {}",
                    frame.id(),
                    frame.entry_point(),
                    self.layers[idx].name(),
                    result
                );
                return result;
            }
        }

        let result = driver.call(call, output);

        for &(idx, hooks) in hooked {
            if hooks.contains(HookSet::EPILOGUE) {
                self.layers[idx].epilogue(frame.for_layer(idx), output, result);
            }
        }
        result
    }
}
