//! Offline digest of a telemetry file.

use std::collections::HashMap;

use zel_core::HandleCategory;

use crate::telemetry::{TelemetryRecord, COUNTED_CATEGORIES};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TelemetrySummary {
    pub rows: usize,
    pub first_ms: u64,
    pub last_ms: u64,
    pub peak_vm_rss: u64,
    pub peak_vm_size: u64,
    pub peak_total_memory_bytes: u64,
    /// Highest live count seen per counted category, in column order.
    pub peak_live: Vec<(HandleCategory, u64)>,
    /// Entry points by summed positive RSS delta, largest first.
    pub rss_growth_by_call: Vec<(String, i64)>,
}

impl TelemetrySummary {
    pub fn from_records(records: &[TelemetryRecord]) -> Self {
        let mut peak_live = [0u64; COUNTED_CATEGORIES];
        let mut growth: HashMap<&str, i64> = HashMap::new();
        let mut s = TelemetrySummary {
            rows: records.len(),
            first_ms: records.first().map_or(0, |r| r.time_ms),
            last_ms: records.last().map_or(0, |r| r.time_ms),
            ..Default::default()
        };

        for r in records {
            s.peak_vm_rss = s.peak_vm_rss.max(r.current.vm_rss);
            s.peak_vm_size = s.peak_vm_size.max(r.current.vm_size);
            s.peak_total_memory_bytes = s.peak_total_memory_bytes.max(r.total_memory_bytes);
            for (peak, live) in peak_live.iter_mut().zip(r.live_counts) {
                *peak = (*peak).max(live);
            }
            if r.delta_vm_rss > 0 {
                *growth.entry(r.api_call.as_str()).or_default() += r.delta_vm_rss;
            }
        }

        s.peak_live = HandleCategory::ALL[..COUNTED_CATEGORIES]
            .iter()
            .copied()
            .zip(peak_live)
            .collect();
        let mut growth: Vec<(String, i64)> =
            growth.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        growth.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        s.rss_growth_by_call = growth;
        s
    }

    pub fn duration_ms(&self) -> u64 {
        self.last_ms.saturating_sub(self.first_ms)
    }
}
