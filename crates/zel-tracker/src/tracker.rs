//! Handle lifecycle bookkeeping.
//!
//! Lifetimes are keyed on the handle value, never the thread: a create and its
//! destroy routinely happen on different threads. All counters, records, leak
//! totals and the telemetry file share one lock so they move together.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use zel_core::config::TrackerConfig;
use zel_core::{EntryPoint, Handle, HandleCategory};

use crate::snapshot::{ResourceDelta, ResourceSnapshot};
use crate::telemetry::{pid_suffixed_path, RowData, TelemetrySink};

type Sampler = Box<dyn Fn() -> ResourceSnapshot + Send + Sync>;

/// What the tracker remembers about a live handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRecord {
    pub handle: Handle,
    /// Process snapshot taken right after the create returned.
    pub snapshot: ResourceSnapshot,
    /// Requested bytes; zero for everything but memory allocations.
    pub size: u64,
}

/// Copy of the tracker's counters at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerReport {
    pub live: [u64; HandleCategory::COUNT],
    pub usage: [ResourceSnapshot; HandleCategory::COUNT],
    pub leaks: [ResourceSnapshot; HandleCategory::COUNT],
    pub total_memory_bytes: u64,
    pub baseline: ResourceSnapshot,
}

impl TrackerReport {
    pub fn leak_total(&self) -> ResourceSnapshot {
        self.leaks
            .iter()
            .fold(ResourceSnapshot::default(), |acc, l| acc + *l)
    }

    pub fn has_leaks(&self) -> bool {
        self.leak_total().has_memory()
    }
}

struct TrackerState {
    live: [u64; HandleCategory::COUNT],
    records: HashMap<(HandleCategory, Handle), HandleRecord>,
    /// Floored create deltas accumulated per category.
    usage: [ResourceSnapshot; HandleCategory::COUNT],
    /// Memory growth observed across destroys, per category.
    leaks: [ResourceSnapshot; HandleCategory::COUNT],
    total_memory_bytes: u64,
    sink: Option<TelemetrySink>,
    torn_down: bool,
}

pub struct ResourceTracker {
    state: Mutex<TrackerState>,
    baseline: ResourceSnapshot,
    leak_threshold_kb: i64,
    sampler: Sampler,
}

impl ResourceTracker {
    /// Build a tracker reading real process figures. A configured telemetry
    /// path that cannot be opened leaves telemetry off; tracking continues.
    pub fn new(config: &TrackerConfig, pid: u32, start: Instant) -> Self {
        Self::with_sampler(config, pid, start, ResourceSnapshot::capture)
    }

    /// Same as [`ResourceTracker::new`] with a custom snapshot source.
    pub fn with_sampler<F>(config: &TrackerConfig, pid: u32, start: Instant, sampler: F) -> Self
    where
        F: Fn() -> ResourceSnapshot + Send + Sync + 'static,
    {
        let sink = config
            .csv_path
            .as_deref()
            .filter(|path| !path.to_string_lossy().trim().is_empty())
            .and_then(|path| open_sink(pid_suffixed_path(path, pid), start));
        let baseline = sampler();
        Self {
            state: Mutex::new(TrackerState {
                live: [0; HandleCategory::COUNT],
                records: HashMap::new(),
                usage: [ResourceSnapshot::default(); HandleCategory::COUNT],
                leaks: [ResourceSnapshot::default(); HandleCategory::COUNT],
                total_memory_bytes: 0,
                sink,
                torn_down: false,
            }),
            baseline,
            leak_threshold_kb: config.leak_threshold_kb,
            sampler: Box::new(sampler),
        }
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        (self.sampler)()
    }

    pub fn telemetry_path(&self) -> Option<PathBuf> {
        self.state.lock().sink.as_ref().map(|s| s.path().to_path_buf())
    }

    /// A create returned successfully with `handle`. `before` is the snapshot
    /// from the prologue; without it no delta is computed or written.
    pub fn on_create(
        &self,
        entry_point: EntryPoint,
        category: HandleCategory,
        handle: Handle,
        before: Option<ResourceSnapshot>,
        size: Option<usize>,
    ) {
        if handle.is_null() {
            return;
        }
        let mut st = self.state.lock();
        let current = self.snapshot();
        let size = size.unwrap_or(0) as u64;

        st.live[category.index()] += 1;
        if category == HandleCategory::MemoryAllocation {
            st.total_memory_bytes = st.total_memory_bytes.saturating_add(size);
        }
        let replaced = st.records.insert(
            (category, handle),
            HandleRecord {
                handle,
                snapshot: current,
                size,
            },
        );
        if let Some(stale) = replaced {
            // Driver reused a handle we never saw destroyed.
            warn!(
                "{}: handle {} was already live, dropping its old record",
                entry_point, handle
            );
            if category == HandleCategory::MemoryAllocation {
                st.total_memory_bytes = st.total_memory_bytes.saturating_sub(stale.size);
            }
            st.live[category.index()] = st.live[category.index()].saturating_sub(1);
        }

        if let Some(before) = before {
            let delta = current.signed_delta(&before);
            st.usage[category.index()] += delta.floored();
            write_row(&mut st, entry_point.name(), &current, &delta);

            if category == HandleCategory::MemoryAllocation {
                debug!(
                    "{}: {} bytes at {}, delta VmRSS={}KB VmSize={}KB",
                    entry_point, size, handle, delta.vm_rss, delta.vm_size
                );
            } else {
                debug!(
                    "{}: {}, delta VmRSS={}KB VmSize={}KB VmData={}KB Threads={}",
                    entry_point, handle, delta.vm_rss, delta.vm_size, delta.vm_data, delta.threads
                );
            }
            if delta.vm_rss > self.leak_threshold_kb {
                warn!(
                    "{}: possible leak, VmRSS grew {}KB across a single create",
                    entry_point, delta.vm_rss
                );
            }
        }
        log_summary(&st, &current);
    }

    /// A destroy returned successfully for `handle`.
    pub fn on_destroy(&self, entry_point: EntryPoint, category: HandleCategory, handle: Handle) {
        let mut st = self.state.lock();
        let current = self.snapshot();
        let idx = category.index();
        st.live[idx] = st.live[idx].saturating_sub(1);

        let Some(record) = st.records.remove(&(category, handle)) else {
            debug!("{}: {} was not tracked", entry_point, handle);
            write_row(&mut st, entry_point.name(), &current, &ResourceDelta::default());
            log_summary(&st, &current);
            return;
        };
        if category == HandleCategory::MemoryAllocation {
            st.total_memory_bytes = st.total_memory_bytes.saturating_sub(record.size);
        }

        let delta = current.signed_delta(&record.snapshot);
        write_row(&mut st, entry_point.name(), &current, &delta);
        if delta.vm_rss >= 0 || delta.vm_size >= 0 {
            st.leaks[idx] += delta.memory_floored();
            if delta.vm_rss > 0 || delta.vm_size > 0 {
                warn!(
                    "{}: {} released but VmRSS {:+}KB, VmSize {:+}KB since its create",
                    entry_point, handle, delta.vm_rss, delta.vm_size
                );
            }
        }
        debug!(
            "{}: {}, delta since create VmRSS={}KB VmSize={}KB",
            entry_point, handle, delta.vm_rss, delta.vm_size
        );
        log_summary(&st, &current);
    }

    /// A command-list append returned successfully.
    pub fn on_append(
        &self,
        entry_point: EntryPoint,
        before: Option<ResourceSnapshot>,
        detail: &str,
    ) {
        let Some(before) = before else {
            return;
        };
        let mut st = self.state.lock();
        let current = self.snapshot();
        let delta = current.signed_delta(&before);
        write_row(&mut st, entry_point.name(), &current, &delta);
        debug!(
            "{}: {}, delta VmRSS={}KB VmSize={}KB",
            entry_point, detail, delta.vm_rss, delta.vm_size
        );
    }

    pub fn live_count(&self, category: HandleCategory) -> u64 {
        self.state.lock().live[category.index()]
    }

    pub fn total_memory_bytes(&self) -> u64 {
        self.state.lock().total_memory_bytes
    }

    /// Handles currently remembered across all categories.
    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn record(&self, category: HandleCategory, handle: Handle) -> Option<HandleRecord> {
        self.state.lock().records.get(&(category, handle)).copied()
    }

    pub fn report(&self) -> TrackerReport {
        let st = self.state.lock();
        TrackerReport {
            live: st.live,
            usage: st.usage,
            leaks: st.leaks,
            total_memory_bytes: st.total_memory_bytes,
            baseline: self.baseline,
        }
    }

    /// Log the final report and close telemetry. Runs once.
    pub fn teardown(&self) -> TrackerReport {
        let mut st = self.state.lock();
        let report = TrackerReport {
            live: st.live,
            usage: st.usage,
            leaks: st.leaks,
            total_memory_bytes: st.total_memory_bytes,
            baseline: self.baseline,
        };
        if st.torn_down {
            return report;
        }
        st.torn_down = true;

        let total = report.leak_total();
        if report.has_leaks() {
            for cat in HandleCategory::ALL {
                let l = report.leaks[cat.index()];
                if l.has_memory() {
                    warn!(
                        "leak total {}: VmRSS={}KB VmSize={}KB VmData={}KB",
                        cat, l.vm_rss, l.vm_size, l.vm_data
                    );
                }
            }
            warn!(
                "leak total (all categories): VmRSS={}KB VmSize={}KB VmData={}KB",
                total.vm_rss, total.vm_size, total.vm_data
            );
        } else {
            info!("system resource tracker: no leaks detected");
        }

        let mut outstanding: Vec<(HandleCategory, u64)> = Vec::new();
        for record in st.records.keys() {
            match outstanding.iter_mut().find(|(c, _)| *c == record.0) {
                Some((_, n)) => *n += 1,
                None => outstanding.push((record.0, 1)),
            }
        }
        outstanding.sort();
        for (cat, n) in outstanding {
            warn!("{} outstanding handle(s) in {} at teardown", n, cat);
        }
        if report.total_memory_bytes > 0 {
            warn!(
                "{} bytes of memory allocations outstanding at teardown",
                report.total_memory_bytes
            );
        }

        if let Some(mut sink) = st.sink.take() {
            match sink.close() {
                Ok(()) => info!(
                    "system resource tracker telemetry closed: {} ({} rows)",
                    sink.path().display(),
                    sink.rows_written()
                ),
                Err(e) => error!("closing telemetry {}: {}", sink.path().display(), e),
            }
        }
        report
    }
}

fn open_sink(path: PathBuf, start: Instant) -> Option<TelemetrySink> {
    match TelemetrySink::create(path, start) {
        Ok(sink) => {
            info!(
                "system resource tracker telemetry enabled: {}",
                sink.path().display()
            );
            Some(sink)
        }
        Err(e) => {
            error!("system resource tracker telemetry disabled: {}", e);
            None
        }
    }
}

/// Failures switch telemetry off for the rest of the process.
fn write_row(
    st: &mut TrackerState,
    api_call: &str,
    current: &ResourceSnapshot,
    delta: &ResourceDelta,
) {
    let live = st.live;
    let total = st.total_memory_bytes;
    let Some(sink) = st.sink.as_mut() else {
        return;
    };
    let row = RowData {
        api_call,
        current,
        delta,
        live_counts: &live,
        total_memory_bytes: total,
    };
    if let Err(e) = sink.write_row(row) {
        error!(
            "telemetry write to {} failed, disabling: {}",
            sink.path().display(),
            e
        );
        st.sink = None;
    }
}

fn log_summary(st: &TrackerState, current: &ResourceSnapshot) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let mut msg = format!(
        "system use after call: VmRSS={}KB VmSize={}KB VmData={}KB Threads={}",
        current.vm_rss, current.vm_size, current.vm_data, current.threads
    );
    for cat in HandleCategory::ALL {
        let n = st.live[cat.index()];
        if n == 0 {
            continue;
        }
        let u = st.usage[cat.index()];
        if cat == HandleCategory::MemoryAllocation {
            let _ = write!(
                msg,
                "\n  {} ({} bytes / {} KB): VmRSS={}KB VmSize={}KB",
                cat,
                st.total_memory_bytes,
                st.total_memory_bytes / 1024,
                u.vm_rss,
                u.vm_size
            );
        } else {
            let _ = write!(
                msg,
                "\n  {} ({}): VmRSS={}KB VmSize={}KB",
                cat, n, u.vm_rss, u.vm_size
            );
        }
    }
    debug!("{}", msg);
}
