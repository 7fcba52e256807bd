//! Resource tracker bookkeeping against a scripted snapshot source.
//!
//! Run with: cargo test -p zel-tracker --test tracker_test -- --nocapture

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use zel_core::config::TrackerConfig;
use zel_core::{EntryPoint, Handle, HandleCategory};
use zel_tracker::telemetry::{self, pid_suffixed_path, HEADER};
use zel_tracker::{ResourceSnapshot, ResourceTracker};

/// Snapshot source whose RSS the test moves by hand.
fn scripted(rss: Arc<AtomicU64>) -> impl Fn() -> ResourceSnapshot + Send + Sync + 'static {
    move || {
        let kb = rss.load(Ordering::SeqCst);
        ResourceSnapshot {
            vm_size: kb * 2,
            vm_rss: kb,
            vm_data: kb / 2,
            vm_peak: kb * 2,
            threads: 1,
            fds: 1024,
        }
    }
}

fn tracker_with(csv: Option<PathBuf>, rss: Arc<AtomicU64>) -> ResourceTracker {
    let config = TrackerConfig {
        csv_path: csv,
        leak_threshold_kb: 1024,
    };
    ResourceTracker::with_sampler(&config, 4242, Instant::now(), scripted(rss))
}

#[test]
fn parse_status_picks_tracked_fields() {
    let status = "Name:\tzel\nVmPeak:\t  20480 kB\nVmSize:\t  18432 kB\nVmRSS:\t    4096 kB\n\
                  VmData:\t    2048 kB\nThreads:\t7\nVmSwap:\t0 kB\nbogus line\n";
    let s = ResourceSnapshot::parse_status(status);
    assert_eq!(s.vm_peak, 20480);
    assert_eq!(s.vm_size, 18432);
    assert_eq!(s.vm_rss, 4096);
    assert_eq!(s.vm_data, 2048);
    assert_eq!(s.threads, 7);
    assert_eq!(s.fds, 0);
}

#[test]
fn snapshot_subtraction_floors_at_zero() {
    let a = ResourceSnapshot {
        vm_rss: 100,
        vm_size: 50,
        ..Default::default()
    };
    let b = ResourceSnapshot {
        vm_rss: 40,
        vm_size: 80,
        ..Default::default()
    };
    let d = a - b;
    assert_eq!(d.vm_rss, 60);
    assert_eq!(d.vm_size, 0);

    let signed = a.signed_delta(&b);
    assert_eq!(signed.vm_rss, 60);
    assert_eq!(signed.vm_size, -30);
    assert_eq!(signed.floored().vm_size, 0);
}

#[cfg(target_os = "linux")]
#[test]
fn capture_reads_this_process() {
    let s = ResourceSnapshot::capture();
    assert!(s.vm_rss > 0);
    assert!(s.threads >= 1);
    assert!(s.fds > 0);
}

#[test]
fn pid_suffix_goes_before_the_extension() {
    assert_eq!(
        pid_suffixed_path(Path::new("/tmp/out/trace.csv"), 77),
        PathBuf::from("/tmp/out/trace_pid77.csv")
    );
    assert_eq!(
        pid_suffixed_path(Path::new("trace"), 77),
        PathBuf::from("trace_pid77")
    );
    // a dot in a directory name is not an extension
    assert_eq!(
        pid_suffixed_path(Path::new("/tmp/v1.2/trace"), 5),
        PathBuf::from("/tmp/v1.2/trace_pid5")
    );
}

#[test]
fn create_then_destroy_is_net_zero() {
    let rss = Arc::new(AtomicU64::new(10_000));
    let tracker = tracker_with(None, rss.clone());
    let h = Handle::from_raw(0x1000);

    let before = tracker.snapshot();
    tracker.on_create(EntryPoint::ContextCreate, HandleCategory::Context, h, Some(before), None);
    assert_eq!(tracker.live_count(HandleCategory::Context), 1);
    assert!(tracker.record(HandleCategory::Context, h).is_some());

    tracker.on_destroy(EntryPoint::ContextDestroy, HandleCategory::Context, h);
    assert_eq!(tracker.live_count(HandleCategory::Context), 0);
    assert!(tracker.record(HandleCategory::Context, h).is_none());
    assert!(!tracker.report().has_leaks());
}

#[test]
fn null_handle_from_create_is_not_recorded() {
    let tracker = tracker_with(None, Arc::new(AtomicU64::new(1)));
    tracker.on_create(
        EntryPoint::EventCreate,
        HandleCategory::Event,
        Handle::NULL,
        Some(tracker.snapshot()),
        None,
    );
    assert_eq!(tracker.live_count(HandleCategory::Event), 0);
}

#[test]
fn destroy_of_unknown_handle_does_not_underflow() {
    let tracker = tracker_with(None, Arc::new(AtomicU64::new(1)));
    tracker.on_destroy(EntryPoint::FenceDestroy, HandleCategory::Fence, Handle::from_raw(0xdead));
    assert_eq!(tracker.live_count(HandleCategory::Fence), 0);
    assert!(!tracker.report().has_leaks());
}

#[test]
fn memory_bytes_follow_alloc_and_free() {
    let tracker = tracker_with(None, Arc::new(AtomicU64::new(1)));
    let ptr = Handle::from_raw(0x7000_0000);
    tracker.on_create(
        EntryPoint::MemAllocDevice,
        HandleCategory::MemoryAllocation,
        ptr,
        Some(tracker.snapshot()),
        Some(4096),
    );
    assert_eq!(tracker.total_memory_bytes(), 4096);
    assert_eq!(tracker.record(HandleCategory::MemoryAllocation, ptr).map(|r| r.size), Some(4096));

    tracker.on_destroy(EntryPoint::MemFree, HandleCategory::MemoryAllocation, ptr);
    assert_eq!(tracker.total_memory_bytes(), 0);

    // freeing again stays at zero
    tracker.on_destroy(EntryPoint::MemFree, HandleCategory::MemoryAllocation, ptr);
    assert_eq!(tracker.total_memory_bytes(), 0);
}

#[test]
fn growth_across_destroy_is_attributed_to_the_category() {
    let rss = Arc::new(AtomicU64::new(10_000));
    let tracker = tracker_with(None, rss.clone());
    let module = Handle::from_raw(0x2000);

    tracker.on_create(
        EntryPoint::ModuleCreate,
        HandleCategory::Module,
        module,
        Some(tracker.snapshot()),
        None,
    );
    rss.store(10_300, Ordering::SeqCst);
    tracker.on_destroy(EntryPoint::ModuleDestroy, HandleCategory::Module, module);

    let report = tracker.report();
    assert!(report.has_leaks());
    assert_eq!(report.leaks[HandleCategory::Module.index()].vm_rss, 300);
    assert_eq!(report.leak_total().vm_rss, 300);
    assert_eq!(report.leaks[HandleCategory::Kernel.index()], ResourceSnapshot::default());
}

#[test]
fn shrink_across_destroy_is_not_a_leak() {
    let rss = Arc::new(AtomicU64::new(10_000));
    let tracker = tracker_with(None, rss.clone());
    let img = Handle::from_raw(0x3000);

    tracker.on_create(
        EntryPoint::ImageCreate,
        HandleCategory::Image,
        img,
        Some(tracker.snapshot()),
        None,
    );
    rss.store(9_000, Ordering::SeqCst);
    tracker.on_destroy(EntryPoint::ImageDestroy, HandleCategory::Image, img);
    assert!(!tracker.report().has_leaks());
}

#[test]
fn create_usage_accumulates_per_category() {
    let rss = Arc::new(AtomicU64::new(10_000));
    let tracker = tracker_with(None, rss.clone());

    let before = tracker.snapshot();
    rss.store(12_048, Ordering::SeqCst);
    tracker.on_create(
        EntryPoint::KernelCreate,
        HandleCategory::Kernel,
        Handle::from_raw(0x44),
        Some(before),
        None,
    );
    assert_eq!(tracker.report().usage[HandleCategory::Kernel.index()].vm_rss, 2048);
}

#[test]
fn create_without_a_presnapshot_still_counts() {
    let tracker = tracker_with(None, Arc::new(AtomicU64::new(1)));
    tracker.on_create(
        EntryPoint::SamplerCreate,
        HandleCategory::Sampler,
        Handle::from_raw(0x55),
        None,
        None,
    );
    assert_eq!(tracker.live_count(HandleCategory::Sampler), 1);
    assert_eq!(
        tracker.report().usage[HandleCategory::Sampler.index()],
        ResourceSnapshot::default()
    );
}

#[test]
fn telemetry_file_gets_header_and_one_row_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("trace.csv");
    let tracker = tracker_with(Some(csv.clone()), Arc::new(AtomicU64::new(5_000)));
    let expected = dir.path().join("trace_pid4242.csv");
    assert_eq!(tracker.telemetry_path(), Some(expected.clone()));

    let ctx = Handle::from_raw(0x10);
    let ptr = Handle::from_raw(0x20);
    tracker.on_create(
        EntryPoint::ContextCreate,
        HandleCategory::Context,
        ctx,
        Some(tracker.snapshot()),
        None,
    );
    tracker.on_create(
        EntryPoint::MemAllocHost,
        HandleCategory::MemoryAllocation,
        ptr,
        Some(tracker.snapshot()),
        Some(4096),
    );
    tracker.on_append(EntryPoint::CommandListAppendBarrier, Some(tracker.snapshot()), "waits=0");
    tracker.on_destroy(EntryPoint::MemFree, HandleCategory::MemoryAllocation, ptr);
    tracker.on_destroy(EntryPoint::ContextDestroy, HandleCategory::Context, ctx);
    tracker.teardown();

    let text = std::fs::read_to_string(&expected).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.len(), 1 + 5);
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), 22);
    }

    let rows = telemetry::read_telemetry(&expected).unwrap();
    let numbers: Vec<u64> = rows.iter().map(|r| r.call_number).collect();
    assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
    assert_eq!(rows[0].api_call, "zeContextCreate");
    assert_eq!(rows[0].live_counts[HandleCategory::Context.index()], 1);
    assert_eq!(rows[1].total_memory_bytes, 4096);
    assert_eq!(rows[2].api_call, "zeCommandListAppendBarrier");
    assert_eq!(rows[3].total_memory_bytes, 0);
    assert_eq!(rows[4].live_counts[HandleCategory::Context.index()], 0);
    assert_eq!(rows[4].current.vm_rss, 5_000);
}

#[test]
fn unwritable_telemetry_path_disables_only_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("no/such/dir/trace.csv");
    let tracker = tracker_with(Some(csv), Arc::new(AtomicU64::new(1)));
    assert_eq!(tracker.telemetry_path(), None);

    tracker.on_create(
        EntryPoint::FenceCreate,
        HandleCategory::Fence,
        Handle::from_raw(0x1),
        Some(tracker.snapshot()),
        None,
    );
    assert_eq!(tracker.live_count(HandleCategory::Fence), 1);
}

#[test]
fn teardown_reports_outstanding_state_and_is_idempotent() {
    let tracker = tracker_with(None, Arc::new(AtomicU64::new(1)));
    tracker.on_create(
        EntryPoint::EventPoolCreate,
        HandleCategory::EventPool,
        Handle::from_raw(0x90),
        Some(tracker.snapshot()),
        None,
    );
    let first = tracker.teardown();
    assert_eq!(first.live[HandleCategory::EventPool.index()], 1);
    let second = tracker.teardown();
    assert_eq!(first, second);
}

#[test]
fn concurrent_create_destroy_balances() {
    let tracker = Arc::new(tracker_with(None, Arc::new(AtomicU64::new(1))));
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let tracker = tracker.clone();
            std::thread::spawn(move || {
                for i in 0..500usize {
                    let h = Handle::from_raw((t + 1) << 32 | (i + 1));
                    tracker.on_create(
                        EntryPoint::CommandListCreate,
                        HandleCategory::CommandList,
                        h,
                        Some(tracker.snapshot()),
                        None,
                    );
                    tracker.on_destroy(
                        EntryPoint::CommandListDestroy,
                        HandleCategory::CommandList,
                        h,
                    );
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(tracker.live_count(HandleCategory::CommandList), 0);
    assert_eq!(tracker.record_count(), 0);
    assert!(!tracker.report().has_leaks());
}

#[test]
fn peak_and_thread_growth_across_destroy_is_not_a_leak() {
    let now = Arc::new(parking_lot::Mutex::new(ResourceSnapshot {
        vm_size: 100,
        vm_rss: 100,
        vm_data: 50,
        vm_peak: 100,
        threads: 1,
        fds: 1024,
    }));
    let source = now.clone();
    let tracker = ResourceTracker::with_sampler(
        &TrackerConfig::default(),
        4242,
        Instant::now(),
        move || *source.lock(),
    );
    let ctx = Handle::from_raw(0x10);
    tracker.on_create(
        EntryPoint::ContextCreate,
        HandleCategory::Context,
        ctx,
        Some(tracker.snapshot()),
        None,
    );

    // RSS shrinks, VmSize flat, peak and threads grow
    {
        let mut s = now.lock();
        s.vm_rss = 40;
        s.vm_peak = 180;
        s.threads = 6;
    }
    tracker.on_destroy(EntryPoint::ContextDestroy, HandleCategory::Context, ctx);

    let report = tracker.teardown();
    assert_eq!(report.leaks[HandleCategory::Context.index()], ResourceSnapshot::default());
    assert!(!report.has_leaks());
}

#[test]
fn empty_csv_path_leaves_telemetry_off() {
    for path in ["", "   "] {
        let config = TrackerConfig {
            csv_path: Some(PathBuf::from(path)),
            leak_threshold_kb: 1024,
        };
        let tracker = ResourceTracker::new(&config, 77, Instant::now());
        assert_eq!(tracker.telemetry_path(), None, "csv_path {:?}", path);
    }
}

fn row(
    n: u64,
    call: &str,
    rss: u64,
    delta_rss: i64,
    contexts: u64,
    bytes: u64,
) -> telemetry::TelemetryRecord {
    let mut live_counts = [0u64; telemetry::COUNTED_CATEGORIES];
    live_counts[HandleCategory::Context.index()] = contexts;
    telemetry::TelemetryRecord {
        call_number: n,
        time_ms: 10 * n + 3,
        api_call: call.to_string(),
        current: ResourceSnapshot {
            vm_size: rss * 2,
            vm_rss: rss,
            ..Default::default()
        },
        delta_vm_size: 0,
        delta_vm_rss: delta_rss,
        delta_vm_data: 0,
        live_counts,
        total_memory_bytes: bytes,
    }
}

#[test]
fn summary_tracks_peaks_and_rss_growth() {
    let rows = vec![
        row(0, "zeContextCreate", 1_000, 200, 1, 0),
        row(1, "zeMemAllocHost", 1_400, 400, 1, 8192),
        row(2, "zeContextCreate", 1_500, 100, 2, 8192),
        row(3, "zeMemFree", 1_100, -400, 2, 0),
        row(4, "zeContextDestroy", 1_050, -50, 1, 0),
    ];
    let s = zel_tracker::TelemetrySummary::from_records(&rows);
    assert_eq!(s.rows, 5);
    assert_eq!(s.duration_ms(), 40);
    assert_eq!(s.peak_vm_rss, 1_500);
    assert_eq!(s.peak_vm_size, 3_000);
    assert_eq!(s.peak_total_memory_bytes, 8192);
    assert_eq!(s.peak_live[0], (HandleCategory::Context, 2));
    assert_eq!(
        s.rss_growth_by_call,
        vec![
            ("zeMemAllocHost".to_string(), 400),
            ("zeContextCreate".to_string(), 300),
        ]
    );
}

#[test]
fn summary_of_nothing_is_empty() {
    let s = zel_tracker::TelemetrySummary::from_records(&[]);
    assert_eq!(s.rows, 0);
    assert_eq!(s.duration_ms(), 0);
    assert!(s.rss_growth_by_call.is_empty());
    assert!(s.peak_live.iter().all(|(_, n)| *n == 0));
}
