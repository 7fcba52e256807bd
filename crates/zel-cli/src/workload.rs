use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail};
use tracing::{debug, info};
use zel_core::call::{CommandQueueDesc, GroupCount, ImageDesc, WaitList};
use zel_core::config::{LoaderConfig, TrackerConfig};
use zel_core::{ApiCall, CallOutput, Handle, HandleCategory};
use zel_loader::{Loader, NullDriver};
use zel_tracker::{ResourceTracker, SystemResourceTrackerLayer, TrackerReport};

const DRIVER: Handle = Handle::from_raw(0x1);
const DEVICE: Handle = Handle::from_raw(0x2);

// ── Workload options ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WorkloadOptions {
    pub threads: usize,
    pub cycles: usize,
    pub csv: Option<PathBuf>,
    /// Skip the allocation and kernel release every k-th cycle; 0 never leaks.
    pub leak_every: usize,
    pub alloc_bytes: usize,
    pub validate: bool,
}

pub struct WorkloadOutcome {
    pub calls: u64,
    pub elapsed_ms: u128,
    pub telemetry: Option<PathBuf>,
    pub report: TrackerReport,
}

// ── Main entry point ────────────────────────────────────────────────────────

pub fn run_workload(opts: &WorkloadOptions) -> anyhow::Result<WorkloadOutcome> {
    if opts.threads == 0 {
        bail!("--threads must be at least 1");
    }

    let mut config = LoaderConfig::from_env();
    config.layers.parameter_validation |= opts.validate;
    config.layers.basic_leak_checker |= opts.validate;
    // the tracker is registered by hand below so its report stays reachable
    config.layers.system_resource_tracker = false;

    let driver = Arc::new(NullDriver::new().with_backed_allocations());
    let loader = Arc::new(Loader::with_driver(config, driver));

    let tracker_config = TrackerConfig {
        csv_path: opts.csv.clone().or_else(|| loader.config().tracker.csv_path.clone()),
        ..loader.config().tracker.clone()
    };
    let ctx = loader.context();
    let tracker = ResourceTracker::new(&tracker_config, ctx.pid, ctx.started);
    let layer = Arc::new(SystemResourceTrackerLayer::from_tracker(tracker));
    loader.register_layer(layer.clone())?;
    loader.initialize();

    info!(
        "workload: {} threads x {} cycles, layers {:?}",
        opts.threads,
        opts.cycles,
        loader.initialize().layer_names()
    );

    let started = Instant::now();
    let workers: Vec<_> = (0..opts.threads)
        .map(|t| {
            let loader = loader.clone();
            let opts = opts.clone();
            std::thread::Builder::new()
                .name(format!("zel-worker-{t}"))
                .spawn(move || -> anyhow::Result<u64> {
                    let mut session = Session::new(&loader);
                    for cycle in 0..opts.cycles {
                        let leak = opts.leak_every > 0 && (cycle + 1) % opts.leak_every == 0;
                        session.cycle(opts.alloc_bytes, leak)?;
                    }
                    debug!("worker {t} done after {} calls", session.calls);
                    Ok(session.calls)
                })
        })
        .collect::<Result<_, _>>()?;

    let mut calls = 0;
    for w in workers {
        calls += w.join().map_err(|_| anyhow!("worker thread panicked"))??;
    }
    let elapsed_ms = started.elapsed().as_millis();

    let telemetry = layer.tracker().telemetry_path();
    loader.teardown();

    Ok(WorkloadOutcome {
        calls,
        elapsed_ms,
        telemetry,
        report: layer.report(),
    })
}

// ── One worker's call sequence ─────────────────────────────────────────────

struct Session<'a> {
    loader: &'a Loader,
    calls: u64,
}

impl<'a> Session<'a> {
    fn new(loader: &'a Loader) -> Self {
        Self { loader, calls: 0 }
    }

    fn create(&mut self, call: ApiCall) -> anyhow::Result<Handle> {
        self.calls += 1;
        self.loader
            .create(&call)
            .map_err(|r| anyhow!("{} failed: {}", call.entry_point(), r))
    }

    fn call(&mut self, call: ApiCall) -> anyhow::Result<()> {
        self.calls += 1;
        let mut out = CallOutput::default();
        let r = self.loader.dispatch(&call, &mut out);
        if !r.is_success() {
            bail!("{} failed: {}", call.entry_point(), r);
        }
        Ok(())
    }

    /// Build every tracked object kind, record and submit work, then release
    /// in reverse order.
    fn cycle(&mut self, alloc_bytes: usize, leak: bool) -> anyhow::Result<()> {
        let context = self.create(ApiCall::ContextCreate {
            driver: DRIVER,
            flags: 0,
        })?;
        let command_queue = self.create(ApiCall::CommandQueueCreate {
            context,
            device: DEVICE,
            desc: CommandQueueDesc::default(),
        })?;
        let command_list = self.create(ApiCall::CommandListCreate {
            context,
            device: DEVICE,
            ordinal: 0,
            flags: 0,
        })?;
        let module = self.create(ApiCall::ModuleCreate {
            context,
            device: DEVICE,
            format: 0,
            input_size: 1024,
        })?;
        let kernel = self.create(ApiCall::KernelCreate {
            module,
            name: "workload".into(),
        })?;
        let event_pool = self.create(ApiCall::EventPoolCreate {
            context,
            flags: 0,
            count: 1,
            devices: vec![DEVICE],
        })?;
        let event = self.create(ApiCall::EventCreate {
            event_pool,
            index: 0,
        })?;
        let fence = self.create(ApiCall::FenceCreate {
            command_queue,
            flags: 0,
        })?;
        let image = self.create(ApiCall::ImageCreate {
            context,
            device: DEVICE,
            desc: ImageDesc {
                width: 64,
                height: 64,
                depth: 1,
            },
        })?;
        let sampler = self.create(ApiCall::SamplerCreate {
            context,
            device: DEVICE,
            address_mode: 0,
            filter_mode: 0,
            normalized: true,
        })?;
        let ptr = self.create(ApiCall::MemAllocDevice {
            context,
            size: alloc_bytes,
            alignment: 64,
            device: DEVICE,
        })?;

        self.call(ApiCall::CommandListAppendMemoryFill {
            command_list,
            ptr,
            pattern_size: 4,
            size: alloc_bytes,
            signal_event: Handle::NULL,
            wait: WaitList::empty(),
        })?;
        self.call(ApiCall::CommandListAppendLaunchKernel {
            command_list,
            kernel,
            group_count: GroupCount { x: 8, y: 1, z: 1 },
            signal_event: event,
            wait: WaitList::empty(),
        })?;
        self.call(ApiCall::CommandListAppendBarrier {
            command_list,
            signal_event: Handle::NULL,
            wait: WaitList::new(vec![event]),
        })?;
        self.call(ApiCall::CommandListClose { command_list })?;
        self.call(ApiCall::CommandQueueExecuteCommandLists {
            command_queue,
            command_lists: vec![command_list],
            fence,
        })?;
        self.call(ApiCall::CommandQueueSynchronize {
            command_queue,
            timeout: u64::MAX,
        })?;

        if !leak {
            self.call(ApiCall::MemFree { context, ptr })?;
        }
        self.call(ApiCall::SamplerDestroy { sampler })?;
        self.call(ApiCall::ImageDestroy { image })?;
        self.call(ApiCall::FenceDestroy { fence })?;
        self.call(ApiCall::EventDestroy { event })?;
        self.call(ApiCall::EventPoolDestroy { event_pool })?;
        if !leak {
            self.call(ApiCall::KernelDestroy { kernel })?;
        }
        self.call(ApiCall::ModuleDestroy { module })?;
        self.call(ApiCall::CommandListDestroy { command_list })?;
        self.call(ApiCall::CommandQueueDestroy { command_queue })?;
        self.call(ApiCall::ContextDestroy { context })?;
        Ok(())
    }
}

// ── Report printing ─────────────────────────────────────────────────────────

pub fn print_outcome(outcome: &WorkloadOutcome) {
    let report = &outcome.report;
    println!(
        "Dispatched {} calls in {} ms",
        outcome.calls, outcome.elapsed_ms
    );
    if let Some(path) = &outcome.telemetry {
        println!("Telemetry:  {}", path.display());
    }
    println!();
    println!("  {:<20} {:>8} {:>12} {:>12}", "Category", "Live", "Leak RSS KB", "Leak VM KB");
    for cat in HandleCategory::ALL {
        let live = report.live[cat.index()];
        let leak = &report.leaks[cat.index()];
        if live == 0 && leak.vm_rss == 0 && leak.vm_size == 0 {
            continue;
        }
        println!(
            "  {:<20} {:>8} {:>12} {:>12}",
            cat.label(),
            live,
            leak.vm_rss,
            leak.vm_size
        );
    }
    let total = report.leak_total();
    println!();
    println!("  Outstanding bytes:   {}", report.total_memory_bytes);
    println!("  Leaked RSS/VmSize:   {} KB / {} KB", total.vm_rss, total.vm_size);
}
