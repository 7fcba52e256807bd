//! Layer composition: ordering, vetoes, observe-only epilogues, registry
//! freezing and teardown.
//!
//! Run with: cargo test -p zel-loader --test dispatch_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use zel_core::config::LoaderConfig;
use zel_core::{
    ApiCall, CallFrame, CallKind, CallOutput, CoreError, EntryPoint, Handle, HookSet, Layer,
    ZeResult,
};
use zel_loader::{Loader, NullDriver};

type Log = Arc<Mutex<Vec<String>>>;

/// Records every hook it sees; optionally vetoes one entry point.
struct Recorder {
    name: String,
    log: Log,
    veto: Option<(EntryPoint, ZeResult)>,
    torn_down: AtomicUsize,
}

impl Recorder {
    fn new(name: &str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            veto: None,
            torn_down: AtomicUsize::new(0),
        })
    }

    fn vetoing(name: &str, log: &Log, ep: EntryPoint, result: ZeResult) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            veto: Some((ep, result)),
            torn_down: AtomicUsize::new(0),
        })
    }
}

impl Layer for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self, entry_point: EntryPoint) -> HookSet {
        match entry_point.kind() {
            CallKind::Other => HookSet::empty(),
            _ => HookSet::BOTH,
        }
    }

    fn prologue(&self, frame: &mut CallFrame<'_>) -> ZeResult {
        self.log.lock().push(format!("{}:pre:{}", self.name, frame.entry_point()));
        frame.stash(frame.id());
        match self.veto {
            Some((ep, result)) if ep == frame.entry_point() => result,
            _ => ZeResult::Success,
        }
    }

    fn epilogue(&self, frame: &mut CallFrame<'_>, output: &CallOutput, result: ZeResult) {
        let id = frame.take::<u64>();
        assert_eq!(id, Some(frame.id()), "prologue state must reach the epilogue");
        self.log.lock().push(format!(
            "{}:post:{}:{}:{}",
            self.name,
            frame.entry_point(),
            result,
            !output.handle.is_null()
        ));
    }

    fn teardown(&self) {
        self.torn_down.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("{}:teardown", self.name));
    }
}

fn loader() -> (Loader, Arc<NullDriver>) {
    let driver = Arc::new(NullDriver::new());
    (Loader::with_driver(LoaderConfig::default(), driver.clone()), driver)
}

fn ctx_create() -> ApiCall {
    ApiCall::ContextCreate {
        driver: Handle::from_raw(1),
        flags: 0,
    }
}

#[test]
fn prologues_then_driver_then_epilogues_in_registration_order() {
    let log: Log = Arc::default();
    let (loader, driver) = loader();
    loader.register_layer(Recorder::new("a", &log)).unwrap();
    loader.register_layer(Recorder::new("b", &log)).unwrap();

    let mut out = CallOutput::default();
    assert_eq!(loader.dispatch(&ctx_create(), &mut out), ZeResult::Success);
    assert!(!out.handle.is_null());
    assert!(driver.is_live(out.handle));

    assert_eq!(
        *log.lock(),
        vec![
            "a:pre:zeContextCreate",
            "b:pre:zeContextCreate",
            "a:post:zeContextCreate:ZE_RESULT_SUCCESS:true",
            "b:post:zeContextCreate:ZE_RESULT_SUCCESS:true",
        ]
    );
}

#[test]
fn veto_skips_driver_and_later_layers() {
    let log: Log = Arc::default();
    let (loader, driver) = loader();
    loader.register_layer(Recorder::new("a", &log)).unwrap();
    loader
        .register_layer(Recorder::vetoing(
            "gate",
            &log,
            EntryPoint::ContextCreate,
            ZeResult::ErrorInvalidArgument,
        ))
        .unwrap();
    loader.register_layer(Recorder::new("c", &log)).unwrap();

    let mut out = CallOutput::default();
    assert_eq!(
        loader.dispatch(&ctx_create(), &mut out),
        ZeResult::ErrorInvalidArgument
    );
    assert!(out.handle.is_null());
    assert_eq!(driver.live_handles(), 0);
    assert_eq!(
        *log.lock(),
        vec!["a:pre:zeContextCreate", "gate:pre:zeContextCreate"]
    );
}

#[test]
fn epilogues_see_the_driver_failure_and_cannot_change_it() {
    let log: Log = Arc::default();
    let (loader, driver) = loader();
    loader.register_layer(Recorder::new("a", &log)).unwrap();
    driver.fail_next(EntryPoint::ContextCreate, ZeResult::ErrorOutOfHostMemory, 1);

    let mut out = CallOutput::default();
    assert_eq!(
        loader.dispatch(&ctx_create(), &mut out),
        ZeResult::ErrorOutOfHostMemory
    );
    assert!(log
        .lock()
        .contains(&"a:post:zeContextCreate:ZE_RESULT_ERROR_OUT_OF_HOST_MEMORY:false".to_string()));

    // the scripted failure was one-shot
    assert_eq!(loader.dispatch(&ctx_create(), &mut out), ZeResult::Success);
}

#[test]
fn unhooked_entry_points_go_straight_to_the_driver() {
    let log: Log = Arc::default();
    let (loader, _driver) = loader();
    loader.register_layer(Recorder::new("a", &log)).unwrap();

    let sync = ApiCall::CommandQueueSynchronize {
        command_queue: Handle::from_raw(0x10),
        timeout: u64::MAX,
    };
    let mut out = CallOutput::default();
    assert_eq!(loader.dispatch(&sync, &mut out), ZeResult::Success);
    assert!(log.lock().is_empty());
    assert!(loader
        .initialize()
        .hooks_for(EntryPoint::CommandQueueSynchronize)
        .is_empty());
}

#[test]
fn registry_freezes_at_initialize() {
    let log: Log = Arc::default();
    let (loader, _driver) = loader();
    loader.register_layer(Recorder::new("early", &log)).unwrap();
    let first = loader.initialize() as *const _;
    let second = loader.initialize() as *const _;
    assert_eq!(first, second);

    let err = loader.register_layer(Recorder::new("late", &log)).unwrap_err();
    assert!(matches!(err, CoreError::RegistryFrozen(ref name) if name == "late"));
    assert_eq!(loader.initialize().layer_names(), vec!["early"]);
}

#[test]
fn builtin_layers_come_first_in_fixed_order() {
    let mut config = LoaderConfig::default();
    config.layers.parameter_validation = true;
    config.layers.basic_leak_checker = true;
    config.layers.api_tracing = true;
    config.layers.system_resource_tracker = true;
    let loader = Loader::with_driver(config, Arc::new(NullDriver::new()));
    let log: Log = Arc::default();
    loader.register_layer(Recorder::new("custom", &log)).unwrap();

    assert_eq!(
        loader.initialize().layer_names(),
        vec![
            "parameter_validation",
            "basic_leak_checker",
            "api_tracing",
            "system_resource_tracker",
            "custom"
        ]
    );
}

#[test]
fn parameter_validation_vetoes_before_the_driver() {
    let mut config = LoaderConfig::default();
    config.layers.parameter_validation = true;
    let driver = Arc::new(NullDriver::new());
    let loader = Loader::with_driver(config, driver.clone());

    let alloc = ApiCall::MemAllocHost {
        context: Handle::from_raw(1),
        size: 0,
        alignment: 0,
    };
    assert_eq!(loader.create(&alloc), Err(ZeResult::ErrorUnsupportedSize));
    assert_eq!(driver.live_handles(), 0);
}

#[test]
fn teardown_runs_once_and_blocks_further_calls() {
    let log: Log = Arc::default();
    let (loader, _driver) = loader();
    let layer = Recorder::new("a", &log);
    loader.register_layer(layer.clone()).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    loader
        .register_teardown_callback(move || {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    loader.initialize();
    loader.teardown();
    loader.teardown();
    assert_eq!(layer.torn_down.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(loader.is_torn_down());

    let mut out = CallOutput::default();
    assert_eq!(
        loader.dispatch(&ctx_create(), &mut out),
        ZeResult::ErrorUninitialized
    );
    assert!(matches!(
        loader.register_teardown_callback(|| {}),
        Err(CoreError::TornDown)
    ));

    drop(loader);
    assert_eq!(layer.torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn teardown_without_initialize_is_a_noop() {
    let log: Log = Arc::default();
    let (loader, _driver) = loader();
    let layer = Recorder::new("a", &log);
    loader.register_layer(layer.clone()).unwrap();
    loader.teardown();
    assert_eq!(layer.torn_down.load(Ordering::SeqCst), 0);
}

#[test]
fn drop_tears_down() {
    let log: Log = Arc::default();
    let layer = Recorder::new("a", &log);
    {
        let (loader, _driver) = loader();
        loader.register_layer(layer.clone()).unwrap();
        loader.initialize();
    }
    assert_eq!(layer.torn_down.load(Ordering::SeqCst), 1);
}

#[test]
fn component_versions_list_loader_then_layers() {
    let mut config = LoaderConfig::default();
    config.layers.system_resource_tracker = true;
    let loader = Loader::with_driver(config, Arc::new(NullDriver::new()));
    let log: Log = Arc::default();
    loader
        .register_layer(Recorder::new(&"n".repeat(100), &log))
        .unwrap();

    let versions = loader.component_versions();
    let names: Vec<&str> = versions.iter().map(|v| v.name()).collect();
    assert_eq!(names[0], "loader");
    assert_eq!(names[1], "system_resource_tracker");
    assert_eq!(names[2].len(), 63);
    assert_eq!(versions[0].library_version.to_string(), "1.24.0");
    assert_eq!(versions[0].spec_version.major(), 1);
}

#[test]
fn null_loader_requires_opt_in() {
    let mut config = LoaderConfig::default();
    config.drivers.alt_drivers = vec!["libdefinitely_not_a_driver.so.1".into()];
    assert!(matches!(Loader::new(config.clone()), Err(CoreError::NoDriver(_))));

    config.drivers.enable_null_driver = true;
    let loader = Loader::new(config).unwrap();
    assert_eq!(loader.driver().name(), "null");
}

#[test]
fn accepted_teardown_callbacks_always_run() {
    for _ in 0..20 {
        let (loader, _driver) = loader();
        let loader = Arc::new(loader);
        let fired = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));

        let registrars: Vec<_> = (0..4)
            .map(|_| {
                let loader = loader.clone();
                let fired = fired.clone();
                let accepted = accepted.clone();
                std::thread::spawn(move || loop {
                    let f = fired.clone();
                    let r = loader.register_teardown_callback(move || {
                        f.fetch_add(1, Ordering::SeqCst);
                    });
                    match r {
                        Ok(()) => accepted.fetch_add(1, Ordering::SeqCst),
                        Err(CoreError::TornDown) => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    };
                })
            })
            .collect();

        std::thread::yield_now();
        loader.teardown();
        for r in registrars {
            r.join().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), accepted.load(Ordering::SeqCst));
    }
}
