//! The exported C entry points, called the way a C program would.
//!
//! Run with: cargo test -p zel-loader --test ffi_test

use std::sync::Once;

use zel_core::version::{ApiVersion, ComponentVersion, LibraryVersion};
use zel_core::ZeResult;
use zel_loader::discovery::{discover_enabled_drivers, inspect_drivers};
use zel_loader::ffi::{
    global_loader, write_versions, zeInit, zelCheckIsLoaderInTearDown, zelGetLoaderVersion,
    zelLoaderGetVersions, ZelComponentVersion,
};
use zel_core::config::LoaderConfig;

static INIT: Once = Once::new();

fn init_null_loader() {
    INIT.call_once(|| {
        std::env::set_var("ZE_ENABLE_NULL_DRIVER", "1");
        std::env::set_var("ZEL_ENABLE_SYSTEM_RESOURCE_TRACKER_CHECKER", "1");
        std::env::remove_var("ZEL_SYSTEM_RESOURCE_TRACKER_CSV");
        assert_eq!(zeInit(0), ZeResult::Success);
    });
}

#[test]
fn count_then_fill() {
    init_null_loader();
    let mut n = 0usize;
    let r = unsafe { zelLoaderGetVersions(&mut n, std::ptr::null_mut()) };
    assert_eq!(r, ZeResult::Success);
    assert!(n >= 2, "loader plus the tracker layer");

    let mut buf = vec![ZelComponentVersion::default(); n];
    let r = unsafe { zelLoaderGetVersions(&mut n, buf.as_mut_ptr()) };
    assert_eq!(r, ZeResult::Success);
    assert_eq!(buf[0].name(), "loader");
    assert!(buf.iter().any(|v| v.name() == "system_resource_tracker"));
    assert_eq!(buf[0].spec_version >> 16, 1);
    assert_eq!(buf[0].component_lib_version.minor, 24);
}

#[test]
fn too_small_buffer_is_rejected() {
    init_null_loader();
    let mut n = 1usize;
    let mut buf = vec![ZelComponentVersion::default(); 1];
    let r = unsafe { zelLoaderGetVersions(&mut n, buf.as_mut_ptr()) };
    assert_eq!(r, ZeResult::ErrorInvalidSize);
}

#[test]
fn null_count_pointer_is_rejected() {
    let r = unsafe { zelLoaderGetVersions(std::ptr::null_mut(), std::ptr::null_mut()) };
    assert_eq!(r, ZeResult::ErrorInvalidNullPointer);
}

#[test]
fn loader_version_alone() {
    let mut v = ZelComponentVersion::default();
    assert_eq!(unsafe { zelGetLoaderVersion(&mut v) }, ZeResult::Success);
    assert_eq!(v.name(), "loader");
    assert_eq!(v.component_lib_version.major, 1);
    assert_eq!(
        unsafe { zelGetLoaderVersion(std::ptr::null_mut()) },
        ZeResult::ErrorInvalidNullPointer
    );
}

#[test]
fn write_versions_truncates_nothing_and_terminates_names() {
    let long = "z".repeat(80);
    let versions = vec![
        ComponentVersion::new("loader", ApiVersion::new(1, 13), LibraryVersion::new(1, 24, 0)),
        ComponentVersion::new(&long, ApiVersion::V1_0, LibraryVersion::new(0, 1, 0)),
    ];
    let mut n = 0;
    assert_eq!(write_versions(&versions, &mut n, None), ZeResult::Success);
    assert_eq!(n, 2);

    let mut out = [ZelComponentVersion::default(); 3];
    n = 3;
    assert_eq!(write_versions(&versions, &mut n, Some(&mut out[..])), ZeResult::Success);
    assert_eq!(n, 2);
    assert_eq!(out[1].name().len(), 63);
    assert_eq!(out[1].component_name[63], 0);
    assert_eq!(out[0].spec_version, (1 << 16) | 13);
}

#[test]
fn not_in_teardown_while_running() {
    init_null_loader();
    assert!(!zelCheckIsLoaderInTearDown());
}

#[test]
fn missing_driver_libraries_are_reported_not_fatal() {
    let mut config = LoaderConfig::default();
    config.drivers.alt_drivers = vec!["libzel_missing_a.so".into(), "libzel_missing_b.so".into()];
    let names = discover_enabled_drivers(&config);
    assert_eq!(names, config.drivers.alt_drivers);
    let statuses = inspect_drivers(&names);
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|p| !p.loaded && p.error.is_some()));
}

#[test]
fn default_driver_list_is_platform_named() {
    let names = discover_enabled_drivers(&LoaderConfig::default());
    assert_eq!(names.len(), 1);
    assert!(names[0].contains("ze_intel_gpu"));
}

const EXIT_MARKER_VAR: &str = "ZEL_TEST_EXIT_MARKER";

/// Child half of `process_exit_runs_teardown`: initializes, registers a
/// teardown callback, then returns without tearing down. Does nothing unless
/// spawned by the parent.
#[test]
fn exit_teardown_child() {
    let Some(marker) = std::env::var_os(EXIT_MARKER_VAR) else {
        return;
    };
    init_null_loader();
    global_loader()
        .unwrap()
        .register_teardown_callback(move || {
            std::fs::write(&marker, b"torn down").unwrap();
        })
        .unwrap();
    assert!(!zelCheckIsLoaderInTearDown());
}

#[test]
fn process_exit_runs_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("exit.marker");
    let status = std::process::Command::new(std::env::current_exe().unwrap())
        .args(["exit_teardown_child", "--exact", "--test-threads=1"])
        .env(EXIT_MARKER_VAR, &marker)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(std::fs::read(&marker).unwrap(), b"torn down");
}
