//! C ABI surface of the loader.
//!
//! The process-wide loader lives here and only here; everything else takes a
//! `&Loader`. It is built by `zeInit` from the environment.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int};
use std::sync::OnceLock;

use tracing::{error, warn};
use zel_core::version::{ComponentVersion, COMPONENT_NAME_CAPACITY};
use zel_core::ZeResult;

use crate::loader::{loader_version, Loader};

/// `zel_version_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZelVersion {
    pub major: c_int,
    pub minor: c_int,
    pub patch: c_int,
}

/// `zel_component_version_t`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZelComponentVersion {
    pub component_name: [c_char; COMPONENT_NAME_CAPACITY],
    pub spec_version: u32,
    pub component_lib_version: ZelVersion,
}

impl Default for ZelComponentVersion {
    fn default() -> Self {
        Self {
            component_name: [0; COMPONENT_NAME_CAPACITY],
            spec_version: 0,
            component_lib_version: ZelVersion::default(),
        }
    }
}

impl ZelComponentVersion {
    /// NUL-terminated copy of `version`. Names are already bounded to fit.
    pub fn from_component(version: &ComponentVersion) -> Self {
        let mut out = Self::default();
        for (dst, src) in out.component_name.iter_mut().zip(version.name().bytes()) {
            *dst = src as c_char;
        }
        out.spec_version = version.spec_version.packed();
        out.component_lib_version = ZelVersion {
            major: version.library_version.major,
            minor: version.library_version.minor,
            patch: version.library_version.patch,
        };
        out
    }

    /// Component name up to the first NUL.
    pub fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .component_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Count-then-fill over a slice. `out = None` only reports the count.
pub fn write_versions(
    versions: &[ComponentVersion],
    num_elems: &mut usize,
    out: Option<&mut [ZelComponentVersion]>,
) -> ZeResult {
    let Some(out) = out else {
        *num_elems = versions.len();
        return ZeResult::Success;
    };
    if *num_elems < versions.len() || out.len() < versions.len() {
        return ZeResult::ErrorInvalidSize;
    }
    for (slot, v) in out.iter_mut().zip(versions) {
        *slot = ZelComponentVersion::from_component(v);
    }
    *num_elems = versions.len();
    ZeResult::Success
}

static GLOBAL: OnceLock<Option<Loader>> = OnceLock::new();

/// The loader built by `zeInit`, if that succeeded.
pub fn global_loader() -> Option<&'static Loader> {
    GLOBAL.get().and_then(Option::as_ref)
}

extern "C" fn teardown_at_exit() {
    zelLoaderContextTeardown();
}

/// Flush layer reports when the process exits without calling
/// `zelLoaderContextTeardown` itself. Runs once, after a successful init.
fn register_exit_teardown() {
    // SAFETY: the handler is a plain `extern "C"` fn with no arguments.
    let rc = unsafe { libc::atexit(teardown_at_exit) };
    if rc != 0 {
        warn!("could not register exit-time teardown (atexit returned {})", rc);
    }
}

/// Build the process loader from the environment. Later calls return the
/// first call's outcome.
#[no_mangle]
pub extern "C" fn zeInit(_flags: u32) -> ZeResult {
    let loader = GLOBAL.get_or_init(|| {
        zel_common::init_logging();
        match Loader::from_env() {
            Ok(loader) => {
                loader.initialize();
                register_exit_teardown();
                Some(loader)
            }
            Err(e) => {
                error!("zeInit failed: {}", e);
                None
            }
        }
    });
    match loader {
        Some(l) if !l.is_torn_down() => ZeResult::Success,
        _ => ZeResult::ErrorUninitialized,
    }
}

/// # Safety
/// `num_elems` must be null or valid for reads and writes. `versions` must be
/// null or point to at least `*num_elems` writable elements.
#[no_mangle]
pub unsafe extern "C" fn zelLoaderGetVersions(
    num_elems: *mut usize,
    versions: *mut ZelComponentVersion,
) -> ZeResult {
    if num_elems.is_null() {
        return ZeResult::ErrorInvalidNullPointer;
    }
    let Some(loader) = global_loader() else {
        return ZeResult::ErrorUninitialized;
    };
    let components = loader.component_versions();
    // SAFETY: checked non-null above; validity is the caller's contract.
    let num_elems = unsafe { &mut *num_elems };
    if versions.is_null() {
        return write_versions(&components, num_elems, None);
    }
    if *num_elems < components.len() {
        return ZeResult::ErrorInvalidSize;
    }
    // SAFETY: the caller provides `*num_elems` elements, which covers `components.len()`.
    let out = unsafe { std::slice::from_raw_parts_mut(versions, components.len()) };
    write_versions(&components, num_elems, Some(out))
}

/// Fills the loader's own entry. Works before `zeInit`.
///
/// # Safety
/// `version` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn zelGetLoaderVersion(version: *mut ZelComponentVersion) -> ZeResult {
    if version.is_null() {
        return ZeResult::ErrorInvalidNullPointer;
    }
    // SAFETY: checked non-null above.
    unsafe { *version = ZelComponentVersion::from_component(&loader_version()) };
    ZeResult::Success
}

/// Tear the process loader down now instead of at exit.
#[no_mangle]
pub extern "C" fn zelLoaderContextTeardown() {
    if let Some(loader) = global_loader() {
        loader.teardown();
    }
}

#[no_mangle]
pub extern "C" fn zelCheckIsLoaderInTearDown() -> bool {
    global_loader().is_some_and(Loader::is_torn_down)
}
