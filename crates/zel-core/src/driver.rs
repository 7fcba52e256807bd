use crate::call::{ApiCall, CallOutput};
use crate::result::ZeResult;

/// The terminal implementation behind all layers.
///
/// Implementations must be callable from many threads at once; the loader
/// holds no lock around `call`.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Execute one entry point. Create calls write the new handle into
    /// `output.handle`; everything else leaves it untouched.
    fn call(&self, call: &ApiCall, output: &mut CallOutput) -> ZeResult;
}
