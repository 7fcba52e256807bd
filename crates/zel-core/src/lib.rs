//! Shared data model of the zel loader.
//!
//! Everything that crosses a crate boundary lives here: result codes, handles,
//! the closed set of entry points with their arguments, and the `Layer` and
//! `Driver` seams that the dispatcher composes.

pub mod call;
pub mod config;
pub mod driver;
pub mod entry_point;
pub mod error;
pub mod handle;
pub mod layer;
pub mod result;
pub mod version;

pub use call::{ApiCall, CallOutput, Timeout};
pub use driver::Driver;
pub use entry_point::{CallKind, EntryPoint};
pub use error::CoreError;
pub use handle::{Handle, HandleCategory};
pub use layer::{CallFrame, HookSet, Layer, LayerContext};
pub use result::ZeResult;
