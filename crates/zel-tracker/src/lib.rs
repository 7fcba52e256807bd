//! System resource tracker: samples process memory around every handle create
//! and destroy, keeps per-category live counts and leak totals, and optionally
//! streams one CSV row per call.

pub mod layer;
pub mod snapshot;
pub mod summary;
pub mod telemetry;
pub mod tracker;

pub use layer::SystemResourceTrackerLayer;
pub use snapshot::{ResourceDelta, ResourceSnapshot};
pub use summary::TelemetrySummary;
pub use telemetry::{TelemetryError, TelemetrySink};
pub use tracker::{HandleRecord, ResourceTracker, TrackerReport};
