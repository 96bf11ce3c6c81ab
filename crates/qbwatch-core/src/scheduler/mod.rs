//! Multi-cadence task scheduler.
//!
//! One timer ticks every second; each registered task fires when the
//! wall-clock second aligns with its cadence. A task whose previous
//! invocation is still in flight is skipped (never queued), so a stalled
//! remote call cannot pile up overlapping passes. Task failures are caught
//! and logged at the dispatch boundary; neither other tasks nor future
//! ticks are affected.

mod cadence;
mod registry;

pub use cadence::Cadence;
pub use registry::Scheduler;
