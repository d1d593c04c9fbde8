//! Service layer between the HTTP handlers and the engine.
//!
//! Services own the pieces that are not pure: run bookkeeping, the
//! per-day run lock, and resolving drive times against external services
//! before the engine is invoked.

pub mod optimization;
pub mod run_tracker;

pub use optimization::{prepare, run_optimization, PreparedRun, RunInput, RunOutput};
pub use run_tracker::{LogEntry, LogLevel, RunGuard, RunRecord, RunStatus, RunTracker};
