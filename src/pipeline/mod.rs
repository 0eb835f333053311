//! Real-time acquisition, detection and fusion loop.
//!
//! The orchestrator is single-threaded and blocking: each cycle acquires
//! one aligned frame pair, runs the detector, fuses depth and hands the
//! result to a [`FrameSink`]. At most one frame pair is in flight, so a
//! slow detector lowers the effective frame rate instead of queueing
//! frames.
//!
//! ```text
//! Idle --start-run--> Running --stop request / stop-run / fatal error--> Stopping --> Idle
//! ```
//!
//! `Stopping` lasts only while the device is being released.

mod orchestrator;
mod sink;
mod stats;

pub use orchestrator::{
    ControlHandle, CycleOutcome, CycleReport, PipelineError, PipelineOrchestrator, RunState,
};
pub use sink::{describe, snapshot_name, FrameSink, LoggingSink};
pub use stats::CycleStats;
