//! rtbench core: real-time and time-shared benchmark threads.
//!
//! A benchmark run is a fixed set of threads, some created under a real-time
//! class (`SCHED_FIFO`/`SCHED_RR`) and some under the default time-shared
//! class, all competing for the same CPUs. Each thread runs one workload and
//! yields a [`ThreadReport`] with what the kernel actually gave it.

pub mod error;
pub mod experiment;
pub mod report;
pub mod thread;
pub mod timing;
pub mod workload;

pub use error::{ExperimentError, ThreadError};
pub use experiment::{Experiment, ExperimentOutcome, RunSettings, ThreadPlan};
pub use report::{AffinityOutcome, ReportRecord, ThreadKind, ThreadReport};
pub use thread::{NrtThread, Placement, RtThread, RtThreadConfig, RunningThread, Workload};
pub use timing::ElapsedTiming;
