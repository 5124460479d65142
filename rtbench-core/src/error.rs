use rtbench_io::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThreadError {
    #[error("App #{app_id}: failed to start thread: {source}")]
    Start {
        app_id: u32,
        #[source]
        source: PlatformError,
    },
    #[error("App #{app_id}: failed to join thread: {source}")]
    Join {
        app_id: u32,
        #[source]
        source: PlatformError,
    },
    #[error("App #{app_id}: workload panicked")]
    Panicked { app_id: u32 },
}

impl ThreadError {
    pub fn app_id(&self) -> u32 {
        match self {
            ThreadError::Start { app_id, .. }
            | ThreadError::Join { app_id, .. }
            | ThreadError::Panicked { app_id } => *app_id,
        }
    }
}

#[derive(Error, Debug)]
pub enum ExperimentError {
    /// Timing without locked pages is meaningless, so no thread is started.
    #[error("Memory locking failed, no thread was started: {0}")]
    MemoryLock(#[source] PlatformError),
    #[error("exp_id {0} NOT FOUND")]
    Unrecognized(i64),
}
