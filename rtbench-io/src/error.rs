pub use nix::errno::Errno;
use thiserror::Error;

use crate::platform::sched::SchedPolicy;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to lock memory pages via mlockall: {0}")]
    MemoryLock(#[source] Errno),
    #[error("CPU {cpu} is outside the affinity mask range (0..{limit})")]
    InvalidCpu { cpu: usize, limit: usize },
    #[error("Failed to pin thread to CPU {cpu}: {source}")]
    Affinity {
        cpu: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("Priority {priority} is not valid for {policy} (accepted range {min}..={max})")]
    InvalidPriority {
        policy: SchedPolicy,
        priority: i32,
        min: i32,
        max: i32,
    },
    #[error("{call} failed: {}", os_error(.code))]
    SchedAttr { call: &'static str, code: i32 },
    #[error("Failed to create thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Failed to join thread: {0}")]
    Join(#[source] std::io::Error),
}

fn os_error(code: &i32) -> std::io::Error {
    std::io::Error::from_raw_os_error(*code)
}

impl PlatformError {
    /// Raw OS error code behind this failure, if there is one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            PlatformError::MemoryLock(errno) => Some(*errno as i32),
            PlatformError::Affinity { source, .. } => source.raw_os_error(),
            PlatformError::SchedAttr { code, .. } => Some(*code),
            PlatformError::Spawn(err) | PlatformError::Join(err) => err.raw_os_error(),
            PlatformError::InvalidCpu { .. } | PlatformError::InvalidPriority { .. } => None,
        }
    }

    /// True when the kernel refused for lack of privilege (`EPERM`/`EACCES`).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.os_code(), Some(libc::EPERM) | Some(libc::EACCES))
    }
}
