pub mod affinity;
pub mod sched;
pub mod thread;
pub mod topology;

use nix::sys::mman::{mlockall, MlockAllFlags};

use crate::error::PlatformError;

/// Locks all current and future memory pages into physical RAM.
///
/// # Logic
/// Calls `mlockall(MCL_CURRENT | MCL_FUTURE)` so that neither the pages mapped
/// now nor the stacks and heap grown by benchmark threads later can fault.
/// A page fault inside a timed section adds unbounded latency to the sample.
///
/// # Errors
/// Returns [`PlatformError::MemoryLock`] with the kernel's cause when the lock
/// is refused (usually `ulimit -l` or a missing `CAP_IPC_LOCK`). The process
/// stays in its previous state; whether to abort is the caller's decision.
pub fn lock_memory_pages() -> Result<(), PlatformError> {
    let flags = MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE;

    mlockall(flags).map_err(|errno| {
        log::error!("mlockall refused: {}.", errno);
        log::error!("Fix: Run 'ulimit -l unlimited' or run with capability CAP_IPC_LOCK.");
        PlatformError::MemoryLock(errno)
    })?;

    log::info!("All current and future memory pages locked.");
    Ok(())
}

/// CPU the calling thread is executing on right now, if the kernel reports one.
pub fn current_cpu() -> Option<usize> {
    // SAFETY: sched_getcpu takes no arguments and only reads per-thread state.
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

/// Kernel thread id of the calling thread.
pub fn current_tid() -> i64 {
    // SAFETY: gettid cannot fail and has no side effects.
    i64::from(unsafe { libc::gettid() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_cpu_is_reported() {
        let cpu = current_cpu().expect("sched_getcpu should succeed on Linux");
        assert!(cpu < affinity::max_cpus());
    }

    #[test]
    fn test_tid_differs_between_threads() {
        let main_tid = current_tid();
        let other = std::thread::spawn(current_tid).join().unwrap();
        assert!(main_tid > 0);
        assert_ne!(main_tid, other);
    }
}
