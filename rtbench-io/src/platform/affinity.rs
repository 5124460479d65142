use std::mem;
use log::debug;

use crate::error::PlatformError;

/// CPU that benchmark threads are pinned to when an experiment enables pinning.
pub const DEFAULT_CPU: usize = 1;

/// Number of CPU ids a `cpu_set_t` can describe.
pub fn max_cpus() -> usize {
    libc::CPU_SETSIZE as usize
}

/// Pins the calling thread to a single logical CPU.
///
/// # Logic
/// Uses `libc::sched_setaffinity` with pid 0, which on Linux addresses the
/// calling thread rather than the whole process, to restrict the scheduler to
/// a single bit in the CPU mask. Sibling threads keep their own masks.
///
/// # Errors
/// Returns [`PlatformError::InvalidCpu`] if `core_id` does not fit in a
/// `cpu_set_t`, or [`PlatformError::Affinity`] with the kernel's cause (offline
/// CPU, cpuset restriction, missing permission). The thread keeps its previous
/// placement in both cases, so callers may treat this as a soft failure.
pub fn pin_thread_to_core(core_id: usize) -> Result<(), PlatformError> {
    if core_id >= max_cpus() {
        return Err(PlatformError::InvalidCpu { cpu: core_id, limit: max_cpus() });
    }

    // SAFETY: cpu_set_t is plain data; all-zero is the empty set.
    let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };

    // SAFETY: core_id was bounds-checked against CPU_SETSIZE above.
    unsafe {
        libc::CPU_ZERO(&mut cpu_set);
        libc::CPU_SET(core_id, &mut cpu_set);
    }

    let pid = 0; // 0 means the calling thread

    // SAFETY:
    // - `pid` 0 refers to current thread.
    // - `cpu_set` is stack-allocated and valid.
    // - `sizeof(cpu_set_t)` is correct.
    let ret = unsafe {
        libc::sched_setaffinity(pid, mem::size_of::<libc::cpu_set_t>(), &cpu_set)
    };

    if ret != 0 {
        return Err(PlatformError::Affinity {
            cpu: core_id,
            source: std::io::Error::last_os_error(),
        });
    }

    debug!("Thread pinned to CPU {}", core_id);
    Ok(())
}

/// CPUs the calling thread is currently allowed to run on.
pub fn current_affinity() -> Result<Vec<usize>, PlatformError> {
    // SAFETY: cpu_set_t is plain data; all-zero is the empty set.
    let mut cpu_set: libc::cpu_set_t = unsafe { mem::zeroed() };

    // SAFETY: `cpu_set` is a valid, writable cpu_set_t of the size passed.
    let ret = unsafe {
        libc::sched_getaffinity(0, mem::size_of::<libc::cpu_set_t>(), &mut cpu_set)
    };
    if ret != 0 {
        return Err(PlatformError::SchedAttr {
            call: "sched_getaffinity",
            code: std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EINVAL),
        });
    }

    // SAFETY: every index is below CPU_SETSIZE.
    Ok((0..max_cpus())
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &cpu_set) })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_cpu_is_rejected() {
        let err = pin_thread_to_core(max_cpus() + 3).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidCpu { .. }), "{:?}", err);
    }

    #[test]
    fn test_mask_read_failure_is_not_a_pin_failure() {
        let err = PlatformError::SchedAttr { call: "sched_getaffinity", code: libc::EFAULT };
        let msg = err.to_string();
        assert!(msg.starts_with("sched_getaffinity failed"), "{}", msg);
        assert!(!msg.contains("pin"), "{}", msg);
    }

    #[test]
    fn test_pin_to_allowed_cpu() {
        // Run on a scratch thread so the test harness thread keeps its mask.
        std::thread::spawn(|| {
            let allowed = current_affinity().unwrap();
            let target = *allowed.first().expect("at least one CPU is allowed");
            pin_thread_to_core(target).unwrap();
            assert_eq!(current_affinity().unwrap(), vec![target]);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_pin_failure_leaves_mask_untouched() {
        std::thread::spawn(|| {
            let before = current_affinity().unwrap();
            // Highest representable id; no test host exposes 1024 CPUs.
            let result = pin_thread_to_core(max_cpus() - 1);
            if result.is_err() {
                assert_eq!(current_affinity().unwrap(), before);
            }
        })
        .join()
        .unwrap();
    }
}
