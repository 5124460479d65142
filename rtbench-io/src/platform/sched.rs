use std::fmt;
use std::str::FromStr;

use crate::error::PlatformError;

/// Scheduler classes a benchmark thread can be created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedPolicy {
    /// Time-shared `SCHED_OTHER`. Only priority 0 is accepted.
    Default,
    /// `SCHED_FIFO`: equal priorities run to block or yield, in arrival order.
    Fifo,
    /// `SCHED_RR`: equal priorities rotate in fixed time slices.
    RoundRobin,
    /// Any other kernel class (`SCHED_BATCH`, `SCHED_IDLE`, ...), observed only.
    Other(libc::c_int),
}

impl SchedPolicy {
    pub fn raw(self) -> libc::c_int {
        match self {
            SchedPolicy::Default => libc::SCHED_OTHER,
            SchedPolicy::Fifo => libc::SCHED_FIFO,
            SchedPolicy::RoundRobin => libc::SCHED_RR,
            SchedPolicy::Other(raw) => raw,
        }
    }

    pub fn from_raw(raw: libc::c_int) -> Self {
        match raw {
            libc::SCHED_OTHER => SchedPolicy::Default,
            libc::SCHED_FIFO => SchedPolicy::Fifo,
            libc::SCHED_RR => SchedPolicy::RoundRobin,
            other => SchedPolicy::Other(other),
        }
    }

    /// Inclusive priority bounds the kernel accepts for this policy.
    pub fn priority_range(self) -> Result<(i32, i32), PlatformError> {
        // SAFETY: pure queries on a valid policy constant.
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(self.raw()),
                libc::sched_get_priority_max(self.raw()),
            )
        };
        if min < 0 || max < 0 {
            return Err(PlatformError::SchedAttr {
                call: "sched_get_priority_min/max",
                code: std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EINVAL),
            });
        }
        Ok((min, max))
    }

    /// Checks `priority` against the kernel bounds without touching any thread.
    pub fn validate(self, priority: i32) -> Result<(), PlatformError> {
        let (min, max) = self.priority_range()?;
        if priority < min || priority > max {
            return Err(PlatformError::InvalidPriority { policy: self, priority, min, max });
        }
        Ok(())
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedPolicy::Default => f.write_str("SCHED_OTHER"),
            SchedPolicy::Fifo => f.write_str("SCHED_FIFO"),
            SchedPolicy::RoundRobin => f.write_str("SCHED_RR"),
            SchedPolicy::Other(libc::SCHED_BATCH) => f.write_str("SCHED_BATCH"),
            SchedPolicy::Other(libc::SCHED_IDLE) => f.write_str("SCHED_IDLE"),
            SchedPolicy::Other(raw) => write!(f, "policy {}", raw),
        }
    }
}

impl FromStr for SchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "other" | "sched_other" => Ok(SchedPolicy::Default),
            "fifo" | "sched_fifo" => Ok(SchedPolicy::Fifo),
            "rr" | "round-robin" | "sched_rr" => Ok(SchedPolicy::RoundRobin),
            other => Err(format!("unknown scheduling policy '{}'", other)),
        }
    }
}

/// Policy and static priority applied to a thread at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedAttrs {
    pub policy: SchedPolicy,
    pub priority: i32,
}

impl SchedAttrs {
    pub fn new(policy: SchedPolicy, priority: i32) -> Self {
        Self { policy, priority }
    }

    /// `SCHED_OTHER` at priority 0; any unprivileged thread may request it.
    pub fn time_shared() -> Self {
        Self::new(SchedPolicy::Default, 0)
    }

    /// Policy and priority of the calling thread as the kernel sees them.
    pub fn of_current_thread() -> Result<Self, PlatformError> {
        let mut raw_policy: libc::c_int = 0;
        // SAFETY: sched_param is plain data.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };

        // SAFETY: both out-pointers are valid for writes; pthread_self is always valid.
        let ret = unsafe {
            libc::pthread_getschedparam(libc::pthread_self(), &mut raw_policy, &mut param)
        };
        if ret != 0 {
            return Err(PlatformError::SchedAttr { call: "pthread_getschedparam", code: ret });
        }

        Ok(Self::new(SchedPolicy::from_raw(raw_policy), param.sched_priority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_priority_bounds() {
        assert_eq!(SchedPolicy::Default.priority_range().unwrap(), (0, 0));
        assert_eq!(SchedPolicy::Fifo.priority_range().unwrap(), (1, 99));
        assert_eq!(SchedPolicy::RoundRobin.priority_range().unwrap(), (1, 99));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(SchedPolicy::Fifo.validate(80).is_ok());
        assert!(SchedPolicy::Default.validate(0).is_ok());

        let err = SchedPolicy::Fifo.validate(0).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidPriority { min: 1, max: 99, .. }), "{:?}", err);
        assert!(SchedPolicy::RoundRobin.validate(100).is_err());
        assert!(SchedPolicy::Default.validate(80).is_err());
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("fifo".parse::<SchedPolicy>().unwrap(), SchedPolicy::Fifo);
        assert_eq!("RR".parse::<SchedPolicy>().unwrap(), SchedPolicy::RoundRobin);
        assert_eq!("other".parse::<SchedPolicy>().unwrap(), SchedPolicy::Default);
        assert!("deadline".parse::<SchedPolicy>().is_err());
        assert_eq!(SchedPolicy::Fifo.to_string(), "SCHED_FIFO");
        assert_eq!(SchedPolicy::from_raw(libc::SCHED_RR), SchedPolicy::RoundRobin);
    }

    #[test]
    fn test_unknown_classes_keep_their_identity() {
        assert_eq!(SchedPolicy::from_raw(libc::SCHED_BATCH), SchedPolicy::Other(libc::SCHED_BATCH));
        assert_eq!(SchedPolicy::Other(libc::SCHED_BATCH).to_string(), "SCHED_BATCH");
        assert_eq!(SchedPolicy::Other(libc::SCHED_IDLE).to_string(), "SCHED_IDLE");
        assert_eq!(SchedPolicy::Other(42).to_string(), "policy 42");
        assert_eq!(SchedPolicy::Other(libc::SCHED_BATCH).raw(), libc::SCHED_BATCH);
    }

    #[test]
    fn test_batch_thread_is_not_reported_as_time_shared() {
        let seen = std::thread::spawn(|| {
            // SAFETY: sched_param is plain data.
            let param: libc::sched_param = unsafe { std::mem::zeroed() };
            // SAFETY: valid thread and param; SCHED_BATCH needs no privilege.
            let ret = unsafe {
                libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_BATCH, &param)
            };
            assert_eq!(ret, 0);
            // Children inherit the batch class.
            std::thread::spawn(SchedAttrs::of_current_thread).join().unwrap().unwrap()
        })
        .join()
        .unwrap();

        assert_eq!(seen.policy, SchedPolicy::Other(libc::SCHED_BATCH));
        assert_eq!(seen.policy.to_string(), "SCHED_BATCH");
    }

    #[test]
    fn test_harness_thread_is_time_shared() {
        let attrs = std::thread::spawn(SchedAttrs::of_current_thread).join().unwrap().unwrap();
        assert_eq!(attrs.policy, SchedPolicy::Default);
    }
}
