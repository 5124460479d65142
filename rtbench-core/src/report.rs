use std::fmt;
use std::time::Duration;

use rtbench_io::SchedAttrs;
use serde::Serialize;

use crate::timing::format_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreadKind {
    #[serde(rename = "RT")]
    RealTime,
    #[serde(rename = "NRT")]
    NonRealTime,
}

impl fmt::Display for ThreadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadKind::RealTime => f.write_str("RT"),
            ThreadKind::NonRealTime => f.write_str("NRT"),
        }
    }
}

/// What happened when the thread tried to pin itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityOutcome {
    NotRequested,
    Pinned(usize),
    /// Pinning was refused; the thread ran under default placement.
    Failed { cpu: usize, reason: String },
}

impl fmt::Display for AffinityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityOutcome::NotRequested => f.write_str("floating"),
            AffinityOutcome::Pinned(cpu) => write!(f, "pinned to CPU {}", cpu),
            AffinityOutcome::Failed { cpu, reason } => {
                write!(f, "pin to CPU {} failed ({})", cpu, reason)
            }
        }
    }
}

/// Result of one started-and-joined benchmark thread.
#[derive(Debug, Clone)]
pub struct ThreadReport {
    pub app_id: u32,
    pub kind: ThreadKind,
    /// Policy and priority observed from inside the thread.
    pub sched: SchedAttrs,
    pub tid: i64,
    /// CPU the thread was on when its workload began.
    pub cpu: Option<usize>,
    pub affinity: AffinityOutcome,
    /// Time spent inside the workload call only.
    pub workload: Duration,
    /// From just before the thread was spawned to just after it was joined.
    pub elapsed: Duration,
}

impl ThreadReport {
    pub fn to_record(&self) -> ReportRecord {
        ReportRecord {
            app_id: self.app_id,
            kind: self.kind,
            policy: self.sched.policy.to_string(),
            priority: self.sched.priority,
            tid: self.tid,
            cpu: self.cpu,
            affinity: self.affinity.to_string(),
            workload_secs: self.workload.as_secs_f64(),
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }
}

impl fmt::Display for ThreadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} thread #{}] App #{} Ends; Elapsed time: {} sec \
             (workload {} sec, {} prio {}, CPU #{}, {})",
            self.kind,
            self.tid,
            self.app_id,
            format_secs(self.elapsed),
            format_secs(self.workload),
            self.sched.policy,
            self.sched.priority,
            self.cpu.map_or_else(|| "?".to_string(), |cpu| cpu.to_string()),
            self.affinity,
        )
    }
}

/// Flat, serialisable view of a [`ThreadReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub app_id: u32,
    pub kind: ThreadKind,
    pub policy: String,
    pub priority: i32,
    pub tid: i64,
    pub cpu: Option<usize>,
    pub affinity: String,
    pub workload_secs: f64,
    pub elapsed_secs: f64,
}

impl ReportRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
