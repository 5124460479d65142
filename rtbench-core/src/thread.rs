//! Benchmark thread lifecycle.
//!
//! `RtThread`/`NrtThread` hold a configuration plus a stored workload closure.
//! `start()` consumes the value and returns a [`RunningThread`]; `join()`
//! consumes that. A thread therefore cannot be started twice, joined twice,
//! or joined without having been started, and a failed start leaves nothing
//! to join.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};
use rtbench_io::platform::{current_cpu, current_tid};
use rtbench_io::{
    pin_thread_to_core, spawn_explicit, PlatformError, RawThread, SchedAttrs, SchedPolicy,
};

use crate::error::ThreadError;
use crate::report::{AffinityOutcome, ThreadKind, ThreadReport};
use crate::timing::{format_secs, ElapsedTiming};

/// Unit of work run inside a benchmark thread.
pub type Workload = Box<dyn FnOnce() + Send + 'static>;

/// Where a thread places itself before running its workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Floating,
    Pinned(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtThreadConfig {
    pub app_id: u32,
    pub priority: i32,
    pub policy: SchedPolicy,
}

impl RtThreadConfig {
    pub fn new(app_id: u32, priority: i32, policy: SchedPolicy) -> Self {
        Self { app_id, priority, policy }
    }

    pub fn attrs(&self) -> SchedAttrs {
        SchedAttrs::new(self.policy, self.priority)
    }
}

/// A thread created under an explicit scheduling policy and priority.
pub struct RtThread {
    config: RtThreadConfig,
    workload: Workload,
}

impl RtThread {
    pub fn new<F>(config: RtThreadConfig, workload: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { config, workload: Box::new(workload) }
    }

    /// Spawns the OS thread with `config`'s policy and priority, never the
    /// caller's. The lifetime clock starts before the spawn, so thread
    /// creation cost is part of the reported elapsed time.
    ///
    /// # Errors
    /// [`ThreadError::Start`] if the priority is invalid for the policy or
    /// the kernel refuses the scheduling class. The workload does not run.
    pub fn start(self, placement: Placement) -> Result<RunningThread, ThreadError> {
        let app_id = self.config.app_id;
        let timing = ElapsedTiming::begin();
        let body = ThreadBody {
            app_id,
            kind: ThreadKind::RealTime,
            placement,
            workload: self.workload,
        };

        let handle = spawn_explicit(self.config.attrs(), move || body.run())
            .map_err(|source| ThreadError::Start { app_id, source })?;

        Ok(RunningThread {
            app_id,
            kind: ThreadKind::RealTime,
            handle: Handle::Explicit(handle),
            timing,
        })
    }
}

/// A thread left to the default time-shared scheduler.
pub struct NrtThread {
    app_id: u32,
    workload: Workload,
}

impl NrtThread {
    pub fn new<F>(app_id: u32, workload: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { app_id, workload: Box::new(workload) }
    }

    /// Spawns the OS thread with inherited scheduling attributes.
    ///
    /// # Errors
    /// [`ThreadError::Start`] if the OS cannot create another thread.
    pub fn start(self, placement: Placement) -> Result<RunningThread, ThreadError> {
        let app_id = self.app_id;
        let timing = ElapsedTiming::begin();
        let body = ThreadBody {
            app_id,
            kind: ThreadKind::NonRealTime,
            placement,
            workload: self.workload,
        };

        let handle = thread::Builder::new()
            .name(format!("nrt-app-{}", app_id))
            .spawn(move || body.run())
            .map_err(|err| ThreadError::Start { app_id, source: PlatformError::Spawn(err) })?;

        Ok(RunningThread {
            app_id,
            kind: ThreadKind::NonRealTime,
            handle: Handle::Inherited(handle),
            timing,
        })
    }
}

enum Handle {
    Explicit(RawThread<ThreadTrace>),
    Inherited(JoinHandle<ThreadTrace>),
}

/// A started benchmark thread that still has to be joined.
pub struct RunningThread {
    app_id: u32,
    kind: ThreadKind,
    handle: Handle,
    timing: ElapsedTiming,
}

impl RunningThread {
    /// Blocks until the thread has terminated, then stops the lifetime clock.
    ///
    /// # Errors
    /// [`ThreadError::Join`] if the OS join fails, [`ThreadError::Panicked`]
    /// if the workload unwound.
    pub fn join(self) -> Result<ThreadReport, ThreadError> {
        let app_id = self.app_id;
        let outcome = match self.handle {
            Handle::Explicit(handle) => handle
                .join()
                .map_err(|source| ThreadError::Join { app_id, source })?,
            Handle::Inherited(handle) => handle.join(),
        };

        let elapsed = self.timing.finish();
        let trace = outcome.map_err(|_| ThreadError::Panicked { app_id })?;

        Ok(ThreadReport {
            app_id,
            kind: self.kind,
            sched: trace.sched,
            tid: trace.tid,
            cpu: trace.cpu,
            affinity: trace.affinity,
            workload: trace.workload,
            elapsed,
        })
    }
}

/// What the thread observed about itself while it ran.
struct ThreadTrace {
    tid: i64,
    cpu: Option<usize>,
    sched: SchedAttrs,
    affinity: AffinityOutcome,
    workload: Duration,
}

struct ThreadBody {
    app_id: u32,
    kind: ThreadKind,
    placement: Placement,
    workload: Workload,
}

impl ThreadBody {
    fn run(self) -> ThreadTrace {
        // Pinning is best effort: a refused mask leaves default placement.
        let affinity = match self.placement {
            Placement::Floating => AffinityOutcome::NotRequested,
            Placement::Pinned(cpu) => match pin_thread_to_core(cpu) {
                Ok(()) => AffinityOutcome::Pinned(cpu),
                Err(err) => {
                    warn!("App #{}: {}. Running floating.", self.app_id, err);
                    AffinityOutcome::Failed { cpu, reason: err.to_string() }
                }
            },
        };

        let tid = current_tid();
        let cpu = current_cpu();
        let sched = SchedAttrs::of_current_thread().unwrap_or_else(|err| {
            warn!("App #{}: cannot read scheduling attributes: {}", self.app_id, err);
            SchedAttrs::time_shared()
        });

        info!(
            "[{} thread #{}] running on CPU #{}",
            self.kind,
            tid,
            cpu.map_or_else(|| "?".to_string(), |cpu| cpu.to_string())
        );
        info!("Running App #{} ({})...", self.app_id, self.kind);

        let started = Instant::now();
        (self.workload)();
        let workload = started.elapsed();

        info!(
            "App #{} workload finished; Elapsed time: {} sec",
            self.app_id,
            format_secs(workload)
        );

        ThreadTrace { tid, cpu, sched, affinity, workload }
    }
}
