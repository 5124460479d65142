//! Fixed experiment topologies and the start-all/join-all driver.

use log::{info, warn};
use rtbench_io::{lock_all_memory, PlatformError, SchedPolicy, DEFAULT_CPU};

use crate::error::{ExperimentError, ThreadError};
use crate::report::ThreadReport;
use crate::thread::{NrtThread, Placement, RtThread, RtThreadConfig, RunningThread, Workload};
use crate::workload::{busy_cal, canny_workload, WorkloadKind};

const RT_PRIORITY: i32 = 80;

/// One thread of an experiment, before it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPlan {
    Rt(RtThreadConfig),
    Nrt { app_id: u32 },
}

impl ThreadPlan {
    /// RT apps 1 and 2 process images; everything else spins.
    pub fn workload_kind(&self) -> WorkloadKind {
        match self {
            ThreadPlan::Rt(config) if matches!(config.app_id, 1 | 2) => WorkloadKind::Canny,
            _ => WorkloadKind::Busy,
        }
    }
}

/// Knobs for a run that are not part of the experiment topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// CPU used when the experiment pins its threads.
    pub pin_cpu: usize,
    pub busy_iterations: u64,
    pub image_size: usize,
    pub canny_passes: u32,
    pub lock_memory: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            pin_cpu: DEFAULT_CPU,
            busy_iterations: 400_000_000,
            image_size: 1024,
            canny_passes: 20,
            lock_memory: true,
        }
    }
}

impl RunSettings {
    pub fn workload_for(&self, plan: &ThreadPlan) -> Workload {
        match plan.workload_kind() {
            WorkloadKind::Busy => {
                let iterations = self.busy_iterations;
                Box::new(move || {
                    busy_cal(iterations);
                })
            }
            WorkloadKind::Canny => {
                let (size, passes) = (self.image_size, self.canny_passes);
                Box::new(move || {
                    canny_workload(size, passes);
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub id: u32,
    pub summary: &'static str,
    /// Read by every thread at spawn time; fixed before the first start.
    pub cpu_pinning: bool,
    pub threads: Vec<ThreadPlan>,
}

fn rt(app_id: u32, policy: SchedPolicy) -> ThreadPlan {
    ThreadPlan::Rt(RtThreadConfig::new(app_id, RT_PRIORITY, policy))
}

fn nrt(app_id: u32) -> ThreadPlan {
    ThreadPlan::Nrt { app_id }
}

impl Experiment {
    pub const COUNT: u32 = 6;

    pub fn lookup(id: i64) -> Result<Self, ExperimentError> {
        use SchedPolicy::{Fifo, RoundRobin};

        let (summary, cpu_pinning, threads) = match id {
            0 => ("One RT app and one NRT app", false, vec![rt(1, Fifo), nrt(2)]),
            1 => (
                "One RT app and two NRT apps, pinned",
                true,
                vec![rt(1, Fifo), nrt(2), nrt(3)],
            ),
            2 => (
                "One RT app and two NRT apps, unpinned",
                false,
                vec![rt(1, Fifo), nrt(2), nrt(3)],
            ),
            3 => (
                "Two FIFO RT apps of equal priority and one NRT app, pinned",
                true,
                vec![rt(1, Fifo), rt(2, Fifo), nrt(3)],
            ),
            4 => (
                "Two RR RT apps of equal priority and one NRT app, pinned",
                true,
                vec![rt(1, RoundRobin), rt(2, RoundRobin), nrt(3)],
            ),
            5 => (
                "Two FIFO RT apps of equal priority and one NRT app, unpinned",
                false,
                vec![rt(1, Fifo), rt(2, Fifo), nrt(3)],
            ),
            other => return Err(ExperimentError::Unrecognized(other)),
        };

        Ok(Self { id: id as u32, summary, cpu_pinning, threads })
    }

    pub fn all() -> Vec<Self> {
        (0..i64::from(Self::COUNT)).filter_map(|id| Self::lookup(id).ok()).collect()
    }

    /// Same topology with every RT thread downgraded to `SCHED_OTHER` priority 0.
    pub fn without_realtime(mut self) -> Self {
        for plan in &mut self.threads {
            if let ThreadPlan::Rt(config) = plan {
                config.policy = SchedPolicy::Default;
                config.priority = 0;
            }
        }
        self
    }

    pub fn placement(&self, pin_cpu: usize) -> Placement {
        if self.cpu_pinning {
            Placement::Pinned(pin_cpu)
        } else {
            Placement::Floating
        }
    }

    /// Locks memory (unless disabled), then runs the experiment with the
    /// stock workloads.
    pub fn run(&self, settings: &RunSettings) -> Result<ExperimentOutcome, ExperimentError> {
        let lock = || {
            if settings.lock_memory {
                lock_all_memory()
            } else {
                warn!("Memory locking skipped; page faults may distort timings.");
                Ok(())
            }
        };
        self.run_with(settings.pin_cpu, lock, |plan| settings.workload_for(plan))
    }

    /// Runs the experiment with an explicit lock routine and workload source.
    ///
    /// Every thread is started in table order before any is joined; joins
    /// also follow table order. A thread that fails to start is recorded and
    /// skipped, the rest still run.
    ///
    /// # Errors
    /// [`ExperimentError::MemoryLock`] if `lock` fails. No thread is started.
    pub fn run_with<L, W>(
        &self,
        pin_cpu: usize,
        lock: L,
        mut workload_for: W,
    ) -> Result<ExperimentOutcome, ExperimentError>
    where
        L: FnOnce() -> Result<(), PlatformError>,
        W: FnMut(&ThreadPlan) -> Workload,
    {
        lock().map_err(ExperimentError::MemoryLock)?;

        let placement = self.placement(pin_cpu);
        info!("Experiment {}: {} ({:?})", self.id, self.summary, placement);

        let started: Vec<Result<RunningThread, ThreadError>> = self
            .threads
            .iter()
            .map(|plan| {
                let workload = workload_for(plan);
                let result = match plan {
                    ThreadPlan::Rt(config) => {
                        RtThread::new(*config, workload).start(placement)
                    }
                    ThreadPlan::Nrt { app_id } => {
                        NrtThread::new(*app_id, workload).start(placement)
                    }
                };
                if let Err(err) = &result {
                    warn!("{}. Continuing without it.", err);
                }
                result
            })
            .collect();

        let results = started
            .into_iter()
            .map(|running| running.and_then(RunningThread::join))
            .collect();

        Ok(ExperimentOutcome { experiment_id: self.id, results })
    }
}

/// Per-thread results in table order.
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub experiment_id: u32,
    pub results: Vec<Result<ThreadReport, ThreadError>>,
}

impl ExperimentOutcome {
    pub fn reports(&self) -> impl Iterator<Item = &ThreadReport> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ThreadError> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }

    pub fn is_complete(&self) -> bool {
        self.results.iter().all(Result::is_ok)
    }
}
