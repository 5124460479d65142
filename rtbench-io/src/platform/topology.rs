use log::{info, warn};

use super::affinity::current_affinity;

/// CPU layout of the host as far as benchmark placement is concerned.
pub struct SystemTopology {
    online_cpus: usize,
    usable_cores: Vec<usize>,
}

impl SystemTopology {
    /// Detects online CPUs and the cores this process may be scheduled on.
    pub fn detect() -> Self {
        // SAFETY: sysconf with a valid name has no side effects.
        let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };

        let online_cpus = if count <= 0 {
            warn!("Failed to detect CPU count via sysconf. Fallback to 1.");
            1
        } else {
            count as usize
        };

        // core_affinity reads the process mask, so cpusets and `taskset` are honoured.
        let mut usable_cores: Vec<usize> = core_affinity::get_core_ids()
            .unwrap_or_default()
            .into_iter()
            .map(|core| core.id)
            .collect();
        usable_cores.sort_unstable();

        if usable_cores.is_empty() {
            usable_cores = current_affinity().unwrap_or_else(|err| {
                warn!("{}; assuming CPUs 0..{} are usable.", err, online_cpus);
                (0..online_cpus).collect()
            });
        }

        Self { online_cpus, usable_cores }
    }

    pub fn has_cpu(&self, cpu: usize) -> bool {
        self.usable_cores.binary_search(&cpu).is_ok()
    }

    /// Single-CPU hosts serialise every experiment, pinned or not.
    pub fn is_uniprocessor(&self) -> bool {
        self.usable_cores.len() <= 1
    }

    pub fn print_summary(&self) {
        info!(
            "Topology Discovery: {} CPUs online, usable cores {:?}.",
            self.online_cpus, self.usable_cores
        );
        if self.is_uniprocessor() {
            warn!("Only one usable CPU: pinned and unpinned experiments will behave alike.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_reports_current_cpu() {
        let topology = SystemTopology::detect();
        assert!(topology.online_cpus >= 1);
        assert!(!topology.usable_cores.is_empty());

        let allowed = current_affinity().unwrap();
        assert_eq!(topology.usable_cores, allowed);
        assert!(topology.has_cpu(allowed[0]));
        assert!(!topology.has_cpu(crate::platform::affinity::max_cpus()));
    }
}
