use clap::{Parser, ValueEnum};
use rtbench_core::RunSettings;
use rtbench_io::DEFAULT_CPU;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// RT vs non-RT thread interference benchmark.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Experiment id (0-5). Defaults to 0.
    #[arg(allow_negative_numbers = true)]
    pub exp_id: Option<i64>,

    /// CPU that pinned experiments bind their threads to.
    #[arg(long, default_value_t = DEFAULT_CPU)]
    pub cpu: usize,

    #[arg(long, default_value_t = 400_000_000)]
    pub busy_iterations: u64,

    #[arg(long, default_value_t = 1024)]
    pub image_size: usize,

    #[arg(long, default_value_t = 20)]
    pub canny_passes: u32,

    /// Run RT threads under SCHED_OTHER priority 0 (no privileges needed).
    #[arg(long)]
    pub no_rt: bool,

    /// Do not lock memory. Timings may include page-fault latency.
    #[arg(long)]
    pub skip_mlock: bool,

    /// Print the experiment table and exit.
    #[arg(long)]
    pub list: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Args {
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            pin_cpu: self.cpu,
            busy_iterations: self.busy_iterations,
            image_size: self.image_size,
            canny_passes: self.canny_passes,
            lock_memory: !self.skip_mlock,
        }
    }
}
