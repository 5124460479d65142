use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use rtbench_core::{Experiment, ExperimentError};
use rtbench_io::SystemTopology;

mod config;

use config::{Args, OutputFormat};

const DEFAULT_EXP_ID: i64 = 0;
const DEFAULT_ID_NOTICE: &str = "default exp_id=0";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stdout = io::stdout();
    run(&args, &mut stdout.lock())
}

fn run(args: &Args, out: &mut impl Write) -> Result<()> {
    if args.list {
        for experiment in Experiment::all() {
            writeln!(
                out,
                "{}: {} [{} threads{}]",
                experiment.id,
                experiment.summary,
                experiment.threads.len(),
                if experiment.cpu_pinning { ", pinned" } else { "" }
            )?;
        }
        return Ok(());
    }

    let exp_id = requested_id(args);

    // Unknown ids are a user mistake, not a failed run.
    let experiment = match Experiment::lookup(exp_id) {
        Ok(experiment) => experiment,
        Err(err @ ExperimentError::Unrecognized(_)) => {
            writeln!(out, "ERROR: {}", err)?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let experiment = if args.no_rt {
        info!("--no-rt: RT threads downgraded to SCHED_OTHER.");
        experiment.without_realtime()
    } else {
        experiment
    };

    let topology = SystemTopology::detect();
    topology.print_summary();
    if experiment.cpu_pinning && !topology.has_cpu(args.cpu) {
        warn!(
            "CPU {} is not usable by this process; pinning will fail and threads will float.",
            args.cpu
        );
    }

    let outcome = experiment
        .run(&args.settings())
        .with_context(|| format!("Experiment {} aborted", experiment.id))?;

    for report in outcome.reports() {
        match args.format {
            OutputFormat::Text => writeln!(out, "{}", report)?,
            OutputFormat::Json => writeln!(out, "{}", report.to_record().to_json()?)?,
        }
    }
    for err in outcome.failures() {
        error!("{}", err);
    }

    if !outcome.is_complete() {
        warn!(
            "Experiment {} finished with {} of {} threads reporting.",
            outcome.experiment_id,
            outcome.reports().count(),
            outcome.results.len()
        );
    }
    Ok(())
}

fn requested_id(args: &Args) -> i64 {
    args.exp_id.unwrap_or_else(|| {
        warn!("{}", DEFAULT_ID_NOTICE);
        DEFAULT_EXP_ID
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(extra: &[&str]) -> Args {
        let mut argv = vec![
            "rtbench",
            "--no-rt",
            "--skip-mlock",
            "--busy-iterations",
            "1000",
            "--image-size",
            "32",
            "--canny-passes",
            "1",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn output_of(args: &Args) -> String {
        let mut out = Vec::new();
        run(args, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_unknown_experiment_prints_single_error() {
        let out = output_of(&quick(&["99"]));
        assert_eq!(out, "ERROR: exp_id 99 NOT FOUND\n");
    }

    #[test]
    fn test_missing_id_falls_back_to_zero() {
        assert_eq!(requested_id(&quick(&[])), 0);
        assert_eq!(requested_id(&quick(&["4"])), 4);
        // The logger already tags the level.
        assert!(!DEFAULT_ID_NOTICE.to_ascii_uppercase().contains("WARN"));
        assert!(DEFAULT_ID_NOTICE.ends_with(&format!("exp_id={}", DEFAULT_EXP_ID)));
    }

    #[test]
    fn test_default_experiment_reports_two_apps() {
        let out = output_of(&quick(&[]));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2, "{}", out);
        assert!(lines[0].starts_with("[RT thread #"));
        assert!(lines[0].contains("App #1 Ends; Elapsed time:"));
        assert!(lines[1].starts_with("[NRT thread #"));
        assert!(lines[1].contains("App #2 Ends"));
    }

    #[test]
    fn test_experiment_3_json_reports() {
        let out = output_of(&quick(&["3", "--format", "json"]));
        let apps: Vec<u64> = out
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                assert_ne!(value["affinity"], "floating");
                value["app_id"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(apps, vec![1, 2, 3]);
    }

    #[test]
    fn test_list_prints_every_experiment() {
        let out = output_of(&Args::parse_from(["rtbench", "--list"]));
        assert_eq!(out.lines().count(), 6);
        assert!(out.contains("4: Two RR RT apps"));
    }
}
