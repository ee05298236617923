//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - coordinator plus local workers in one process
    Standalone,
    /// Coordinator mode - serve jobs to remote workers
    Coordinator,
    /// Worker mode - pull jobs from a remote coordinator
    Worker,
}

/// taskpull - pull-based distributed task coordinator
#[derive(Parser, Debug)]
#[command(name = "taskpull")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, or worker
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// Inline job specs (e.g. "echo:hello", "sum:1,2,3", "sleep:100:x", "fail:boom", "lines:/path")
    #[arg(value_name = "JOB")]
    pub jobs: Vec<String>,

    /// TOML configuration file
    #[arg(short = 'c', long, env = "TASKPULL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (coordinator mode)
    #[arg(long)]
    pub listen: Option<String>,

    /// Coordinator address to connect to (worker mode)
    #[arg(long, env = "TASKPULL_COORDINATOR")]
    pub connect: Option<String>,

    /// Number of concurrent worker loops (default: number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Sleep between empty polls (e.g. 200ms, 1s)
    #[arg(long)]
    pub poll_interval: Option<String>,

    /// Keep answering workers this long after completion (e.g. 2s)
    #[arg(long)]
    pub linger: Option<String>,

    /// Write a JSON run report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Only print totals in the summary
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(workers) = self.workers {
            if workers == 0 {
                anyhow::bail!("workers must be at least 1");
            }
        }

        // Workers get their jobs from the coordinator
        if self.mode == ExecutionMode::Worker && !self.jobs.is_empty() {
            anyhow::bail!("job specs are not accepted in worker mode");
        }

        if self.mode == ExecutionMode::Standalone && self.listen.is_some() {
            anyhow::bail!("--listen is only valid in coordinator mode");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("taskpull").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["echo:a"]);
        assert_eq!(cli.mode, ExecutionMode::Standalone);
        assert_eq!(cli.jobs, vec!["echo:a".to_string()]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_worker_mode() {
        let cli = parse(&["--mode", "worker", "--connect", "10.0.0.1:7878", "-w", "4"]);
        assert_eq!(cli.mode, ExecutionMode::Worker);
        assert_eq!(cli.connect.as_deref(), Some("10.0.0.1:7878"));
        assert_eq!(cli.workers, Some(4));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        assert!(parse(&["-w", "0"]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_jobs_in_worker_mode() {
        assert!(parse(&["--mode", "worker", "echo:a"]).validate().is_err());
    }
}
