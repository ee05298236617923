//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::job::Job;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Coordinator-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Address the coordinator listens on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// How long to keep answering workers after all work is finished
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

fn default_listen() -> String {
    "0.0.0.0:7878".to_string()
}

fn default_linger_ms() -> u64 {
    2000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            linger_ms: default_linger_ms(),
        }
    }
}

impl CoordinatorConfig {
    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

/// Worker-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Coordinator address workers connect to
    #[serde(default = "default_connect")]
    pub connect: String,
    /// Concurrent worker loops in this process
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Sleep between polls that returned no task
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_connect() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            connect: default_connect(),
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON run report path
    pub json_output: Option<PathBuf>,
    /// Suppress the per-task listing in the text summary
    #[serde(default)]
    pub quiet: bool,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Coordinator:")?;
        writeln!(f, "  Listen: {}", self.coordinator.listen)?;
        writeln!(f, "  Linger: {} ms", self.coordinator.linger_ms)?;
        writeln!(f, "Workers:")?;
        writeln!(f, "  Connect: {}", self.worker.connect)?;
        writeln!(f, "  Loops: {}", self.worker.workers)?;
        writeln!(f, "  Poll interval: {} ms", self.worker.poll_interval_ms)?;
        if let Some(ref path) = self.output.json_output {
            writeln!(f, "Output: {}", path.display())?;
        }
        write!(f, "Jobs: {}", self.jobs.len())
    }
}
