//! JSON output formatting
//!
//! A `RunReport` captures one coordinator run: when it started and ended,
//! the coordinator's counters, every provider notification in arrival order,
//! and (for in-process workers) what each worker loop did.

use crate::config::cli::ExecutionMode;
use crate::coordinator::CoordinatorStats;
use crate::distributed::WorkerSummary;
use crate::provider::ProviderEvent;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = format_duration_human(d);
        Self { micros, human }
    }
}

/// Complete record of a coordinator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport<R> {
    pub version: String,
    pub hostname: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: JsonDuration,
    pub stats: CoordinatorStats,
    pub events: Vec<ProviderEvent<R>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<WorkerSummary>,
}

impl<R> RunReport<R> {
    /// Assemble a report, stamping it with the current time as `finished_at`
    pub fn new(
        mode: ExecutionMode,
        started_at: DateTime<Utc>,
        stats: CoordinatorStats,
        events: Vec<ProviderEvent<R>>,
    ) -> Self {
        let finished_at = Utc::now();
        let elapsed = (finished_at - started_at).to_std().unwrap_or_default();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: local_hostname(),
            mode: mode_name(mode).to_string(),
            started_at,
            finished_at,
            elapsed: JsonDuration::from_duration(elapsed),
            stats,
            events,
            workers: Vec::new(),
        }
    }

    pub fn with_workers(mut self, workers: Vec<WorkerSummary>) -> Self {
        self.workers = workers;
        self
    }

    /// Values delivered through `add_result`
    pub fn results(&self) -> impl Iterator<Item = &R> {
        self.events.iter().filter_map(|e| match e {
            ProviderEvent::Result { value } => Some(value),
            _ => None,
        })
    }

    /// `(description, error)` pairs delivered through `add_crash`
    pub fn crashes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events.iter().filter_map(|e| match e {
            ProviderEvent::Crash { description, error } => {
                Some((description.as_str(), error.as_str()))
            }
            _ => None,
        })
    }
}

/// Write a report to `output_path`
pub fn write_json_output<R: Serialize>(
    output_path: &Path,
    report: &RunReport<R>,
    pretty: bool,
) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}

pub(crate) fn mode_name(mode: ExecutionMode) -> &'static str {
    match mode {
        ExecutionMode::Standalone => "standalone",
        ExecutionMode::Coordinator => "coordinator",
        ExecutionMode::Worker => "worker",
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Format duration in human-readable format
pub(crate) fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_report() -> RunReport<Value> {
        let stats = CoordinatorStats {
            submitted: 3,
            dispatched: 3,
            hedged: 1,
            results: 2,
            crashes: 1,
            duplicates: 1,
        };
        let events = vec![
            ProviderEvent::Result { value: Value::from(6) },
            ProviderEvent::Crash {
                description: "Task x (fail:boom) failed".to_string(),
                error: "boom".to_string(),
            },
            ProviderEvent::Result { value: Value::from("a") },
            ProviderEvent::Done,
        ];
        RunReport::new(ExecutionMode::Standalone, Utc::now(), stats, events)
    }

    #[test]
    fn test_format_duration_human() {
        assert_eq!(format_duration_human(Duration::ZERO), "0µs");
        assert_eq!(format_duration_human(Duration::from_micros(250)), "250µs");
        assert_eq!(format_duration_human(Duration::from_millis(5)), "5.000ms");
        assert_eq!(format_duration_human(Duration::from_secs(2)), "2.000s");
        assert_eq!(format_duration_human(Duration::from_secs(90)), "1.50m");
    }

    #[test]
    fn test_report_accessors() {
        let report = sample_report();
        assert_eq!(report.mode, "standalone");
        assert!(report.finished_at >= report.started_at);
        assert_eq!(report.results().count(), 2);
        assert_eq!(report.crashes().collect::<Vec<_>>(), vec![("Task x (fail:boom) failed", "boom")]);
    }

    #[test]
    fn test_write_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = sample_report().with_workers(vec![WorkerSummary {
            worker_id: "host-0".to_string(),
            executed: 3,
            failed: 1,
            idle_polls: 0,
            lost_reports: 0,
        }]);

        write_json_output(&path, &report, true).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["stats"]["submitted"], 3);
        assert_eq!(written["events"][0]["event"], "result");
        assert_eq!(written["events"][1]["event"], "crash");
        assert_eq!(written["events"][3]["event"], "done");
        assert_eq!(written["workers"][0]["worker_id"], "host-0");

        let back: RunReport<Value> = serde_json::from_value(written).unwrap();
        assert_eq!(back.stats, report.stats);
        assert_eq!(back.events, report.events);
    }

    #[test]
    fn test_workers_omitted_when_empty() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert!(json.get("workers").is_none());
    }

    #[test]
    fn test_write_json_output_bad_path() {
        let report = sample_report();
        assert!(write_json_output(Path::new("/nonexistent/dir/report.json"), &report, false).is_err());
    }
}
