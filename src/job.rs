//! Built-in jobs for the taskpull binary
//!
//! Jobs come from the `[[jobs]]` array of a TOML config file or from inline
//! specs on the command line:
//!
//! | Spec                 | Job                                   |
//! |----------------------|---------------------------------------|
//! | `echo:hello`         | returns `"hello"`                     |
//! | `sum:1,2,3`          | returns `6`                           |
//! | `sleep:250:tick`     | sleeps 250 ms, returns `"tick"`       |
//! | `fail:disk on fire`  | fails with the given message          |
//! | `lines:/etc/hosts`   | returns the file's line count         |

use crate::task::Computation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on `sleep` jobs
pub const MAX_SLEEP_MS: u64 = 3_600_000;

/// A built-in unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Return `value` unchanged
    Echo { value: String },
    /// Add up `values`
    Sum { values: Vec<i64> },
    /// Sleep, then return `value`
    Sleep { millis: u64, value: String },
    /// Always fail with `message`
    Fail { message: String },
    /// Count lines in a file on the worker's filesystem
    LineCount { path: PathBuf },
}

impl Job {
    /// Check a job before it is queued
    pub fn validate(&self) -> Result<()> {
        match self {
            Job::Sleep { millis, .. } if *millis > MAX_SLEEP_MS => {
                anyhow::bail!("sleep job must be at most {} ms, got {}", MAX_SLEEP_MS, millis)
            }
            Job::LineCount { path } if path.as_os_str().is_empty() => {
                anyhow::bail!("lines job requires a path")
            }
            _ => Ok(()),
        }
    }
}

impl Computation for Job {
    type Output = Value;

    fn compute(&self) -> Result<Value> {
        match self {
            Job::Echo { value } => Ok(Value::from(value.clone())),
            Job::Sum { values } => {
                let total = values
                    .iter()
                    .try_fold(0i64, |acc, v| acc.checked_add(*v))
                    .context("sum overflowed i64")?;
                Ok(Value::from(total))
            }
            Job::Sleep { millis, value } => {
                std::thread::sleep(Duration::from_millis(*millis));
                Ok(Value::from(value.clone()))
            }
            Job::Fail { message } => anyhow::bail!("{}", message),
            Job::LineCount { path } => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(Value::from(contents.lines().count() as u64))
            }
        }
    }

    fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Echo { value } => write!(f, "echo:{}", value),
            Job::Sum { values } => {
                let joined: Vec<String> = values.iter().map(i64::to_string).collect();
                write!(f, "sum:{}", joined.join(","))
            }
            Job::Sleep { millis, value } => write!(f, "sleep:{}:{}", millis, value),
            Job::Fail { message } => write!(f, "fail:{}", message),
            Job::LineCount { path } => write!(f, "lines:{}", path.display()),
        }
    }
}

impl FromStr for Job {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, rest) = s
            .split_once(':')
            .with_context(|| format!("Invalid job spec '{}': expected <kind>:<args>", s))?;

        let job = match kind.trim().to_lowercase().as_str() {
            "echo" => Job::Echo {
                value: rest.to_string(),
            },
            "sum" => {
                let values = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| {
                        v.parse::<i64>()
                            .with_context(|| format!("Invalid number in sum job: {}", v))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Job::Sum { values }
            }
            "sleep" => {
                let (millis, value) = rest.split_once(':').unwrap_or((rest, ""));
                let millis = millis
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid sleep duration: {}", millis))?;
                Job::Sleep {
                    millis,
                    value: value.to_string(),
                }
            }
            "fail" => Job::Fail {
                message: rest.to_string(),
            },
            "lines" => Job::LineCount {
                path: PathBuf::from(rest),
            },
            other => anyhow::bail!("Unknown job kind '{}'. Use echo, sum, sleep, fail, or lines", other),
        };

        job.validate()?;
        Ok(job)
    }
}
