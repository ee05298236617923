//! Configuration validation

use super::*;
use anyhow::{Context, Result};

/// Most worker loops one process may run
pub const MAX_WORKERS: usize = 1024;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_coordinator(&config.coordinator)?;
    validate_worker(&config.worker)?;
    validate_jobs(&config.jobs)?;

    Ok(())
}

/// Validate coordinator settings
pub fn validate_coordinator(coordinator: &CoordinatorConfig) -> Result<()> {
    validate_address(&coordinator.listen).context("Invalid coordinator listen address")?;
    Ok(())
}

/// Validate worker settings
pub fn validate_worker(worker: &WorkerConfig) -> Result<()> {
    validate_address(&worker.connect).context("Invalid coordinator address for workers")?;

    if worker.workers == 0 || worker.workers > MAX_WORKERS {
        anyhow::bail!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS,
            worker.workers
        );
    }

    if worker.poll_interval_ms == 0 {
        anyhow::bail!("poll_interval must be greater than zero");
    }

    Ok(())
}

/// Validate every job
pub fn validate_jobs(jobs: &[Job]) -> Result<()> {
    for (i, job) in jobs.iter().enumerate() {
        job.validate()
            .with_context(|| format!("jobs[{}] ({}) is invalid", i, job))?;
    }
    Ok(())
}

/// Check that an address has the `host:port` shape
fn validate_address(addr: &str) -> Result<()> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("'{}' must be host:port", addr))?;

    if host.is_empty() {
        anyhow::bail!("'{}' is missing a host", addr);
    }

    port.parse::<u16>()
        .with_context(|| format!("'{}' has an invalid port", addr))?;

    Ok(())
}
