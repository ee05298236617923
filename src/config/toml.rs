//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the run configuration: TOML file (if any) with CLI overrides on top
pub fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    merge_cli_with_config(cli, config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(ref listen) = cli.listen {
        config.coordinator.listen = listen.clone();
    }
    if let Some(ref linger) = cli.linger {
        config.coordinator.linger_ms = parse_duration_ms(linger)?;
    }

    if let Some(ref connect) = cli.connect {
        config.worker.connect = connect.clone();
    }
    if let Some(workers) = cli.workers {
        config.worker.workers = workers;
    }
    if let Some(ref interval) = cli.poll_interval {
        config.worker.poll_interval_ms = parse_duration_ms(interval)?;
    }

    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }

    // Inline jobs are appended after file jobs, keeping submission order
    for spec in &cli.jobs {
        let job = spec
            .parse()
            .with_context(|| format!("Invalid job spec: {}", spec))?;
        config.jobs.push(job);
    }

    Ok(config)
}

/// Parse duration string (e.g., "250ms", "2s", "1m") to milliseconds
pub fn parse_duration_ms(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else {
        (s, "ms")
    };

    let num: u64 = num_str.trim().parse()
        .with_context(|| format!("Invalid number in duration: {}", num_str))?;

    let millis = match unit {
        "ms" => Some(num),
        "s" => num.checked_mul(1000),
        "m" => num.checked_mul(60_000),
        _ => anyhow::bail!("Invalid duration unit: {}. Use ms, s, or m", unit),
    };
    let millis = millis.with_context(|| format!("Duration overflows: {}", s))?;

    Ok(millis)
}
