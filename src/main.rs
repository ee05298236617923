//! taskpull CLI entry point

use anyhow::{Context, Result};
use taskpull::config::cli::{Cli, ExecutionMode};
use taskpull::config::{toml::load_config, validator, Config};
use taskpull::output::{print_summary, write_json_output, RunReport};
use taskpull::runner;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    setup_logging(cli.debug);

    println!("taskpull v{}", env!("CARGO_PKG_VERSION"));
    println!("Pull-based distributed task coordinator");
    println!();

    cli.validate()?;

    let config = load_config(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    print_configuration(cli.mode, &config);
    tracing::debug!("resolved configuration:\n{}", config);

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.mode {
        ExecutionMode::Standalone => {
            let report = runtime.block_on(runner::run_standalone(&config))?;
            finish_report(&report, &config)
        }
        ExecutionMode::Coordinator => {
            let report = runtime.block_on(runner::run_coordinator(&config))?;
            finish_report(&report, &config)
        }
        ExecutionMode::Worker => {
            let summaries = runtime.block_on(runner::run_worker(&config))?;
            println!();
            println!("Coordinator reported completion");
            for summary in &summaries {
                println!(
                    "  {}: {} executed, {} failed, {} idle polls, {} reports lost",
                    summary.worker_id,
                    summary.executed,
                    summary.failed,
                    summary.idle_polls,
                    summary.lost_reports
                );
            }
            Ok(())
        }
    }
}

fn setup_logging(debug: bool) {
    let default = if debug { "taskpull=debug,warn" } else { "taskpull=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_configuration(mode: ExecutionMode, config: &Config) {
    match mode {
        ExecutionMode::Standalone => {
            println!("Mode: standalone");
            println!("  Worker loops: {}", config.worker.workers);
            println!("  Poll interval: {} ms", config.worker.poll_interval_ms);
            println!("  Jobs: {}", config.jobs.len());
        }
        ExecutionMode::Coordinator => {
            println!("Mode: coordinator");
            println!("  Listen: {}", config.coordinator.listen);
            println!("  Linger: {} ms", config.coordinator.linger_ms);
            println!("  Jobs: {}", config.jobs.len());
        }
        ExecutionMode::Worker => {
            println!("Mode: worker");
            println!("  Coordinator: {}", config.worker.connect);
            println!("  Worker loops: {}", config.worker.workers);
            println!("  Poll interval: {} ms", config.worker.poll_interval_ms);
        }
    }

    if mode != ExecutionMode::Worker && config.jobs.is_empty() {
        tracing::warn!("no jobs configured; the run will complete immediately");
    }
}

fn finish_report(report: &RunReport<serde_json::Value>, config: &Config) -> Result<()> {
    println!();
    print_summary(report, config.output.quiet);

    if let Some(ref path) = config.output.json_output {
        write_json_output(path, report, true)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!();
        println!("Report written to {}", path.display());
    }

    Ok(())
}
