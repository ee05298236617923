//! Human-readable text output

use crate::output::json::RunReport;
use std::fmt::Display;

/// Print the run summary to console
///
/// With `quiet` set only the totals are printed; otherwise every result and
/// crash follows in arrival order.
pub fn print_summary<R: Display>(report: &RunReport<R>, quiet: bool) {
    print!("{}", render_summary(report, quiet));
}

/// Render the summary printed by `print_summary`
pub fn render_summary<R: Display>(report: &RunReport<R>, quiet: bool) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════════════════\n");
    out.push_str("                    RUN SUMMARY\n");
    out.push_str("═══════════════════════════════════════════════════════════\n\n");

    out.push_str(&format!("Elapsed Time: {}\n\n", report.elapsed.human));

    out.push_str("Tasks:\n");
    out.push_str(&format!("  Submitted:  {}\n", format_number(stats.submitted)));
    out.push_str(&format!("  Succeeded:  {}\n", format_number(stats.results)));
    out.push_str(&format!("  Crashed:    {}\n", format_number(stats.crashes)));
    if stats.outstanding() > 0 {
        out.push_str(&format!("  Unfinished: {}\n", format_number(stats.outstanding())));
    }
    out.push('\n');

    out.push_str("Dispatch:\n");
    out.push_str(&format!("  First hand-outs: {}\n", format_number(stats.dispatched)));
    out.push_str(&format!("  Hedged:          {}\n", format_number(stats.hedged)));
    out.push_str(&format!("  Duplicates:      {}\n", format_number(stats.duplicates)));

    if !report.workers.is_empty() {
        out.push_str("\nWorkers:\n");
        for worker in &report.workers {
            out.push_str(&format!(
                "  {}: {} executed, {} failed, {} idle polls",
                worker.worker_id, worker.executed, worker.failed, worker.idle_polls
            ));
            if worker.lost_reports > 0 {
                out.push_str(&format!(", {} reports lost", worker.lost_reports));
            }
            out.push('\n');
        }
    }

    if !quiet {
        let results: Vec<_> = report.results().collect();
        if !results.is_empty() {
            out.push_str("\nResults:\n");
            for value in results {
                out.push_str(&format!("  {}\n", value));
            }
        }

        let crashes: Vec<_> = report.crashes().collect();
        if !crashes.is_empty() {
            out.push_str("\nCrashes:\n");
            for (description, error) in crashes {
                out.push_str(&format!("  {}\n    {}\n", description, error));
            }
        }
    }

    out
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::ExecutionMode;
    use crate::coordinator::CoordinatorStats;
    use crate::provider::ProviderEvent;
    use chrono::Utc;

    fn report() -> RunReport<i64> {
        let stats = CoordinatorStats {
            submitted: 2,
            dispatched: 2,
            hedged: 0,
            results: 1,
            crashes: 1,
            duplicates: 0,
        };
        let events = vec![
            ProviderEvent::Result { value: 42 },
            ProviderEvent::Crash {
                description: "Task 1 failed".to_string(),
                error: "disk on fire".to_string(),
            },
            ProviderEvent::Done,
        ];
        RunReport::new(ExecutionMode::Coordinator, Utc::now(), stats, events)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_summary_lists_outcomes() {
        let text = render_summary(&report(), false);
        assert!(text.contains("Submitted:  2"));
        assert!(text.contains("  42\n"));
        assert!(text.contains("disk on fire"));
        assert!(!text.contains("Unfinished"));
    }

    #[test]
    fn test_quiet_summary_has_totals_only() {
        let text = render_summary(&report(), true);
        assert!(text.contains("Crashed:    1"));
        assert!(!text.contains("disk on fire"));
    }
}
