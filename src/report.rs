//! Human-readable rendering of results and comparisons
//!
//! Everything renders to a `String`; the binary decides where it goes.

use crate::compare::{format_change, Comparison};
use crate::results::ProfileResults;
use std::fmt::Write;

const KEY_WIDTH: usize = 50;
const BAR_CELLS: usize = 20;
const RULE_WIDTH: usize = 112;

/// Energy with a unit: joules from 1000 mJ up
pub fn format_energy(energy_mj: f64) -> String {
    if energy_mj >= 1000.0 {
        format!("{:.2} J", energy_mj / 1000.0)
    } else {
        format!("{:.1} mJ", energy_mj)
    }
}

/// Time with a unit: seconds from 1000 ms up
pub fn format_time(time_ms: f64) -> String {
    if time_ms >= 1000.0 {
        format!("{:.2} s", time_ms / 1000.0)
    } else {
        format!("{:.1} ms", time_ms)
    }
}

/// Keep the tail of long call-site keys, where the function name is
fn truncate_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= KEY_WIDTH {
        return key.to_string();
    }
    let tail: String = key.chars().skip(len - (KEY_WIDTH - 3)).collect();
    format!("...{}", tail)
}

fn energy_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_CELLS as f64) as usize;
    let filled = filled.min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

/// Per-function table sorted by total energy, with a totals row
pub fn render_table(results: &ProfileResults) -> String {
    let mut out = String::new();

    if results.functions.is_empty() {
        out.push_str("No functions were profiled.\n");
        return out;
    }

    let mut sorted: Vec<_> = results.functions.iter().collect();
    sorted.sort_by(|a, b| b.1.total_energy_mj.total_cmp(&a.1.total_energy_mj));

    let total = results.summary.total_energy_mj;

    let _ = writeln!(out, "\n╔════════════════════════════════════════════════════════════╗");
    let _ = writeln!(
        out,
        "║  Energy Profile (backend: {:<33}║",
        format!("{})", results.metadata.backend)
    );
    let _ = writeln!(out, "╚════════════════════════════════════════════════════════════╝");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<50} {:>8} {:>12} {:>12} {:>12}  {}",
        "Function", "Calls", "Energy (mJ)", "Avg (mJ)", "Time (ms)", "Energy %"
    );
    let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH));

    for (key, f) in sorted {
        let percent = if total > 0.0 {
            f.total_energy_mj / total * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "{:<50} {:>8} {:>12.1} {:>12.1} {:>12.1}  {:>5.1}% {}",
            truncate_key(key),
            f.calls,
            f.total_energy_mj,
            f.avg_energy_mj,
            f.total_time_ms,
            percent,
            energy_bar(percent)
        );
    }

    let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH));
    let _ = writeln!(
        out,
        "{:<50} {:>8} {:>12.1} {:>12} {:>12.1}  {:>5}% {}",
        "TOTAL",
        results.total_calls(),
        total,
        "-",
        results.summary.total_time_ms,
        100,
        energy_bar(100.0)
    );

    let _ = writeln!(out, "\nSummary:");
    let _ = writeln!(out, "  Total Energy: {}", format_energy(total));
    let _ = writeln!(
        out,
        "  Total Time: {}",
        format_time(results.summary.total_time_ms)
    );
    let _ = writeln!(out, "  Functions Profiled: {}", results.summary.function_count);
    let _ = writeln!(out, "  Backend: {}", results.metadata.backend);
    if results.metadata.line_level {
        let _ = writeln!(
            out,
            "  Mode: line-level (calls count statement slices; start/stop overhead included)"
        );
    }

    out
}

/// Side-by-side comparison of two runs
pub fn render_comparison(comparison: &Comparison) -> String {
    let mut out = String::new();
    let threshold = comparison.threshold_percent;

    let _ = writeln!(out, "Energy Profile Comparison");
    let _ = writeln!(out, "\nOverall Change:");
    let _ = writeln!(
        out,
        "  Old Total: {}",
        format_energy(comparison.old_summary.total_energy_mj)
    );
    let _ = writeln!(
        out,
        "  New Total: {}",
        format_energy(comparison.new_summary.total_energy_mj)
    );

    let total = comparison.total_change_percent;
    let verdict = if total > 0.0 {
        "regression"
    } else if total < 0.0 {
        "improvement"
    } else {
        "no change"
    };
    let _ = writeln!(out, "  Change: {} ({})", format_change(total), verdict);

    if !comparison.regressions.is_empty() {
        let _ = writeln!(out, "\nRegressions (>{}% increase):", threshold);
        for key in &comparison.regressions {
            let d = &comparison.changes[key];
            let _ = writeln!(
                out,
                "  {}: {} -> {} ({})",
                key,
                format_energy(d.old_energy_mj),
                format_energy(d.new_energy_mj),
                format_change(d.change_percent)
            );
        }
    }

    if !comparison.improvements.is_empty() {
        let _ = writeln!(out, "\nImprovements (>{}% decrease):", threshold);
        for key in &comparison.improvements {
            let d = &comparison.changes[key];
            let _ = writeln!(
                out,
                "  {}: {} -> {} ({})",
                key,
                format_energy(d.old_energy_mj),
                format_energy(d.new_energy_mj),
                format_change(d.change_percent)
            );
        }
    }

    if comparison.regressions.is_empty() && comparison.improvements.is_empty() {
        let _ = writeln!(out, "\nNo significant changes detected.");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::stats::FunctionStats;
    use std::collections::HashMap;

    fn results(entries: &[(&str, f64)]) -> ProfileResults {
        let mut stats = HashMap::new();
        for (key, energy) in entries {
            let mut s = FunctionStats::new();
            s.update(*energy, 2.0);
            stats.insert(key.to_string(), s);
        }
        ProfileResults::from_stats("mock", false, &stats)
    }

    #[test]
    fn test_format_energy_units() {
        assert_eq!(format_energy(12.34), "12.3 mJ");
        assert_eq!(format_energy(999.9), "999.9 mJ");
        assert_eq!(format_energy(1000.0), "1.00 J");
        assert_eq!(format_energy(2500.0), "2.50 J");
    }

    #[test]
    fn test_format_time_units() {
        assert_eq!(format_time(0.5), "0.5 ms");
        assert_eq!(format_time(1500.0), "1.50 s");
    }

    #[test]
    fn test_truncate_key() {
        assert_eq!(truncate_key("src/lib.rs:main"), "src/lib.rs:main");

        let long = format!("{}:deeply_nested_function", "a/".repeat(40));
        let short = truncate_key(&long);
        assert_eq!(short.chars().count(), KEY_WIDTH);
        assert!(short.starts_with("..."));
        assert!(short.ends_with(":deeply_nested_function"));
    }

    #[test]
    fn test_energy_bar() {
        assert_eq!(energy_bar(0.0), "░".repeat(20));
        assert_eq!(energy_bar(50.0), format!("{}{}", "█".repeat(10), "░".repeat(10)));
        assert_eq!(energy_bar(100.0), "█".repeat(20));
        assert_eq!(energy_bar(250.0), "█".repeat(20));
    }

    #[test]
    fn test_table_sorted_by_energy() {
        let table = render_table(&results(&[("a.rs:cheap", 1.0), ("a.rs:costly", 9.0)]));
        let costly = table.find("a.rs:costly").unwrap();
        let cheap = table.find("a.rs:cheap").unwrap();
        assert!(costly < cheap);
        assert!(table.contains("TOTAL"));
        assert!(table.contains("Total Energy: 10.0 mJ"));
        assert!(table.contains("Backend: mock"));
    }

    #[test]
    fn test_table_empty() {
        let table = render_table(&results(&[]));
        assert_eq!(table, "No functions were profiled.\n");
    }

    #[test]
    fn test_comparison_rendering() {
        let old = results(&[("a.rs:f", 100.0), ("a.rs:g", 100.0)]);
        let new = results(&[("a.rs:f", 200.0), ("a.rs:g", 10.0), ("a.rs:h", 5.0)]);
        let text = render_comparison(&compare(&old, &new));

        assert!(text.contains("Regressions (>10% increase):"));
        assert!(text.contains("a.rs:f: 100.0 mJ -> 200.0 mJ (+100.0%)"));
        assert!(text.contains("a.rs:h: 0.0 mJ -> 5.0 mJ (new)"));
        assert!(text.contains("Improvements (>10% decrease):"));
        assert!(text.contains("(regression)"));
    }

    #[test]
    fn test_comparison_no_changes() {
        let run = results(&[("a.rs:f", 100.0)]);
        let text = render_comparison(&compare(&run, &run));
        assert!(text.contains("No significant changes detected."));
        assert!(text.contains("(no change)"));
    }
}
