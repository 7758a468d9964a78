use std::fmt::{self, Write};

use crate::pipeline::orchestrator::LineageReports;

/// How many routines the summary lists under the error ranking.
pub const TOP_ERROR_ROUTINES: usize = 10;

/// Build a markdown summary with run counters and the routines with the
/// most syntax errors.
pub fn build_summary(reports: &LineageReports) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let stats = &reports.stats;

    writeln!(out, "# Stored Procedure Lineage Summary")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|--------|-------|")?;
    writeln!(out, "| Routines processed | {} |", stats.routines_completed)?;
    writeln!(out, "| Routines skipped (no definition) | {} |", stats.routines_skipped)?;
    writeln!(out, "| Table references | {} |", reports.tables_used.rows.len())?;
    writeln!(out, "| Portfolio code references | {} |", reports.portfolio_codes.rows.len())?;
    writeln!(out, "| Syntax errors | {} |", reports.error_counts.total())?;
    writeln!(out, "| Routines with syntax errors | {} |", reports.error_counts.counts.len())?;

    writeln!(out)?;
    writeln!(out, "## Syntax Errors")?;
    writeln!(out)?;
    let ranked = worst_routines(reports, TOP_ERROR_ROUTINES);
    if ranked.is_empty() {
        writeln!(out, "No syntax errors recorded.")?;
        return Ok(out);
    }
    writeln!(out, "| Stored Procedure | Errors |")?;
    writeln!(out, "|------------------|--------|")?;
    for (routine, count) in ranked {
        writeln!(out, "| {routine} | {count} |")?;
    }
    Ok(out)
}

/// Routines ordered by error count (descending), ties by name.
fn worst_routines(reports: &LineageReports, limit: usize) -> Vec<(&str, usize)> {
    let mut ranked: Vec<(&str, usize)> = reports
        .error_counts
        .counts
        .iter()
        .map(|(routine, count)| (routine.as_str(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_run_says_so() {
        let summary = build_summary(&LineageReports::default()).unwrap();
        assert!(summary.starts_with("# Stored Procedure Lineage Summary\n"));
        assert!(summary.contains("| Syntax errors | 0 |"));
        assert!(summary.ends_with("No syntax errors recorded.\n"));
    }

    #[test]
    fn error_ranking_is_by_count_then_name() {
        let mut reports = LineageReports::default();
        for (routine, count) in [("usp_b", 1), ("usp_a", 1), ("usp_c", 4)] {
            reports.error_counts.counts.insert(routine.to_string(), count);
        }
        assert_eq!(
            worst_routines(&reports, 2),
            vec![("usp_c", 4), ("usp_a", 1)]
        );
    }
}
