use std::path::{Component, Path, PathBuf};

use crate::error::LineageError;
use crate::output::report;
use crate::pipeline::orchestrator::LineageReports;
use crate::pipeline::sinks::TabularReport;

/// File name of the tables-used report.
pub const TABLES_USED_FILE: &str = "table_sources.csv";
/// File name of the portfolio-codes report.
pub const PORTFOLIO_CODES_FILE: &str = "portfolio_codes.csv";
/// File name of the error-counts report.
pub const ERROR_COUNTS_FILE: &str = "parsing_errors.csv";
/// File name of the markdown run summary.
pub const SUMMARY_FILE: &str = "summary.md";

/// Write the three CSV reports and the summary into `output_dir`, creating it
/// if needed.
pub fn write_reports(output_dir: &Path, reports: &LineageReports) -> Result<(), LineageError> {
    std::fs::create_dir_all(output_dir).map_err(|e| LineageError::Output {
        path: output_dir.to_path_buf(),
        message: format!("failed to create output directory: {e}"),
    })?;

    write_table(&output_dir.join(TABLES_USED_FILE), &reports.tables_used)?;
    write_table(&output_dir.join(PORTFOLIO_CODES_FILE), &reports.portfolio_codes)?;
    write_table(&output_dir.join(ERROR_COUNTS_FILE), &reports.error_counts)?;

    let summary_path = output_dir.join(SUMMARY_FILE);
    let summary = report::build_summary(reports).map_err(|e| LineageError::Output {
        path: summary_path.clone(),
        message: e.to_string(),
    })?;
    std::fs::write(&summary_path, summary).map_err(|e| LineageError::Output {
        path: summary_path.clone(),
        message: e.to_string(),
    })
}

/// Write one report as CSV with CRLF line endings, header row first.
pub fn write_table<R: TabularReport>(path: &Path, report: &R) -> Result<(), LineageError> {
    let output_err = |e: csv::Error| LineageError::Output {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_path(path)
        .map_err(output_err)?;
    writer.write_record(report.headers()).map_err(output_err)?;
    for row in report.rows() {
        writer.write_record(&row).map_err(output_err)?;
    }
    writer.flush().map_err(|e| LineageError::Output {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Dated output directory `<date>_<label>` under `parent`.
pub fn dated_output_dir(parent: &Path, date: &str, label: &str) -> Result<PathBuf, LineageError> {
    validate_label(label)?;
    Ok(parent.join(format!("{date}_{label}")))
}

fn validate_label(label: &str) -> Result<(), LineageError> {
    let invalid = |reason: &str| {
        Err(LineageError::Config(format!(
            "invalid output label '{label}': {reason}"
        )))
    };
    if label.trim().is_empty() {
        return invalid("must not be empty");
    }
    if label.contains('/') || label.contains('\\') {
        return invalid("path separators are not allowed");
    }
    if Path::new(label)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return invalid("traversal segments are not allowed");
    }
    Ok(())
}
