/// Writes the CSV reports and the run summary to disk.
pub mod formatter;
/// Builds a Markdown summary of a finished run.
pub mod report;
