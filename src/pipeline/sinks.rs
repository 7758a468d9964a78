use std::collections::BTreeMap;

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::facts::{Fact, FactKind};

/// Column headers of the tables-used report.
pub const TABLES_USED_HEADERS: [&str; 2] = ["Stored Procedure", "Table Used"];
/// Column headers of the portfolio-codes report.
pub const PORTFOLIO_CODES_HEADERS: [&str; 2] = ["Stored Procedure", "Portfolio Code Mentioned"];
/// Column headers of the error-counts report.
pub const ERROR_COUNTS_HEADERS: [&str; 2] = ["Stored Procedure", "Error Count"];

/// A finalized two-column report.
pub trait TabularReport {
    /// Column headers.
    fn headers(&self) -> [&'static str; 2];
    /// Data rows in output order.
    fn rows(&self) -> Vec<[String; 2]>;
}

/// Single-consumer accumulator turning one fact stream into a report.
///
/// `finalize` takes the sink by value, so a report is produced at most once.
pub trait FactSink: Send {
    /// Report produced on finalization.
    type Report;
    /// Fact kind this sink accepts.
    const KIND: FactKind;
    /// Accumulate one fact.
    fn consume(&mut self, fact: Fact);
    /// Produce the report.
    fn finalize(self) -> Self::Report;
}

/// Feed every fact from `rx` into `sink` and finalize once the channel closes.
pub fn drain<S: FactSink>(mut sink: S, rx: Receiver<Fact>) -> S::Report {
    let mut received = 0usize;
    for fact in rx {
        sink.consume(fact);
        received += 1;
    }
    info!(sink = S::KIND.label(), facts = received, "fact stream closed");
    sink.finalize()
}

/// (routine, table) pairs in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablesUsedReport {
    /// Rows as received.
    pub rows: Vec<(String, String)>,
}

impl TabularReport for TablesUsedReport {
    fn headers(&self) -> [&'static str; 2] {
        TABLES_USED_HEADERS
    }

    fn rows(&self) -> Vec<[String; 2]> {
        self.rows
            .iter()
            .map(|(routine, table)| [routine.clone(), table.clone()])
            .collect()
    }
}

/// (routine, code) pairs in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortfolioCodesReport {
    /// Rows as received.
    pub rows: Vec<(String, String)>,
}

impl TabularReport for PortfolioCodesReport {
    fn headers(&self) -> [&'static str; 2] {
        PORTFOLIO_CODES_HEADERS
    }

    fn rows(&self) -> Vec<[String; 2]> {
        self.rows
            .iter()
            .map(|(routine, code)| [routine.clone(), code.clone()])
            .collect()
    }
}

/// Syntax error count per routine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCountsReport {
    /// Routine name to number of syntax errors.
    pub counts: BTreeMap<String, usize>,
}

impl ErrorCountsReport {
    /// Total syntax errors across routines.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl TabularReport for ErrorCountsReport {
    fn headers(&self) -> [&'static str; 2] {
        ERROR_COUNTS_HEADERS
    }

    fn rows(&self) -> Vec<[String; 2]> {
        self.counts
            .iter()
            .map(|(routine, count)| [routine.clone(), count.to_string()])
            .collect()
    }
}

/// Collects [`Fact::TableUsed`].
#[derive(Debug, Default)]
pub struct TablesUsedSink {
    report: TablesUsedReport,
}

impl FactSink for TablesUsedSink {
    type Report = TablesUsedReport;
    const KIND: FactKind = FactKind::TableUsed;

    fn consume(&mut self, fact: Fact) {
        match fact {
            Fact::TableUsed { routine, table } => self.report.rows.push((routine, table)),
            other => debug!(fact = ?other, "tables sink ignored misrouted fact"),
        }
    }

    fn finalize(self) -> TablesUsedReport {
        self.report
    }
}

/// Collects [`Fact::PortfolioReferenced`].
#[derive(Debug, Default)]
pub struct PortfolioSink {
    report: PortfolioCodesReport,
}

impl FactSink for PortfolioSink {
    type Report = PortfolioCodesReport;
    const KIND: FactKind = FactKind::PortfolioReferenced;

    fn consume(&mut self, fact: Fact) {
        match fact {
            Fact::PortfolioReferenced { routine, code } => self.report.rows.push((routine, code)),
            other => debug!(fact = ?other, "portfolio sink ignored misrouted fact"),
        }
    }

    fn finalize(self) -> PortfolioCodesReport {
        self.report
    }
}

/// Counts [`Fact::ParseError`] per routine; message text is dropped.
#[derive(Debug, Default)]
pub struct ErrorSink {
    report: ErrorCountsReport,
}

impl FactSink for ErrorSink {
    type Report = ErrorCountsReport;
    const KIND: FactKind = FactKind::ParseError;

    fn consume(&mut self, fact: Fact) {
        match fact {
            Fact::ParseError { routine, .. } => *self.report.counts.entry(routine).or_default() += 1,
            other => debug!(fact = ?other, "error sink ignored misrouted fact"),
        }
    }

    fn finalize(self) -> ErrorCountsReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn table(routine: &str, table: &str) -> Fact {
        Fact::TableUsed {
            routine: routine.to_string(),
            table: table.to_string(),
        }
    }

    #[test]
    fn tables_sink_keeps_cross_routine_duplicates_in_arrival_order() {
        let mut sink = TablesUsedSink::default();
        sink.consume(table("b", "TRADES"));
        sink.consume(table("a", "TRADES"));
        let report = sink.finalize();
        assert_eq!(
            report.rows,
            vec![
                ("b".to_string(), "TRADES".to_string()),
                ("a".to_string(), "TRADES".to_string()),
            ]
        );
    }

    #[test]
    fn error_sink_counts_per_routine_and_drops_messages() {
        let mut sink = ErrorSink::default();
        for (routine, message) in [("a", "x"), ("b", "y"), ("a", "z")] {
            sink.consume(Fact::ParseError {
                routine: routine.to_string(),
                message: message.to_string(),
            });
        }
        let report = sink.finalize();
        assert_eq!(report.total(), 3);
        assert_eq!(
            report.rows(),
            vec![
                ["a".to_string(), "2".to_string()],
                ["b".to_string(), "1".to_string()],
            ]
        );
    }

    #[test]
    fn drain_finalizes_only_after_channel_closes() {
        let (tx, rx) = bounded(1);
        let handle = std::thread::spawn(move || drain(PortfolioSink::default(), rx));
        for code in ["AAA", "AAB", "ZZZ"] {
            tx.send(Fact::PortfolioReferenced {
                routine: "r".to_string(),
                code: code.to_string(),
            })
            .unwrap();
        }
        drop(tx);
        let report = handle.join().expect("sink thread should not panic");
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.headers(), PORTFOLIO_CODES_HEADERS);
    }
}
