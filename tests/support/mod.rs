#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use sproc_lineage::catalog::Catalog;
use sproc_lineage::error::LineageError;
use sproc_lineage::facts::Fact;
use sproc_lineage::parser::events::{ParseListener, RoutineParser, SyntaxError, TreeEvent};
use sproc_lineage::pipeline::orchestrator::LineageReports;

pub(crate) fn fixture_dir(fixture: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(fixture)
}

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("should create temp dir");
    dir
}

pub(crate) fn catalog(tables: &[&str], codes: &[&str]) -> Catalog {
    Catalog::new(tables.iter().copied(), codes.iter().copied())
}

/// Parser that replays a line-based script instead of reading SQL.
///
/// One directive per line:
///
/// ```text
/// table  <raw name>
/// alias  <raw alias>
/// ident  <identifier>
/// literal <token>
/// error  <line> <column> <message>
/// end
/// ```
///
/// Blank lines are ignored. `end` is not implied: a script without it lets
/// tests exercise a parser that forgets end-of-input.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ScriptedParser;

impl RoutineParser for ScriptedParser {
    fn parse(&self, source: &str, listener: &mut dyn ParseListener) -> Result<(), LineageError> {
        for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (directive, rest) = line.split_once(' ').unwrap_or((line, ""));
            let rest = rest.trim().to_string();
            match directive {
                "table" => listener.on_event(TreeEvent::EnterTableName(rest))?,
                "alias" => listener.on_event(TreeEvent::EnterTableAlias(rest))?,
                "ident" => listener.on_event(TreeEvent::EnterIdentifier(rest))?,
                "literal" => listener.on_event(TreeEvent::EnterLiteral(rest))?,
                "end" => listener.on_event(TreeEvent::EndOfInput)?,
                "error" => {
                    let mut parts = rest.splitn(3, ' ');
                    let line = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
                    let column = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
                    let message = parts.next().unwrap_or_default().to_string();
                    listener.on_syntax_error(SyntaxError {
                        line,
                        column,
                        message,
                    })?;
                }
                other => panic!("unknown script directive '{other}'"),
            }
        }
        Ok(())
    }
}

/// Sorted (routine, table) pairs of a report.
pub(crate) fn table_pairs(reports: &LineageReports) -> Vec<(String, String)> {
    let mut rows = reports.tables_used.rows.clone();
    rows.sort();
    rows
}

/// Sorted (routine, code) pairs of a report.
pub(crate) fn code_pairs(reports: &LineageReports) -> Vec<(String, String)> {
    let mut rows = reports.portfolio_codes.rows.clone();
    rows.sort();
    rows
}

pub(crate) fn pair(routine: &str, value: &str) -> (String, String) {
    (routine.to_string(), value.to_string())
}

pub(crate) fn tables_of(facts: &[Fact]) -> Vec<String> {
    facts
        .iter()
        .filter_map(|fact| match fact {
            Fact::TableUsed { table, .. } => Some(table.clone()),
            _ => None,
        })
        .collect()
}

pub(crate) fn codes_of(facts: &[Fact]) -> Vec<String> {
    facts
        .iter()
        .filter_map(|fact| match fact {
            Fact::PortfolioReferenced { code, .. } => Some(code.clone()),
            _ => None,
        })
        .collect()
}
