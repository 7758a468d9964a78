use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::LineageConfig;
use crate::error::LineageError;
use crate::extractor::portfolio::{match_portfolio_code, unquote_literal};
use crate::facts::{Fact, FactEmitter};
use crate::parser::events::{ParseListener, SyntaxError, TreeEvent};
use crate::parser::names::{
    is_cross_database, is_temp_table, normalize_table_name, unquote_segment,
};

/// Per-routine accumulator, owned by the worker parsing that routine.
#[derive(Debug, Default)]
struct ExtractionState {
    /// Canonical keys of every table reference seen.
    tables_seen: BTreeSet<String>,
    /// Uppercased canonical forms of declared aliases.
    aliases_seen: HashSet<String>,
    /// Portfolio codes matched so far.
    portfolio_codes_seen: BTreeSet<String>,
}

/// Counts of what one routine produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutineSummary {
    /// `TableUsed` facts emitted.
    pub tables: usize,
    /// `PortfolioReferenced` facts emitted.
    pub portfolio_codes: usize,
    /// `ParseError` facts emitted.
    pub parse_errors: usize,
}

/// Turns one routine's parse events into facts.
///
/// Syntax errors are published as soon as they arrive. Table and portfolio
/// facts are held back until end-of-input, when aliases, temp tables,
/// duplicates and non-whitelisted names can be filtered out.
pub struct Extractor<'a, E: FactEmitter> {
    routine: &'a str,
    catalog: &'a Catalog,
    config: &'a LineageConfig,
    emitter: &'a mut E,
    state: ExtractionState,
    summary: RoutineSummary,
    finished: bool,
}

impl<'a, E: FactEmitter> Extractor<'a, E> {
    /// Start extracting `routine`, publishing into `emitter`.
    pub fn new(
        routine: &'a str,
        catalog: &'a Catalog,
        config: &'a LineageConfig,
        emitter: &'a mut E,
    ) -> Self {
        Self {
            routine,
            catalog,
            config,
            emitter,
            state: ExtractionState::default(),
            summary: RoutineSummary::default(),
            finished: false,
        }
    }

    /// True once end-of-input has been processed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// What has been emitted so far.
    pub fn summary(&self) -> RoutineSummary {
        self.summary
    }

    fn on_table_name(&mut self, raw: &str) -> Result<(), LineageError> {
        let key = normalize_table_name(raw, &self.config.home_database)?;
        if !key.is_empty() {
            self.state.tables_seen.insert(key);
        }
        Ok(())
    }

    fn on_table_alias(&mut self, raw: &str) -> Result<(), LineageError> {
        let alias = normalize_table_name(raw, &self.config.home_database)?;
        if !alias.is_empty() {
            self.state.aliases_seen.insert(alias.to_uppercase());
        }
        Ok(())
    }

    fn on_identifier(&mut self, raw: &str) {
        let id = raw.trim();
        if self.catalog.is_portfolio_code(id) {
            self.state.portfolio_codes_seen.insert(id.to_string());
        }
    }

    fn on_literal(&mut self, raw: &str) {
        let token = unquote_literal(raw);
        let matches = match_portfolio_code(token, self.catalog, self.config.wildcard);
        self.state.portfolio_codes_seen.extend(matches);
    }

    /// Whether a canonical key survives filtering into a `TableUsed` fact.
    fn is_reportable(&self, key: &str) -> bool {
        if is_temp_table(key, &self.config.temp_table_prefix) {
            return false;
        }
        if self.state.aliases_seen.contains(&key.to_uppercase()) {
            return false;
        }
        // Foreign databases bypass the whitelist.
        is_cross_database(key) || self.catalog.is_known_table(unquote_segment(key))
    }

    fn finish(&mut self) -> Result<(), LineageError> {
        let mut emitted = HashSet::new();
        let tables: Vec<String> = self
            .state
            .tables_seen
            .iter()
            .filter(|table| self.is_reportable(table))
            .filter(|table| emitted.insert(table.to_uppercase()))
            .cloned()
            .collect();
        let codes = std::mem::take(&mut self.state.portfolio_codes_seen);

        for table in tables {
            self.emitter.emit(Fact::TableUsed {
                routine: self.routine.to_string(),
                table,
            })?;
            self.summary.tables += 1;
        }
        for code in codes {
            self.emitter.emit(Fact::PortfolioReferenced {
                routine: self.routine.to_string(),
                code,
            })?;
            self.summary.portfolio_codes += 1;
        }
        self.finished = true;
        debug!(
            routine = self.routine,
            tables = self.summary.tables,
            portfolio_codes = self.summary.portfolio_codes,
            parse_errors = self.summary.parse_errors,
            "routine extracted"
        );
        Ok(())
    }
}

impl<E: FactEmitter> ParseListener for Extractor<'_, E> {
    fn on_event(&mut self, event: TreeEvent) -> Result<(), LineageError> {
        if self.finished {
            warn!(routine = self.routine, ?event, "event after end of input ignored");
            return Ok(());
        }
        match event {
            TreeEvent::EnterTableName(raw) => self.on_table_name(&raw),
            TreeEvent::EnterTableAlias(raw) => self.on_table_alias(&raw),
            TreeEvent::EnterIdentifier(raw) => {
                self.on_identifier(&raw);
                Ok(())
            }
            TreeEvent::EnterLiteral(raw) => {
                self.on_literal(&raw);
                Ok(())
            }
            TreeEvent::EndOfInput => self.finish(),
        }
    }

    fn on_syntax_error(&mut self, error: SyntaxError) -> Result<(), LineageError> {
        warn!(routine = self.routine, %error, "syntax error");
        self.emitter.emit(Fact::ParseError {
            routine: self.routine.to_string(),
            message: error.to_string(),
        })?;
        self.summary.parse_errors += 1;
        Ok(())
    }
}
