use std::ops::ControlFlow;

use sqlparser::ast::{Expr, ObjectName, TableFactor, Value, Visit, Visitor};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::keywords::{Keyword, RESERVED_FOR_TABLE_ALIAS};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use crate::config::LineageConfig;
use crate::error::LineageError;
use crate::parser::events::{ParseListener, RoutineParser, SyntaxError, TreeEvent};
use crate::parser::shape::{shape_batch, token_literal};

/// Keywords after which a table name follows during token-level recovery.
const TABLE_KEYWORDS: [Keyword; 4] = [Keyword::FROM, Keyword::JOIN, Keyword::INTO, Keyword::UPDATE];

/// T-SQL routine parser backed by `sqlparser`'s MS SQL dialect.
///
/// Sources are split into `GO`-separated batches and each batch is parsed on
/// its own, so one unsupported construct costs a single batch rather than the
/// whole routine. Procedure headers with bare parameter lists and
/// `TRY`/`CATCH` markers are reshaped first (see [`shape_batch`]). With tolerant recovery enabled, a batch that fails to parse
/// is still scanned token by token for table names, aliases, identifiers and
/// literals.
#[derive(Debug, Clone)]
pub struct SqlServerParser {
    tolerant_recovery: bool,
}

impl SqlServerParser {
    /// Create a parser; `tolerant_recovery` enables the token-level fallback.
    pub fn new(tolerant_recovery: bool) -> Self {
        Self { tolerant_recovery }
    }

    /// Create a parser from run settings.
    pub fn from_config(config: &LineageConfig) -> Self {
        Self::new(config.tolerant_recovery)
    }
}

impl Default for SqlServerParser {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RoutineParser for SqlServerParser {
    fn parse(&self, source: &str, listener: &mut dyn ParseListener) -> Result<(), LineageError> {
        let dialect = MsSqlDialect {};
        for batch in split_batches(source) {
            let shaped = shape_batch(&dialect, batch.text);
            for literal in shaped.header_literals {
                listener.on_event(TreeEvent::EnterLiteral(literal))?;
            }
            match Parser::parse_sql(&dialect, &shaped.text) {
                Ok(statements) => {
                    let mut visitor = EventVisitor {
                        listener: &mut *listener,
                    };
                    if let ControlFlow::Break(err) = statements.visit(&mut visitor) {
                        return Err(err);
                    }
                }
                Err(err) => {
                    listener.on_syntax_error(syntax_error(&err, batch.first_line))?;
                    let tokenizable = !matches!(err, ParserError::TokenizerError(_));
                    if self.tolerant_recovery && tokenizable {
                        recover_events(&dialect, &shaped.text, &mut *listener)?;
                    }
                }
            }
        }
        listener.on_event(TreeEvent::EndOfInput)
    }
}

/// A `GO`-delimited slice of a routine source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// Batch text without the separator line.
    pub text: &'a str,
    /// 1-based line of the source on which the batch starts.
    pub first_line: u64,
}

/// Split a source into batches on lines consisting only of `GO`.
///
/// Blank batches are dropped.
pub fn split_batches(source: &str) -> Vec<Batch<'_>> {
    let mut batches = Vec::new();
    let mut start = 0usize;
    let mut first_line = 1u64;
    let mut offset = 0usize;

    for (line_no, line) in (1u64..).zip(source.split_inclusive('\n')) {
        if line.trim().eq_ignore_ascii_case("GO") {
            batches.push(Batch {
                text: &source[start..offset],
                first_line,
            });
            start = offset + line.len();
            first_line = line_no + 1;
        }
        offset += line.len();
    }
    batches.push(Batch {
        text: &source[start..],
        first_line,
    });

    batches.retain(|batch| !batch.text.trim().is_empty());
    batches
}

fn syntax_error(err: &ParserError, first_line: u64) -> SyntaxError {
    let text = match err {
        ParserError::TokenizerError(text) | ParserError::ParserError(text) => text.clone(),
        other => other.to_string(),
    };
    locate(&text, first_line)
}

/// Pull the `at Line: l, Column: c` suffix out of a diagnostic and shift the
/// line by the batch offset.
fn locate(text: &str, first_line: u64) -> SyntaxError {
    if let Some((message, location)) = text.rsplit_once(" at Line: ") {
        if let Some((line, column)) = location.split_once(", Column: ") {
            if let (Ok(line), Ok(column)) = (line.trim().parse::<u64>(), column.trim().parse::<u64>())
            {
                return SyntaxError {
                    line: line + first_line.saturating_sub(1),
                    column,
                    message: message.to_string(),
                };
            }
        }
    }
    SyntaxError {
        line: first_line,
        column: 0,
        message: text.to_string(),
    }
}

struct EventVisitor<'a, 'l> {
    listener: &'a mut (dyn ParseListener + 'l),
}

impl EventVisitor<'_, '_> {
    fn forward(&mut self, event: TreeEvent) -> ControlFlow<LineageError> {
        match self.listener.on_event(event) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(err),
        }
    }
}

impl Visitor for EventVisitor<'_, '_> {
    type Break = LineageError;

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.forward(TreeEvent::EnterTableName(relation.to_string()))
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        match table_factor {
            TableFactor::Table {
                alias: Some(alias), ..
            }
            | TableFactor::Derived {
                alias: Some(alias), ..
            } => self.forward(TreeEvent::EnterTableAlias(alias.name.to_string())),
            _ => ControlFlow::Continue(()),
        }
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        match expr {
            Expr::Identifier(ident) => self.forward(TreeEvent::EnterIdentifier(ident.value.clone())),
            Expr::CompoundIdentifier(parts) => parts
                .iter()
                .try_for_each(|part| self.forward(TreeEvent::EnterIdentifier(part.value.clone()))),
            Expr::Value(value) => match literal_text(&value.value) {
                Some(text) => self.forward(TreeEvent::EnterLiteral(text)),
                None => ControlFlow::Continue(()),
            },
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Literal text as it appears in source: strings keep one layer of quotes.
fn literal_text(value: &Value) -> Option<String> {
    match value {
        Value::SingleQuotedString(text) | Value::NationalStringLiteral(text) => {
            Some(format!("'{text}'"))
        }
        Value::Number(number, _) => Some(number.clone()),
        _ => None,
    }
}

/// Token-level recovery for a batch the parser rejected.
fn recover_events(
    dialect: &MsSqlDialect,
    text: &str,
    listener: &mut dyn ParseListener,
) -> Result<(), LineageError> {
    let tokens = match Tokenizer::new(dialect, text).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(err) => {
            debug!(error = %err, "batch could not be tokenized, skipping recovery");
            return Ok(());
        }
    };
    let tokens: Vec<&Token> = tokens
        .iter()
        .map(|t| &t.token)
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect();

    let mut pos = 0usize;
    while pos < tokens.len() {
        match tokens[pos] {
            Token::Word(word) if TABLE_KEYWORDS.contains(&word.keyword) => {
                pos += 1;
                let Some((name, next)) = read_qualified_name(&tokens, pos) else {
                    continue;
                };
                listener.on_event(TreeEvent::EnterTableName(name))?;
                pos = next;
                if let Some((alias, next)) = read_alias(&tokens, pos) {
                    listener.on_event(TreeEvent::EnterTableAlias(alias))?;
                    pos = next;
                }
            }
            Token::Word(word) if word.keyword == Keyword::NoKeyword => {
                listener.on_event(TreeEvent::EnterIdentifier(word.value.clone()))?;
                pos += 1;
            }
            token => {
                if let Some(literal) = token_literal(token) {
                    listener.on_event(TreeEvent::EnterLiteral(literal))?;
                }
                pos += 1;
            }
        }
    }
    Ok(())
}

/// Read `word(.word)*` starting at `pos`, allowing the empty schema of `db..t`.
fn read_qualified_name(tokens: &[&Token], mut pos: usize) -> Option<(String, usize)> {
    let mut name = String::new();
    loop {
        match tokens.get(pos) {
            Some(Token::Word(word))
                if (name.is_empty() || name.ends_with('.'))
                    && (word.quote_style.is_some()
                        || !RESERVED_FOR_TABLE_ALIAS.contains(&word.keyword)) =>
            {
                name.push_str(&word.to_string());
            }
            Some(Token::Period) if !name.is_empty() => name.push('.'),
            _ => break,
        }
        pos += 1;
    }
    let name = name.trim_end_matches('.');
    if name.is_empty() {
        None
    } else {
        Some((name.to_string(), pos))
    }
}

fn read_alias(tokens: &[&Token], pos: usize) -> Option<(String, usize)> {
    match tokens.get(pos) {
        Some(Token::Word(word)) if word.keyword == Keyword::AS => match tokens.get(pos + 1) {
            Some(Token::Word(alias)) => Some((alias.to_string(), pos + 2)),
            _ => None,
        },
        Some(Token::Word(word)) if word.keyword == Keyword::NoKeyword => {
            Some((word.to_string(), pos + 1))
        }
        _ => None,
    }
}
