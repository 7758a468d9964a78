use std::fmt;

use crate::error::LineageError;

/// One structural event produced while parsing a routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// A table reference, as raw qualified-identifier text.
    EnterTableName(String),
    /// An alias declared for a table reference.
    EnterTableAlias(String),
    /// A bare identifier anywhere in the routine.
    EnterIdentifier(String),
    /// A literal constant, still carrying its quotes when it is a string.
    EnterLiteral(String),
    /// Terminal event: nothing else follows for this routine.
    EndOfInput,
}

/// A recoverable syntax error reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based line in the routine source.
    pub line: u64,
    /// 1-based column, or 0 when unknown.
    pub column: u64,
    /// Parser diagnostic.
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line: {}, Column: {}, Error: {}",
            self.line, self.column, self.message
        )
    }
}

/// Receiver of a routine's parse events.
///
/// Returning an error stops the parser, which hands the same error back to
/// its caller.
pub trait ParseListener {
    /// Handle one tree event.
    fn on_event(&mut self, event: TreeEvent) -> Result<(), LineageError>;
    /// Handle one syntax error. Parsing continues afterwards.
    fn on_syntax_error(&mut self, error: SyntaxError) -> Result<(), LineageError>;
}

/// Capability that turns routine source text into parse events.
///
/// Implementations must deliver [`TreeEvent::EndOfInput`] exactly once, after
/// every other event and syntax error of the routine. They are shared by all
/// workers, hence `Sync`.
pub trait RoutineParser: Sync {
    /// Parse one routine, streaming events into `listener`.
    fn parse(&self, source: &str, listener: &mut dyn ParseListener) -> Result<(), LineageError>;
}
