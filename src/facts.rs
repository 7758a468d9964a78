use crate::error::LineageError;

/// One observation about one routine, on its way to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fact {
    /// The routine reads or writes `table` (a canonical key).
    TableUsed {
        /// Routine name.
        routine: String,
        /// Canonical table key.
        table: String,
    },
    /// The routine mentions a catalog portfolio code.
    PortfolioReferenced {
        /// Routine name.
        routine: String,
        /// Matched catalog code.
        code: String,
    },
    /// The parser reported a syntax error inside the routine.
    ParseError {
        /// Routine name.
        routine: String,
        /// Rendered diagnostic.
        message: String,
    },
}

/// Which sink a fact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactKind {
    /// [`Fact::TableUsed`].
    TableUsed,
    /// [`Fact::PortfolioReferenced`].
    PortfolioReferenced,
    /// [`Fact::ParseError`].
    ParseError,
}

impl FactKind {
    /// Short label used in thread names and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::TableUsed => "tables",
            Self::PortfolioReferenced => "portfolios",
            Self::ParseError => "errors",
        }
    }
}

impl Fact {
    /// Routine the fact is about.
    pub fn routine(&self) -> &str {
        match self {
            Self::TableUsed { routine, .. }
            | Self::PortfolioReferenced { routine, .. }
            | Self::ParseError { routine, .. } => routine,
        }
    }

    /// Sink this fact is routed to.
    pub fn kind(&self) -> FactKind {
        match self {
            Self::TableUsed { .. } => FactKind::TableUsed,
            Self::PortfolioReferenced { .. } => FactKind::PortfolioReferenced,
            Self::ParseError { .. } => FactKind::ParseError,
        }
    }
}

/// Destination for facts produced by an extractor.
///
/// The pipeline implementation blocks while the destination sink is full.
pub trait FactEmitter {
    /// Publish one fact.
    fn emit(&mut self, fact: Fact) -> Result<(), LineageError>;
}

impl FactEmitter for Vec<Fact> {
    fn emit(&mut self, fact: Fact) -> Result<(), LineageError> {
        self.push(fact);
        Ok(())
    }
}
