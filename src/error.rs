use std::path::PathBuf;

/// Errors that abort a lineage run.
///
/// Per-routine syntax errors are not represented here: they are data, reported
/// through the error sink. Everything in this enum is fatal for the whole run.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    /// A table or alias capture reached the normalizer with no text at all.
    #[error("missing table name: parser produced an empty qualified identifier")]
    EmptyQualifiedName,

    /// A qualified identifier with more than three segments.
    #[error("unhandled table name format: {raw} ({segments} segments)")]
    UnhandledQualifiedName {
        /// Raw identifier text as delivered by the parser.
        raw: String,
        /// Number of dot-separated segments found.
        segments: usize,
    },

    /// A parser returned without firing end-of-input for a routine.
    #[error("parser finished routine '{routine}' without an end-of-input event")]
    MissingEndOfInput {
        /// Routine whose event stream was cut short.
        routine: String,
    },

    /// Reference catalog could not be loaded.
    #[error("failed to load catalog from {}: {message}", path.display())]
    Catalog {
        /// Source file that failed.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// Routine source feed failed.
    #[error("failed to read routine source {}: {source}", path.display())]
    Feed {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Report artifacts could not be written.
    #[error("failed to write {}: {message}", path.display())]
    Output {
        /// Artifact path.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// A sink hung up before its producers finished.
    #[error("{0} sink channel closed while facts were still being produced")]
    SinkClosed(&'static str),

    /// A pipeline thread could not be started or died.
    #[error("pipeline thread '{name}' failed: {message}")]
    Thread {
        /// Thread name.
        name: String,
        /// What went wrong.
        message: String,
    },
}

impl LineageError {
    /// True when the error means the parser and the normalizer disagree about
    /// the shape of their input, as opposed to an environment failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::EmptyQualifiedName
                | Self::UnhandledQualifiedName { .. }
                | Self::MissingEndOfInput { .. }
        )
    }
}
