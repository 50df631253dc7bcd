// ⚠️ Error taxonomy for the reconciliation pipeline
//
// Library code returns ReconcileError; the CLI wraps it in anyhow.
// Unresolved identifiers and metadata-join drops are NOT errors: they are
// counted in the RunReport instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// File could not be opened or read
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited parsing failed below the row level
    #[error("failed to parse '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required column is absent from a supplied table
    #[error("table '{}' is missing required column '{column}'", path.display())]
    MalformedInput { path: PathBuf, column: String },

    /// Table parsed but holds zero data rows
    #[error("table '{}' contains no rows", path.display())]
    EmptySource { path: PathBuf },

    /// Nothing usable was supplied at all
    #[error("no usable input: {0}")]
    NoInputs(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReconcileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconcileError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        ReconcileError::MalformedInput {
            path: path.into(),
            column: column.into(),
        }
    }

    /// Errors that degrade a single source instead of aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReconcileError::EmptySource { .. } | ReconcileError::Io { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
