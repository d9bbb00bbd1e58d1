//! Error types for the validation engine.

use thiserror::Error;

/// Whether a database failure affects one statement or the whole connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// The pool or connection is unusable. Fatal to the current pass.
    Connection,
    /// The server rejected the statement. Becomes a diagnostic.
    Statement,
}

/// Failure reported by the database collaborator.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
    pub hint: Option<String>,
    /// SQLSTATE, when the server supplied one.
    pub code: Option<String>,
    /// 1-based character offset into the checked statement.
    pub position: Option<usize>,
}

impl DatabaseError {
    pub fn statement(message: impl Into<String>) -> Self {
        Self {
            kind: DatabaseErrorKind::Statement,
            message: message.into(),
            hint: None,
            code: None,
            position: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: DatabaseErrorKind::Connection,
            message: message.into(),
            hint: None,
            code: None,
            position: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_connection(&self) -> bool {
        self.kind == DatabaseErrorKind::Connection
    }
}

/// Errors that can occur while loading configuration or override files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Reasons a validation pass ends without replacing diagnostics.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A fragment was opened but never closed.
    #[error("document {document} has an unterminated fragment")]
    NotWellFormed { document: String },

    /// No database handle is installed.
    #[error("no database connection available")]
    NoConnection,

    /// The database became unreachable mid-pass.
    #[error("database connection failed: {0}")]
    Connection(DatabaseError),

    /// A newer pass for the same document started before this one finished.
    #[error("pass {ticket} for {document} was superseded")]
    Superseded { document: String, ticket: u64 },
}
