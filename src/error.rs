use thiserror::Error;

use crate::lexer::Position;
use crate::loader::LoadError;
use crate::parser::ParseError;

/// Broad class of a [`VqlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The text could not be turned into commands; nothing ran.
    Syntax,
    /// A set, field, function or word set is unknown.
    Resolution,
    /// An operator was applied to values it cannot handle.
    TypeMismatch,
    /// The injected loader failed.
    Io,
    /// The cancellation token was triggered.
    Cancelled,
    Config,
    Internal,
}

#[derive(Error, Debug)]
pub enum VqlError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParseError),
    #[error("Unknown set: {0}")]
    UnknownSet(String),
    #[error("Unknown field '{field}' in set '{set}'")]
    UnknownField { field: String, set: String },
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Unknown word set: {0}")]
    UnknownWordSet(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("Cannot load '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: LoadError,
    },
    #[error("Cannot write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("Execution cancelled")]
    Cancelled,
    #[error("Config error: {0}")]
    Config(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl VqlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VqlError::Syntax(_) => ErrorKind::Syntax,
            VqlError::UnknownSet(_)
            | VqlError::UnknownField { .. }
            | VqlError::UnknownFunction(_)
            | VqlError::UnknownWordSet(_) => ErrorKind::Resolution,
            VqlError::TypeMismatch(_) | VqlError::InvalidPattern { .. } => ErrorKind::TypeMismatch,
            VqlError::Io { .. } | VqlError::Output(_) => ErrorKind::Io,
            VqlError::Cancelled => ErrorKind::Cancelled,
            VqlError::Config(_) => ErrorKind::Config,
            VqlError::Lock(_) => ErrorKind::Internal,
        }
    }

    /// Source position, known for syntax errors.
    pub fn position(&self) -> Option<Position> {
        match self {
            VqlError::Syntax(e) => e.position(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for VqlError {
    fn from(e: config::ConfigError) -> Self {
        VqlError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VqlError>;
