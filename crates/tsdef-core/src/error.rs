use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures of a single definition query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("line_content is required to find the symbol")]
    MissingLineContent,

    #[error("Line content not found in {}", path.display())]
    LineNotFound { path: PathBuf },

    #[error("Symbol \"{0}\" not found in line_content")]
    SymbolNotFound(String),

    #[error("Column {column} is outside line_content ({length} characters)")]
    ColumnOutOfRange { column: u32, length: usize },

    #[error("Failed to read file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl QueryError {
    pub fn file_read(path: &Path, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::MissingLineContent => "missing_line_content",
            QueryError::LineNotFound { .. } => "line_not_found",
            QueryError::SymbolNotFound(_) => "symbol_not_found",
            QueryError::ColumnOutOfRange { .. } => "column_out_of_range",
            QueryError::FileRead { .. } => "file_read",
            QueryError::Resolver(_) => "resolver",
        }
    }
}

/// Failures inside a symbol resolver backend.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("failed to start language server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("language server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("language server protocol error: {0}")]
    Protocol(String),

    #[error("language server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("resolver session unavailable: {0}")]
    Session(String),
}

impl ResolverError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
