//! Error types for courier-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`MessageStore`](crate::store::MessageStore) implementation.
///
/// Every variant is treated as transient by the listener: a failing query
/// aborts the whole poll cycle, which is then retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database file does not exist.
    #[error("chat database not found at {path}")]
    NotFound { path: PathBuf },

    /// The database could not be opened.
    #[error("failed to open chat database at {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// A query against an open database failed.
    #[error("store query failed: {0}")]
    Query(String),

    /// A row held a value the row mapper could not interpret. `SqliteStore`
    /// logs and skips such rows rather than failing the query.
    #[error("malformed {column} in message {rowid}: {message}")]
    Malformed {
        rowid: i64,
        column: &'static str,
        message: String,
    },
}

/// All errors that can arise from configuration load/save.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
