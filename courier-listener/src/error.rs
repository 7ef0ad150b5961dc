use std::path::PathBuf;

use thiserror::Error;

use courier_core::StoreError;

/// Error surface for the change listener, its pollers and file watching.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// One poller's store query failed; aborts the attempt.
    #[error("{poller} poller failed: {source}")]
    Poll {
        poller: &'static str,
        #[source]
        source: StoreError,
    },

    /// Every attempt of a poll cycle failed.
    #[error("poll cycle failed after {attempts} attempt(s): {source}")]
    CycleFailed {
        attempts: u32,
        #[source]
        source: Box<ListenerError>,
    },

    #[error("poller task join failure: {0}")]
    Join(String),

    #[error("no files to watch")]
    NoWatchedFiles,

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ListenerError {
    ListenerError::Io {
        path: path.into(),
        source,
    }
}
