use std::io;
use thiserror::Error;

/// Errors surfaced by the table format layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The table file does not exist. Kept distinct from [`Error::Io`]
    /// because the stack reloader retries on it: a concurrent compactor may
    /// have deleted the file between the list read and our open.
    #[error("table file does not exist")]
    NotExist,

    /// The file on disk does not parse as a reftable.
    #[error("format error: {0}")]
    Format(String),

    /// Misuse of the writing API (unsorted records, out-of-window
    /// update indices).
    #[error("api misuse: {0}")]
    Api(String),
}
