use std::io;
use thiserror::Error;

/// Errors surfaced by stack operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Unexpected filesystem behaviour.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A table named by the list file is missing from the directory and the
    /// list did not change underneath us: the stack is genuinely broken.
    #[error("listed table file does not exist")]
    NotExist,

    /// Another mutator holds the stack lock, or this handle's loaded view
    /// disagrees with the list file. Transient: reload and retry.
    #[error("stack is locked or the loaded view is out of date")]
    Lock,

    /// Caller misuse of the writing API, e.g. table limits below the
    /// required next update index.
    #[error("api misuse: {0}")]
    Api(String),

    /// A table on disk does not parse.
    #[error("format error: {0}")]
    Format(String),
}

impl Error {
    /// Returns `true` for failures a caller is expected to retry after a
    /// [`reload`](crate::Stack::reload).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Lock)
    }
}

impl From<reftable::Error> for Error {
    fn from(e: reftable::Error) -> Self {
        match e {
            reftable::Error::Io(e) => Error::Io(e),
            reftable::Error::NotExist => Error::NotExist,
            reftable::Error::Format(msg) => Error::Format(msg),
            reftable::Error::Api(msg) => Error::Api(msg),
        }
    }
}
