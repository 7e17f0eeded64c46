use std::fmt::{Display, Formatter};

use config::ConfigError;

use crate::storage::PageId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The backing file could not be created or opened.
    DiskOpen(String),
    /// The backing file handle could not be released cleanly.
    DiskClose(String),
    /// A page read or write against the backing storage failed.
    DiskIo(String),
    /// A page id that is zero or was never allocated.
    InvalidPageId(PageId),
    /// Replacement policy bookkeeping disagrees with the frame pool:
    /// no victim exists although no frame is free. Not recoverable.
    PolicyInvariant(String),
    Internal(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DiskOpen(s) => write!(f, "disk open: {}", s),
            Error::DiskClose(s) => write!(f, "disk close: {}", s),
            Error::DiskIo(s) => write!(f, "disk io: {}", s),
            Error::InvalidPageId(id) => write!(f, "invalid page id {}", id),
            Error::PolicyInvariant(s) => write!(f, "policy invariant violated: {}", s),
            Error::Internal(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
