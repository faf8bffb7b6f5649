use std::fmt;
use std::io;

/// Unified error type for the workspace store.
#[derive(Debug)]
pub enum Error {
    /// IO error from a scratch file (open, seek, read, write).
    Io(io::Error),
    /// Row index outside `[0, total_rows)`.
    RowOutOfRange { row: usize, total_rows: usize },
    /// Index inside a block outside `[0, row_count)`.
    IndexOutOfRange { index: usize, row_count: usize },
    /// A caller-supplied sequence does not match the fixed row layout.
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The store could not be set up (bad layout, bad config, no scratch dir).
    Init(String),
    /// An earlier IO failure left the store unusable.
    Poisoned,
    /// Internal bookkeeping disagrees with itself (e.g. a block handle that
    /// no longer resolves). Does not poison the store.
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::RowOutOfRange { row, total_rows } => {
                write!(f, "row {row} out of range (total rows: {total_rows})")
            }
            Error::IndexOutOfRange { index, row_count } => {
                write!(f, "block index {index} out of range (rows in block: {row_count})")
            }
            Error::LengthMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{what} has length {actual}, expected {expected}"),
            Error::Init(msg) => write!(f, "Initialization failed: {msg}"),
            Error::Poisoned => write!(f, "store is unusable after an earlier IO failure"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result type alias used throughout the store.
pub type Result<T> = std::result::Result<T, Error>;
