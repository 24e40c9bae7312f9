//! Error types shared by the timeline engine, the codec and the version store.

use thiserror::Error;

/// Boxed error used where a collaborator (ledger, storage) reports its own failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Validation,
    Io,
    Remote,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("cue index {index} out of range (store holds {len} cues)")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid time {0:?}, expected HH:MM:SS.mmm")]
    InvalidTime(String),

    #[error("malformed SRT at line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Save(#[from] SaveFailure),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger failure: {0}")]
    Ledger(#[source] BoxError),

    #[error("remote failure: {0}")]
    Remote(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::OutOfRange { .. } => ErrorKind::NotFound,
            Error::InvalidTime(_) | Error::Format { .. } => ErrorKind::Parse,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Save(_) | Error::Io(_) | Error::Ledger(_) => ErrorKind::Io,
            Error::Remote(_) => ErrorKind::Remote,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Ledger(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Remote(err.to_string())
    }
}

/// Stage at which a save stopped.
///
/// Every variant except an unrestored [`SaveFailure::Commit`] leaves the active
/// file and the ledger exactly as they were before the save began. A stray
/// backup file may remain after `Overwrite`; it is never referenced by the ledger.
#[derive(Error, Debug)]
pub enum SaveFailure {
    #[error("save aborted before any change, nothing changed: {source}")]
    Prepare {
        #[source]
        source: std::io::Error,
    },

    #[error("could not stage ledger entry, nothing changed: {source}")]
    Ledger {
        #[source]
        source: BoxError,
    },

    #[error("backup for r{version} failed, ledger rolled back, nothing changed: {source}")]
    Backup {
        version: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "backup for r{version} written but overwrite failed, ledger rolled back, active file unchanged: {source}"
    )]
    Overwrite {
        version: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", commit_message(.version, .restored, .source))]
    Commit {
        version: u32,
        restored: bool,
        #[source]
        source: BoxError,
    },
}

fn commit_message(version: &u32, restored: &bool, source: &BoxError) -> String {
    if *restored {
        format!("ledger commit for r{version} failed, previous file restored, nothing changed: {source}")
    } else {
        format!(
            "ledger commit for r{version} failed and the previous file could not be restored, data may be inconsistent: {source}"
        )
    }
}

impl SaveFailure {
    /// True when the stored subtitle and ledger still agree with each other.
    pub fn is_consistent(&self) -> bool {
        !matches!(self, SaveFailure::Commit { restored: false, .. })
    }

    /// Version the failed save would have produced, when one was reserved.
    pub fn attempted_version(&self) -> Option<u32> {
        match self {
            SaveFailure::Prepare { .. } | SaveFailure::Ledger { .. } => None,
            SaveFailure::Backup { version, .. }
            | SaveFailure::Overwrite { version, .. }
            | SaveFailure::Commit { version, .. } => Some(*version),
        }
    }
}
