//! Typed errors surfaced by the core (spec §7: error taxonomy).

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Stable string tag for a surfaced error, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    ProjectNotFound,
    PermissionDenied,
    IndexNotReady,
    UnknownFile,
    InvalidQuery,
    CacheCorrupt,
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::ProjectNotFound => "ProjectNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IndexNotReady => "IndexNotReady",
            ErrorKind::UnknownFile => "UnknownFile",
            ErrorKind::InvalidQuery => "InvalidQuery",
            ErrorKind::CacheCorrupt => "CacheCorrupt",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Surfaced errors (spec §7). Per-file recoverable failures never become an `Error`;
/// they are counted in `IndexSummary` and logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("project root does not exist: {0}")]
    ProjectNotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("no index is available for this project; run index() first")]
    IndexNotReady,

    #[error("unknown file: {0}")]
    UnknownFile(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("tag cache store is corrupt and could not be cleared: {0}")]
    CacheCorrupt(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::IndexNotReady => ErrorKind::IndexNotReady,
            Error::UnknownFile(_) => ErrorKind::UnknownFile,
            Error::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Error::CacheCorrupt(_) => ErrorKind::CacheCorrupt,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::CacheCorrupt(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(PathBuf::new()),
            std::io::ErrorKind::NotFound => Error::ProjectNotFound(PathBuf::new()),
            _ => Error::Internal(e.to_string()),
        }
    }
}
