//! Centralized error types for mailgrab.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailgrab library.
#[derive(Error, Debug)]
pub enum GrabError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file does not exist.
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// A malformed line or value in the configuration file.
    #[error("config error at {path}:{line}: {reason}")]
    Config {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A required account key is missing from the configuration.
    #[error("account '{account}' is missing required key '{account}_{key}'")]
    MissingAccountKey { account: String, key: String },

    /// An account name given on the command line is not configured.
    #[error("unknown account '{0}'")]
    UnknownAccount(String),

    /// IMAP protocol, connection, or authentication error.
    #[error("IMAP error: {0}")]
    Imap(#[from] imap::error::Error),

    /// TLS connector setup failure.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// Writing an attachment to disk failed.
    #[error("failed to write attachment '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A worker panicked inside an account session.
    #[error("session aborted: {0}")]
    SessionPanic(String),
}

/// Convenience alias for `Result<T, GrabError>`.
pub type Result<T> = std::result::Result<T, GrabError>;

impl GrabError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `GrabError`
/// when no path context is available (rare — prefer `GrabError::io`).
impl From<std::io::Error> for GrabError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
