//! Runtime error types.

use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors reported by a [`MailSource`](crate::source::MailSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not open a session.
    #[error("Failed to connect to mail source '{source_name}': {reason}")]
    ConnectFailed { source_name: String, reason: String },

    /// An operation was attempted without an open session.
    #[error("Mail source is not connected")]
    NotConnected,

    /// Fetching unseen mail failed.
    #[error("Failed to fetch mail: {0}")]
    FetchFailed(String),

    /// Marking an email as processed failed.
    #[error("Failed to acknowledge email {index}: {reason}")]
    AckFailed { index: usize, reason: String },
}

impl SourceError {
    /// Creates a connection failure.
    pub fn connect_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by a [`SenderNotifier`](crate::source::SenderNotifier).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to notify '{recipient}': {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub reason: String,
}

impl NotifyError {
    pub fn new(recipient: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The mail source failed in a way the loop cannot recover from.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The builder was not given a mail source.
    #[error("No mail source configured")]
    NoMailSource,

    /// Shutdown signal handlers could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(String),
}

/// Result type for mail source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for notifier operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
