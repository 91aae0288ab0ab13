//! Posting outcomes and failure reporting context.

use std::fmt;

use super::{EmailHeaders, ItemId};

/// Machine-checkable kind of a failed inbound email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No recipient matched the configured reply mailbox.
    MissingReplyAddress,
    /// The reply address token did not decode or verify.
    InvalidReplyAddress,
    /// The decoded querystring carried no registered parameter.
    NoParams,
    /// Parameters decoded, but no extension claimed the email.
    Unclaimed,
    /// A domain-specific failure reported by an extension's `post`.
    Extension(String),
}

impl FailureKind {
    /// Stable string code used in logs and by logging hooks.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingReplyAddress => "missing_reply_address",
            Self::InvalidReplyAddress => "invalid_reply_address",
            Self::NoParams => "no_params",
            Self::Unclaimed => "unclaimed",
            Self::Extension(code) => code,
        }
    }

    /// Returns `true` for the kinds raised before any extension was involved.
    pub fn is_no_match(&self) -> bool {
        !matches!(self, Self::Extension(_))
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success descriptor returned by `post`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    /// Id of the item the extension created.
    pub item_id: ItemId,
    /// Id of the extension that posted. Filled in by the hook wrapper.
    pub extension: String,
}

/// Structured failure returned by `post` or raised by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFailure {
    pub kind: FailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl PostFailure {
    /// Creates a failure of the given kind.
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Creates an extension-specific failure with a custom code.
    pub fn extension(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Extension(code.into()), reason)
    }
}

impl fmt::Display for PostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// Running value of the `parse-completed` chain.
///
/// The chain starts at [`Pending`](Self::Pending); the single extension that
/// claims the email replaces it with `Posted` or `Failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PostOutcome {
    #[default]
    Pending,
    Posted(PostReceipt),
    Failed(PostFailure),
}

impl PostOutcome {
    /// A successful outcome for `item_id`.
    pub fn posted(item_id: impl Into<ItemId>) -> Self {
        Self::Posted(PostReceipt {
            item_id: item_id.into(),
            extension: String::new(),
        })
    }

    /// An extension failure with a custom code.
    pub fn failed(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed(PostFailure::extension(code, reason))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted(_))
    }

    /// Returns the failure, if any.
    pub fn failure(&self) -> Option<&PostFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Records `extension` as the poster of a receipt that has none yet.
    pub fn stamp(mut self, extension: &str) -> Self {
        if let Self::Posted(receipt) = &mut self
            && receipt.extension.is_empty()
        {
            receipt.extension = extension.to_string();
        }
        self
    }
}

/// Context handed to the logging hooks for one failed email.
///
/// Mirrors the `(type, headers, index, connection)` hook arguments; the mail
/// connection is represented by the label of the mailbox being read.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub kind: &'a FailureKind,
    pub headers: &'a EmailHeaders,
    /// Position of the email in the current fetch batch.
    pub index: usize,
    pub mailbox: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_codes() {
        assert_eq!(FailureKind::NoParams.as_str(), "no_params");
        assert_eq!(
            FailureKind::Extension("topic_closed".into()).to_string(),
            "topic_closed"
        );
        assert!(FailureKind::Unclaimed.is_no_match());
        assert!(!FailureKind::Extension("x".into()).is_no_match());
    }

    #[test]
    fn test_stamp_fills_only_empty_receipts() {
        let outcome = PostOutcome::posted(5).stamp("topic-reply");
        let PostOutcome::Posted(receipt) = &outcome else {
            panic!("expected a receipt");
        };
        assert_eq!(receipt.extension, "topic-reply");

        let restamped = outcome.clone().stamp("other");
        assert_eq!(restamped, outcome);

        assert_eq!(PostOutcome::Pending.stamp("x"), PostOutcome::Pending);
    }
}
