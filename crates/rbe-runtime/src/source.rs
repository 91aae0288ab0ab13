//! Interfaces to the mail server and the outbound mailer.
//!
//! The runtime does not speak IMAP or SMTP itself. A [`MailSource`] hands it
//! already parsed emails; a [`SenderNotifier`] delivers failure messages back
//! to the people who wrote them.

use async_trait::async_trait;
use rbe_core::{EmailHeaders, ParsedEmail};

use crate::error::{NotifyResult, SourceResult};

/// One unseen email as delivered by a [`MailSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEmail {
    /// Position of the email in the source's current batch; passed back to
    /// [`MailSource::acknowledge`].
    pub index: usize,
    pub headers: EmailHeaders,
    /// Reply text with quoted history already stripped.
    pub body: String,
}

impl InboundEmail {
    pub fn new(index: usize, headers: EmailHeaders, body: impl Into<String>) -> Self {
        Self {
            index,
            headers,
            body: body.into(),
        }
    }

    /// The data handed to extensions.
    pub fn parsed(&self) -> ParsedEmail {
        ParsedEmail::from_parts(self.headers.clone(), self.body.clone())
    }
}

/// A mailbox the runtime polls for replies.
///
/// The runtime calls `connect` at the start of every session and
/// `disconnect` at its end, then reconnects for the next session.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// A short label for logs and the logging hooks' context.
    fn name(&self) -> &str;

    /// Opens a session.
    async fn connect(&self) -> SourceResult<()>;

    /// Returns the emails not yet acknowledged.
    async fn fetch(&self) -> SourceResult<Vec<InboundEmail>>;

    /// Marks the email at `index` as processed so it is not fetched again.
    ///
    /// Delivery is at-least-once: the runtime logs a failed acknowledgement
    /// and moves on, so the email comes back on a later fetch and is
    /// processed again.
    async fn acknowledge(&self, index: usize) -> SourceResult<()>;

    /// Closes the session.
    async fn disconnect(&self) -> SourceResult<()>;
}

/// Sends failure messages back to the original sender.
#[async_trait]
pub trait SenderNotifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> NotifyResult<()>;
}

/// A notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl SenderNotifier for NoopNotifier {
    async fn notify(&self, _recipient: &str, _subject: &str, _body: &str) -> NotifyResult<()> {
        Ok(())
    }
}
