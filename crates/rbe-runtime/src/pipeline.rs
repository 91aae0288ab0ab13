//! The parse/post pipeline for one inbound email.
//!
//! ```text
//! Received ─▶ ListenerResolved ─▶ Posted
//!     │               │
//!     └───────────────┴─────────▶ Failed ─▶ Reported
//! ```
//!
//! 1. Locate the reply address among `To`, `Cc` and `Delivered-To`
//! 2. Verify and decode it into a querystring
//! 3. Resolve the registered parameters
//! 4. Run `parse-completed`; a still-pending outcome means nobody claimed it
//! 5. On failure, fold the logging hooks, log the text and notify the sender
//!
//! Item-level failures never surface as errors; [`Pipeline::process`] always
//! returns an [`ItemReport`].

use std::fmt;
use std::sync::Arc;

use rbe_core::{
    FailureKind, ParamRegistry, PostFailure, PostOutcome, PostReceipt, Querystring,
    ReplyAddressCodec, ReportContext,
};
use rbe_framework::ExtensionRegistry;
use tracing::{Instrument, Level, debug, error, info, span, warn};

use crate::source::{InboundEmail, SenderNotifier};

/// Processing stage of one inbound email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStage {
    Received,
    /// The reply address decoded and parameters were resolved.
    ListenerResolved,
    Posted,
    Failed,
    /// The failure went through the logging hooks.
    Reported,
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::ListenerResolved => "listener_resolved",
            Self::Posted => "posted",
            Self::Failed => "failed",
            Self::Reported => "reported",
        })
    }
}

/// What happened to one inbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub index: usize,
    /// Final stage reached.
    pub stage: ItemStage,
    /// `Posted` or `Failed`, never `Pending`.
    pub outcome: PostOutcome,
    /// Operator log text, for failures.
    pub log: Option<String>,
    /// Whether a failure message reached the sender.
    pub notified: bool,
}

impl ItemReport {
    pub fn is_posted(&self) -> bool {
        self.outcome.is_posted()
    }

    pub fn failure(&self) -> Option<&PostFailure> {
        self.outcome.failure()
    }
}

/// Drives the extension contract for inbound emails.
pub struct Pipeline {
    registry: Arc<ExtensionRegistry>,
    codec: ReplyAddressCodec,
    notifier: Arc<dyn SenderNotifier>,
    mailbox: String,
}

impl Pipeline {
    /// Creates a pipeline reading from the mailbox labelled `mailbox`.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        codec: ReplyAddressCodec,
        notifier: Arc<dyn SenderNotifier>,
        mailbox: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            codec,
            notifier,
            mailbox: mailbox.into(),
        }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Processes one email end to end.
    pub async fn process(&self, email: &InboundEmail) -> ItemReport {
        let span = span!(Level::DEBUG, "process_email", index = email.index);
        async move {
            debug!(stage = %ItemStage::Received, "Email received");

            match self.post(email) {
                Ok(receipt) => {
                    info!(
                        stage = %ItemStage::Posted,
                        extension = %receipt.extension,
                        item_id = %receipt.item_id,
                        "Email posted"
                    );
                    ItemReport {
                        index: email.index,
                        stage: ItemStage::Posted,
                        outcome: PostOutcome::Posted(receipt),
                        log: None,
                        notified: false,
                    }
                }
                Err(failure) => {
                    debug!(stage = %ItemStage::Failed, kind = %failure.kind, "Email failed");
                    self.report(email, failure).await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Steps 1 to 4.
    fn post(&self, email: &InboundEmail) -> Result<PostReceipt, PostFailure> {
        let params = self.resolve(email)?;
        debug!(stage = %ItemStage::ListenerResolved, "Parameters resolved");

        match self.registry.post(&email.parsed(), &params) {
            PostOutcome::Posted(receipt) => Ok(receipt),
            PostOutcome::Failed(failure) => Err(failure),
            PostOutcome::Pending => Err(PostFailure::new(
                FailureKind::Unclaimed,
                "no extension claimed the decoded parameters",
            )),
        }
    }

    /// Decodes the first reply-mailbox recipient that verifies.
    ///
    /// When none does, the first recipient's decode error is reported.
    fn verified_querystring(&self, email: &InboundEmail) -> Result<Querystring, PostFailure> {
        let mut first_error = None;
        for address in email
            .headers
            .recipients()
            .iter()
            .filter(|address| self.codec.is_reply_address(address))
        {
            match self.codec.decode(address) {
                Ok(querystring) => return Ok(querystring),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(match first_error {
            Some(e) => PostFailure::new(FailureKind::InvalidReplyAddress, e.to_string()),
            None => PostFailure::new(
                FailureKind::MissingReplyAddress,
                format!(
                    "no recipient addressed to {}@{}",
                    self.codec.mailbox(),
                    self.codec.domain()
                ),
            ),
        })
    }

    fn resolve(&self, email: &InboundEmail) -> Result<ParamRegistry, PostFailure> {
        let querystring = self.verified_querystring(email)?;

        let params = self.registry.resolve_params(&querystring);
        if !params.has_values() {
            return Err(PostFailure::new(
                FailureKind::NoParams,
                format!("'{querystring}' carries no registered parameter"),
            ));
        }
        Ok(params)
    }

    /// Step 5.
    async fn report(&self, email: &InboundEmail, failure: PostFailure) -> ItemReport {
        let ctx = ReportContext {
            kind: &failure.kind,
            headers: &email.headers,
            index: email.index,
            mailbox: &self.mailbox,
        };

        let log = self
            .registry
            .internal_log(default_log(&failure, email.index, &self.mailbox), &ctx);
        if !log.is_empty() {
            warn!(kind = %failure.kind, "{log}");
        }

        let message = self
            .registry
            .failure_message(default_sender_message(&failure), &ctx);
        let notified = self.notify(email, &message).await;

        ItemReport {
            index: email.index,
            stage: ItemStage::Reported,
            outcome: PostOutcome::Failed(failure),
            log: Some(log).filter(|log| !log.is_empty()),
            notified,
        }
    }

    async fn notify(&self, email: &InboundEmail, message: &str) -> bool {
        if message.is_empty() {
            return false;
        }
        let Some(recipient) = email.headers.from_address() else {
            debug!("Failed email has no sender address, not notifying");
            return false;
        };

        let subject = match email.headers.subject() {
            "" => "Your reply could not be posted".to_string(),
            subject => format!("Re: {subject}"),
        };
        match self.notifier.notify(&recipient, &subject, message).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to notify sender");
                false
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("codec", &self.codec)
            .field("mailbox", &self.mailbox)
            .finish_non_exhaustive()
    }
}

fn default_log(failure: &PostFailure, index: usize, mailbox: &str) -> String {
    format!(
        "Email #{index} in {mailbox} was not posted ({}): {}",
        failure.kind, failure.reason
    )
}

fn default_sender_message(failure: &PostFailure) -> String {
    match &failure.kind {
        FailureKind::MissingReplyAddress | FailureKind::InvalidReplyAddress => {
            "Your reply could not be posted because the address it was sent to is not valid. \
             Please reply to the notification email directly."
                .to_string()
        }
        FailureKind::NoParams | FailureKind::Unclaimed => {
            "Your reply could not be posted because the item it answers could not be found."
                .to_string()
        }
        FailureKind::Extension(_) => {
            format!("Your reply could not be posted: {}", failure.reason)
        }
    }
}
