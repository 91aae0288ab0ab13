//! Rbe Runtime - mail polling layer for the reply-by-email framework.
//!
//! This crate provides:
//! - Layered configuration (`RbeConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - The parse/post pipeline for one email (`Pipeline`)
//! - The mail loop with its keepalive reconnects (`RbeRuntime`)
//!
//! ```ignore
//! use rbe_runtime::RbeRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = RbeRuntime::builder()
//!         .extension("topic_reply", TopicReply::new(store))
//!         .source(MyImapSource::connect_lazy(..))
//!         .notifier(MySmtpNotifier::new(..))
//!         .build()?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The runtime itself does not talk to a mail server. Hosts plug in a
//! [`MailSource`] and a [`SenderNotifier`].

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod runtime;
pub mod source;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, RbeConfig};
pub use error::{
    NotifyError, NotifyResult, RuntimeError, RuntimeResult, SourceError, SourceResult,
};
pub use logging::{LoggingBuilder, SpanEvents};
pub use pipeline::{ItemReport, ItemStage, Pipeline};
pub use runtime::{RbeRuntime, RuntimeBuilder, RuntimeStats};
pub use source::{InboundEmail, MailSource, NoopNotifier, SenderNotifier};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
