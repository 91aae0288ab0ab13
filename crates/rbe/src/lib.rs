//! # Rbe
//!
//! A reply-by-email framework: people answer a notification email, and the
//! reply is posted back into the system the notification came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────┐     ┌──────────────────────────────┐
//! │   Runtime   │────▶│ Pipeline │────▶│ HookBus ──▶ Extension "a"    │──▶ post
//! │ (MailSource)│     │          │     │         ──▶ Extension "b"    │
//! └─────────────┘     └──────────┘     └──────────────────────────────┘
//!        ▲                                            │
//!        └──────── signed reply address ◀─────────────┘
//! ```
//!
//! - **Extensions**: one per item type; they claim replies to their items
//!   and create the posts
//! - **Hook bus**: six named chains the extensions register on
//! - **Reply address**: the item ids travel inside an HMAC-signed address
//! - **Runtime**: polls the mailbox and reports failures back to senders
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rbe::prelude::*;
//!
//! struct TopicReply;
//!
//! impl Extension for TopicReply {
//!     fn post(
//!         &self,
//!         descriptor: &ExtensionDescriptor,
//!         data: &ParsedEmail,
//!         params: &ParamRegistry,
//!     ) -> Result<ItemId, PostFailure> {
//!         // create the reply, return its id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = RbeRuntime::builder()
//!         .extension("topic_reply", TopicReply)
//!         .source(my_source)
//!         .build()?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Read `rbe.toml` (default)
//! - `yaml-config`: Read `rbe.yaml`
//! - `json-log`: Enable the JSON log format

pub use rbe_core as core;
pub use rbe_framework as framework;
pub use rbe_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use rbe::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use rbe_runtime::{
        InboundEmail, MailSource, RbeConfig, RbeRuntime, SenderNotifier, SourceError,
        SourceResult,
    };

    // Extension contract
    pub use rbe_framework::{Extension, ExtensionBase, ExtensionHost, ExtensionRegistry};

    // Data model
    pub use rbe_core::prelude::*;
}
