//! # RBE Core
//!
//! Core types of the reply-by-email extension framework.
//!
//! This crate holds everything an extension and the host share without
//! depending on a runtime:
//!
//! - **Codecs**: the `key=value` [`Querystring`] and the signed
//!   [`ReplyAddressCodec`] that embeds it in a `Reply-To` address
//! - **Descriptor**: the validated, immutable [`ExtensionDescriptor`] built
//!   from an [`ExtensionConfig`]
//! - **Model**: listener records, activity items, the [`ParamRegistry`],
//!   parsed emails and [`PostOutcome`]s
//! - **Hooks**: the named [`HookEvent`]s and the priority-ordered [`HookBus`]
//!
//! ## Data Flow
//!
//! ```text
//!  outbound                              inbound
//!  ActivityItem                          reply address
//!      │ listener-extend                     │ ReplyAddressCodec::decode
//!      ▼                                     ▼
//!  ActivityListener                      Querystring
//!      │ querystring-extend                  │ ParamRegistry::resolve
//!      ▼                                     ▼
//!  Querystring ──▶ ReplyAddressCodec     parse-completed ──▶ PostOutcome
//! ```

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod model;

pub use codec::{Querystring, ReplyAddressCodec};
pub use descriptor::{ExtensionConfig, ExtensionDescriptor};
pub use error::{
    BootstrapError, BootstrapResult, CodecError, CodecResult, ReplyAddressError,
    ReplyAddressResult,
};
pub use hooks::{DEFAULT_PRIORITY, HookBus, HookEvent, HookHandler, HookRegistration};
pub use model::{
    ActivityItem, ActivityListener, EmailHeaders, FailureKind, ItemId, ParamRegistry,
    ParsedEmail, PostFailure, PostOutcome, PostReceipt, ReportContext,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::codec::{Querystring, ReplyAddressCodec};
    pub use super::descriptor::{ExtensionConfig, ExtensionDescriptor};
    pub use super::model::*;
}
