//! Domain values exchanged between the host, the hook bus and extensions.

pub mod email;
pub mod listener;
pub mod outcome;
pub mod params;

pub use email::{EmailHeaders, ParsedEmail, parse_addresses};
pub use listener::{ActivityItem, ActivityListener, ItemId};
pub use outcome::{FailureKind, PostFailure, PostOutcome, PostReceipt, ReportContext};
pub use params::ParamRegistry;
