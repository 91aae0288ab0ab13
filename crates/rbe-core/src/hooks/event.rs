//! Hook events and subscriber registrations.

use std::fmt;
use std::sync::Arc;

use crate::codec::Querystring;
use crate::model::{
    ActivityItem, ActivityListener, ParamRegistry, ParsedEmail, PostOutcome, ReportContext,
};

/// Priority extensions register at. Framework defaults run below it and
/// late-stage loggers above it.
pub const DEFAULT_PRIORITY: i32 = 10;

/// The named hook points of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookEvent {
    /// Broadcast of the listener record for an activity item.
    ListenerExtend,
    /// Filter chain building the querystring for a claimed listener.
    QuerystringExtend,
    /// Filter chain accumulating the parameter registry.
    AllowedParams,
    /// Terminal chain handing a parsed email to its extension.
    ParseCompleted,
    /// Filter chain accumulating the operator log text of a failed email.
    LogNoMatch,
    /// Filter chain accumulating the message sent back to the sender.
    NoMatchEmailMessage,
}

impl HookEvent {
    /// All events in dispatch-table order.
    pub const ALL: [HookEvent; 6] = [
        Self::ListenerExtend,
        Self::QuerystringExtend,
        Self::AllowedParams,
        Self::ParseCompleted,
        Self::LogNoMatch,
        Self::NoMatchEmailMessage,
    ];

    /// The host-facing hook name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ListenerExtend => "listener-extend",
            Self::QuerystringExtend => "querystring-extend",
            Self::AllowedParams => "allowed-params",
            Self::ParseCompleted => "parse-completed",
            Self::LogNoMatch => "log-no-match",
            Self::NoMatchEmailMessage => "log-no-match-email-message",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Handler signatures ───────────────────────────────────────────────────────

pub type ListenerFn = Arc<dyn Fn(ActivityListener, &ActivityItem) -> ActivityListener + Send + Sync>;
pub type QuerystringFn = Arc<dyn Fn(Querystring, &ActivityListener) -> Querystring + Send + Sync>;
pub type ParamsFn = Arc<dyn Fn(ParamRegistry) -> ParamRegistry + Send + Sync>;
pub type PostFn =
    Arc<dyn Fn(PostOutcome, &ParsedEmail, &ParamRegistry) -> PostOutcome + Send + Sync>;
pub type ReportFn = Arc<dyn Fn(String, &ReportContext<'_>) -> String + Send + Sync>;

/// A subscriber callback, typed by the event it serves.
///
/// Every variant is a pure fold step: it receives the chain's running value
/// and returns the next one.
#[derive(Clone)]
pub enum HookHandler {
    ListenerExtend(ListenerFn),
    QuerystringExtend(QuerystringFn),
    AllowedParams(ParamsFn),
    ParseCompleted(PostFn),
    LogNoMatch(ReportFn),
    NoMatchEmailMessage(ReportFn),
}

impl HookHandler {
    pub fn listener_extend<F>(f: F) -> Self
    where
        F: Fn(ActivityListener, &ActivityItem) -> ActivityListener + Send + Sync + 'static,
    {
        Self::ListenerExtend(Arc::new(f))
    }

    pub fn querystring_extend<F>(f: F) -> Self
    where
        F: Fn(Querystring, &ActivityListener) -> Querystring + Send + Sync + 'static,
    {
        Self::QuerystringExtend(Arc::new(f))
    }

    pub fn allowed_params<F>(f: F) -> Self
    where
        F: Fn(ParamRegistry) -> ParamRegistry + Send + Sync + 'static,
    {
        Self::AllowedParams(Arc::new(f))
    }

    pub fn parse_completed<F>(f: F) -> Self
    where
        F: Fn(PostOutcome, &ParsedEmail, &ParamRegistry) -> PostOutcome + Send + Sync + 'static,
    {
        Self::ParseCompleted(Arc::new(f))
    }

    pub fn log_no_match<F>(f: F) -> Self
    where
        F: Fn(String, &ReportContext<'_>) -> String + Send + Sync + 'static,
    {
        Self::LogNoMatch(Arc::new(f))
    }

    pub fn no_match_email_message<F>(f: F) -> Self
    where
        F: Fn(String, &ReportContext<'_>) -> String + Send + Sync + 'static,
    {
        Self::NoMatchEmailMessage(Arc::new(f))
    }

    /// The event this handler subscribes to.
    pub fn event(&self) -> HookEvent {
        match self {
            Self::ListenerExtend(_) => HookEvent::ListenerExtend,
            Self::QuerystringExtend(_) => HookEvent::QuerystringExtend,
            Self::AllowedParams(_) => HookEvent::AllowedParams,
            Self::ParseCompleted(_) => HookEvent::ParseCompleted,
            Self::LogNoMatch(_) => HookEvent::LogNoMatch,
            Self::NoMatchEmailMessage(_) => HookEvent::NoMatchEmailMessage,
        }
    }
}

/// One `(event, priority, handler)` entry contributed by an extension.
#[derive(Clone)]
pub struct HookRegistration {
    /// Id of the contributing extension, used in logs.
    pub owner: String,
    pub priority: i32,
    pub handler: HookHandler,
}

impl HookRegistration {
    /// Creates a registration at [`DEFAULT_PRIORITY`].
    pub fn new(owner: impl Into<String>, handler: HookHandler) -> Self {
        Self {
            owner: owner.into(),
            priority: DEFAULT_PRIORITY,
            handler,
        }
    }

    /// Sets the priority (builder pattern).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn event(&self) -> HookEvent {
        self.handler.event()
    }
}

impl fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistration")
            .field("owner", &self.owner)
            .field("event", &self.event())
            .field("priority", &self.priority)
            .finish()
    }
}
