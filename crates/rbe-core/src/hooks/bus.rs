//! The ordered hook bus.
//!
//! The [`HookBus`] holds the subscribers of every [`HookEvent`] and folds a
//! running value through them:
//!
//! 1. Subscribers run in ascending priority
//! 2. Subscribers with equal priority run in registration order
//! 3. Each subscriber receives the previous subscriber's output
//!
//! ```rust,ignore
//! use rbe_core::hooks::{HookBus, HookHandler, HookRegistration};
//!
//! let mut bus = HookBus::new();
//! bus.register(HookRegistration::new(
//!     "group",
//!     HookHandler::allowed_params(|params| params),
//! ));
//!
//! let registry = bus.allowed_params(ParamRegistry::new());
//! ```

use std::collections::BTreeMap;

use tracing::{Level, debug, span, trace};

use super::event::{HookEvent, HookHandler, HookRegistration};
use crate::codec::Querystring;
use crate::model::{
    ActivityItem, ActivityListener, ParamRegistry, ParsedEmail, PostOutcome, ReportContext,
};

/// Priority-ordered subscriber table.
///
/// The bus is written while extensions bootstrap and only read afterwards.
/// `HookBus` is `Send + Sync`.
#[derive(Default, Clone)]
pub struct HookBus {
    chains: BTreeMap<HookEvent, Vec<HookRegistration>>,
}

impl HookBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber after every existing one with the same or a lower
    /// priority.
    pub fn register(&mut self, registration: HookRegistration) {
        let chain = self.chains.entry(registration.event()).or_default();
        let at = chain.partition_point(|existing| existing.priority <= registration.priority);
        trace!(
            event = %registration.event(),
            owner = %registration.owner,
            priority = registration.priority,
            position = at,
            "Registering hook"
        );
        chain.insert(at, registration);
    }

    /// Adds every registration in order.
    pub fn register_all(&mut self, registrations: impl IntoIterator<Item = HookRegistration>) {
        for registration in registrations {
            self.register(registration);
        }
    }

    /// Returns the number of subscribers of `event`.
    pub fn subscriber_count(&self, event: HookEvent) -> usize {
        self.chains.get(&event).map_or(0, Vec::len)
    }

    /// Returns the total number of subscribers across all events.
    pub fn total_subscribers(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    /// Returns the owners of `event`'s subscribers in dispatch order.
    pub fn owners(&self, event: HookEvent) -> Vec<&str> {
        self.chain(event).map(|r| r.owner.as_str()).collect()
    }

    fn chain(&self, event: HookEvent) -> impl Iterator<Item = &HookRegistration> {
        self.chains.get(&event).into_iter().flatten()
    }

    // ─── folds ────────────────────────────────────────────────────────────────

    /// Broadcasts a fresh listener record for `item` to every subscriber.
    ///
    /// When several subscribers claim the item the last one wins; each
    /// overwrite is logged.
    pub fn extend_listener(&self, item: &ActivityItem) -> ActivityListener {
        let span = span!(Level::DEBUG, "listener_extend", kind = %item.kind, item_id = %item.item_id);
        let _enter = span.enter();

        self.chain(HookEvent::ListenerExtend)
            .fold(ActivityListener::new(), |listener, registration| {
                let HookHandler::ListenerExtend(handler) = &registration.handler else {
                    return listener;
                };
                let previous = listener.component.clone();
                let next = handler(listener, item);
                if !previous.is_empty() && next.component != previous {
                    debug!(
                        previous = %previous,
                        winner = %next.component,
                        "Listener claim overwritten by a later subscriber"
                    );
                }
                next
            })
    }

    /// Folds the querystring for `listener`, starting from an empty one.
    pub fn extend_querystring(&self, listener: &ActivityListener) -> Querystring {
        self.chain(HookEvent::QuerystringExtend)
            .fold(Querystring::new(), |qs, registration| match &registration.handler {
                HookHandler::QuerystringExtend(handler) => handler(qs, listener),
                _ => qs,
            })
    }

    /// Folds the parameter registry, starting from `initial`.
    pub fn allowed_params(&self, initial: ParamRegistry) -> ParamRegistry {
        self.chain(HookEvent::AllowedParams)
            .fold(initial, |params, registration| match &registration.handler {
                HookHandler::AllowedParams(handler) => handler(params),
                _ => params,
            })
    }

    /// Runs the `parse-completed` chain for one parsed email.
    pub fn parse_completed(&self, data: &ParsedEmail, params: &ParamRegistry) -> PostOutcome {
        self.chain(HookEvent::ParseCompleted)
            .fold(PostOutcome::Pending, |outcome, registration| {
                match &registration.handler {
                    HookHandler::ParseCompleted(handler) => handler(outcome, data, params),
                    _ => outcome,
                }
            })
    }

    /// Folds the operator log text of a failed email.
    pub fn log_no_match(&self, initial: String, ctx: &ReportContext<'_>) -> String {
        self.chain(HookEvent::LogNoMatch)
            .fold(initial, |log, registration| match &registration.handler {
                HookHandler::LogNoMatch(handler) => handler(log, ctx),
                _ => log,
            })
    }

    /// Folds the message sent back to the sender of a failed email.
    pub fn no_match_email_message(&self, initial: String, ctx: &ReportContext<'_>) -> String {
        self.chain(HookEvent::NoMatchEmailMessage)
            .fold(initial, |message, registration| match &registration.handler {
                HookHandler::NoMatchEmailMessage(handler) => handler(message, ctx),
                _ => message,
            })
    }
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .chains
            .iter()
            .map(|(event, chain)| (event.name(), chain.len()))
            .collect();
        f.debug_struct("HookBus").field("subscribers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ExtensionConfig, ExtensionDescriptor};
    use crate::hooks::DEFAULT_PRIORITY;
    use crate::model::{EmailHeaders, FailureKind, ItemId};

    fn claim(id: &'static str) -> HookRegistration {
        HookRegistration::new(
            id,
            HookHandler::listener_extend(move |mut listener, item| {
                if item.kind == "forum_topic" {
                    listener.component = id.to_string();
                    listener.item_id = Some(item.item_id);
                }
                listener
            }),
        )
    }

    fn append(owner: &'static str, priority: i32) -> HookRegistration {
        HookRegistration::new(
            owner,
            HookHandler::log_no_match(move |log, _| format!("{log}{owner}")),
        )
        .with_priority(priority)
    }

    #[test]
    fn test_empty_bus_returns_initial_values() {
        let bus = HookBus::new();
        let item = ActivityItem::new("forum_topic", 1);
        assert_eq!(bus.extend_listener(&item), ActivityListener::new());
        assert!(bus.extend_querystring(&ActivityListener::new()).is_empty());
        assert_eq!(
            bus.parse_completed(&ParsedEmail::default(), &ParamRegistry::new()),
            PostOutcome::Pending
        );
        assert_eq!(bus.total_subscribers(), 0);
    }

    #[test]
    fn test_priority_then_registration_order() {
        let mut bus = HookBus::new();
        bus.register(append("b", DEFAULT_PRIORITY));
        bus.register(append("late", 99));
        bus.register(append("c", DEFAULT_PRIORITY));
        bus.register(append("early", 1));

        assert_eq!(bus.owners(HookEvent::LogNoMatch), vec!["early", "b", "c", "late"]);

        let kind = FailureKind::Unclaimed;
        let headers = EmailHeaders::new();
        let ctx = ReportContext {
            kind: &kind,
            headers: &headers,
            index: 0,
            mailbox: "INBOX",
        };
        assert_eq!(bus.log_no_match(String::new(), &ctx), "earlybclate");
    }

    #[test]
    fn test_last_registered_claim_wins() {
        let mut bus = HookBus::new();
        bus.register(claim("a"));
        bus.register(claim("b"));

        let listener = bus.extend_listener(&ActivityItem::new("forum_topic", 42));
        assert_eq!(listener.component, "b");
        assert_eq!(listener.item_id, Some(ItemId(42)));
        assert_eq!(bus.subscriber_count(HookEvent::ListenerExtend), 2);
    }

    #[test]
    fn test_allowed_params_chains_output() {
        let mut bus = HookBus::new();
        for name in ["t", "g"] {
            bus.register(HookRegistration::new(
                name,
                HookHandler::allowed_params(move |mut params| {
                    params.reserve(name);
                    params
                }),
            ));
        }
        let params = bus.allowed_params(ParamRegistry::with_reserved(["a"]));
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["a", "t", "g"]);
    }

    #[test]
    fn test_owner_querystring_discards_earlier_links() {
        let owner = ExtensionDescriptor::from_config(
            &ExtensionConfig::new("topic-reply", "t").event_type("forum_topic"),
        )
        .unwrap();

        let mut bus = HookBus::new();
        bus.register(HookRegistration::new(
            "group",
            HookHandler::querystring_extend(|qs, _| qs.with("g", "1")),
        ));
        bus.register(HookRegistration::new(
            "topic-reply",
            HookHandler::querystring_extend(move |qs, listener| owner.querystring_for(qs, listener)),
        ));

        let listener = ActivityListener {
            component: "topic-reply".into(),
            item_id: Some(ItemId(42)),
            secondary_item_id: None,
        };
        assert_eq!(bus.extend_querystring(&listener).to_string(), "t=42");

        let foreign = ActivityListener {
            component: "group".into(),
            ..listener
        };
        assert_eq!(bus.extend_querystring(&foreign).to_string(), "g=1");
    }
}
