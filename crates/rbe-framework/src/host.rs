//! Extension host: bootstrap barrier, hook wiring and the sealed registry.
//!
//! [`ExtensionHost`] is the building phase. Extensions are bootstrapped into
//! it one by one; each successful bootstrap registers the extension's hooks on
//! the host-owned [`HookBus`]. [`seal`](ExtensionHost::seal) is the
//! initialization barrier: it folds `allowed-params` once and returns an
//! immutable [`ExtensionRegistry`] that the runtime shares through `Arc`.
//!
//! ```rust,ignore
//! let mut host = ExtensionHost::with_reserved_params(["a"]);
//! host.bootstrap(TopicReply::new(store), &config)?;
//! let registry = Arc::new(host.seal());
//!
//! let reply_to = registry.reply_to_for(&item, &codec)?;
//! ```

use rbe_core::{
    ActivityItem, ActivityListener, BootstrapError, BootstrapResult, ExtensionConfig,
    ExtensionDescriptor, HookBus, ParamRegistry, ParsedEmail, PostOutcome, Querystring,
    ReplyAddressCodec, ReplyAddressResult, ReportContext,
};
use tracing::{debug, info, warn};

use crate::base::ExtensionBase;
use crate::extension::Extension;

// =============================================================================
// Building phase
// =============================================================================

/// Collects extensions and their hooks before the host starts processing.
#[derive(Debug, Default)]
pub struct ExtensionHost {
    bus: HookBus,
    reserved: ParamRegistry,
    descriptors: Vec<ExtensionDescriptor>,
}

impl ExtensionHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host with parameter names the host itself already uses.
    pub fn with_reserved_params<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: ParamRegistry::with_reserved(names),
            ..Self::default()
        }
    }

    /// Bootstraps `extension` with `config` and registers its hooks.
    ///
    /// A failed bootstrap, or an id already taken by another extension,
    /// leaves the bus untouched.
    pub fn bootstrap<E: Extension>(
        &mut self,
        extension: E,
        config: &ExtensionConfig,
    ) -> BootstrapResult<()> {
        let base = ExtensionBase::bootstrap(extension, config)?;
        self.register(base)
    }

    /// Registers an already bootstrapped extension.
    pub fn register<E: Extension>(&mut self, base: ExtensionBase<E>) -> BootstrapResult<()> {
        if self.descriptors.iter().any(|d| d.id() == base.id()) {
            warn!(extension = %base.id(), "Duplicate extension id, skipping");
            return Err(BootstrapError::DuplicateId(base.id().to_string()));
        }

        self.bus.register_all(base.hooks());
        self.descriptors.push(base.descriptor().clone());
        debug!(
            extension = %base.id(),
            subscribers = self.bus.total_subscribers(),
            "Extension hooks registered"
        );
        Ok(())
    }

    /// Returns the number of registered extensions.
    pub fn extension_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Read access to the bus for inspection.
    pub fn bus(&self) -> &HookBus {
        &self.bus
    }

    /// Ends the building phase.
    ///
    /// Folds `allowed-params` over the reserved names to build the final
    /// parameter registry.
    pub fn seal(self) -> ExtensionRegistry {
        let params = self.bus.allowed_params(self.reserved);
        info!(
            extensions = self.descriptors.len(),
            params = ?params.names().collect::<Vec<_>>(),
            "Extension host sealed"
        );
        ExtensionRegistry {
            bus: self.bus,
            params,
            descriptors: self.descriptors,
        }
    }
}

// =============================================================================
// Sealed registry
// =============================================================================

/// The immutable, shareable result of [`ExtensionHost::seal`].
#[derive(Debug)]
pub struct ExtensionRegistry {
    bus: HookBus,
    params: ParamRegistry,
    descriptors: Vec<ExtensionDescriptor>,
}

impl ExtensionRegistry {
    /// The registered parameter names, all with placeholder values.
    pub fn params(&self) -> &ParamRegistry {
        &self.params
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[ExtensionDescriptor] {
        &self.descriptors
    }

    /// Looks up a descriptor by extension id.
    pub fn descriptor(&self, id: &str) -> Option<&ExtensionDescriptor> {
        self.descriptors.iter().find(|d| d.id() == id)
    }

    pub fn bus(&self) -> &HookBus {
        &self.bus
    }

    // ─── outbound ─────────────────────────────────────────────────────────────

    /// Runs `listener-extend` for `item`.
    pub fn resolve_listener(&self, item: &ActivityItem) -> ActivityListener {
        self.bus.extend_listener(item)
    }

    /// Runs `querystring-extend` for `listener`.
    pub fn querystring_for(&self, listener: &ActivityListener) -> Querystring {
        self.bus.extend_querystring(listener)
    }

    /// Derives the signed reply address for `item`.
    ///
    /// Returns `Ok(None)` when no extension claims the item.
    pub fn reply_to_for(
        &self,
        item: &ActivityItem,
        codec: &ReplyAddressCodec,
    ) -> ReplyAddressResult<Option<String>> {
        let listener = self.resolve_listener(item);
        if !listener.is_claimed() {
            debug!(kind = %item.kind, item_id = %item.item_id, "No extension claims item");
            return Ok(None);
        }
        let querystring = self.querystring_for(&listener);
        if querystring.is_empty() {
            return Ok(None);
        }
        codec.encode(&querystring).map(Some)
    }

    // ─── inbound ──────────────────────────────────────────────────────────────

    /// Copies the registry with the values decoded from `querystring`.
    pub fn resolve_params(&self, querystring: &Querystring) -> ParamRegistry {
        self.params.resolve(querystring)
    }

    /// Runs `parse-completed` for one parsed email.
    pub fn post(&self, data: &ParsedEmail, params: &ParamRegistry) -> PostOutcome {
        self.bus.parse_completed(data, params)
    }

    /// Runs `log-no-match`, starting from `initial`.
    pub fn internal_log(&self, initial: String, ctx: &ReportContext<'_>) -> String {
        self.bus.log_no_match(initial, ctx)
    }

    /// Runs `log-no-match-email-message`, starting from `initial`.
    pub fn failure_message(&self, initial: String, ctx: &ReportContext<'_>) -> String {
        self.bus.no_match_email_message(initial, ctx)
    }
}

#[cfg(test)]
mod tests {
    use rbe_core::{
        EmailHeaders, FailureKind, HookEvent, ItemId, PostFailure,
    };

    use super::*;

    /// Records which extension posted by returning a per-extension id.
    struct Stub {
        item: u64,
        note: Option<&'static str>,
    }

    impl Stub {
        fn new(item: u64) -> Self {
            Self { item, note: None }
        }
    }

    impl Extension for Stub {
        fn post(
            &self,
            _descriptor: &ExtensionDescriptor,
            _data: &ParsedEmail,
            _params: &ParamRegistry,
        ) -> Result<ItemId, PostFailure> {
            Ok(ItemId(self.item))
        }

        fn failure_message_to_sender(
            &self,
            descriptor: &ExtensionDescriptor,
            message: String,
            ctx: &ReportContext<'_>,
        ) -> String {
            match (self.note, ctx.kind) {
                (Some(note), FailureKind::Unclaimed) => {
                    format!("{message}[{}] {note}", descriptor.id())
                }
                _ => message,
            }
        }
    }

    fn config(id: &str, event: &str, primary: &str) -> ExtensionConfig {
        ExtensionConfig::new(id, primary).event_type(event)
    }

    #[test]
    fn test_empty_config_registers_nothing() {
        let mut host = ExtensionHost::new();
        let before = host.bus().total_subscribers();

        let result = host.bootstrap(Stub::new(1), &ExtensionConfig::default());
        assert_eq!(result, Err(BootstrapError::EmptyConfig));
        assert_eq!(host.bus().total_subscribers(), before);
        assert_eq!(host.extension_count(), 0);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut host = ExtensionHost::new();
        host.bootstrap(Stub::new(1), &config("a", "forum_topic", "t")).unwrap();
        let result = host.bootstrap(Stub::new(2), &config("a", "group_details", "g"));

        assert_eq!(result, Err(BootstrapError::DuplicateId("a".into())));
        assert_eq!(host.extension_count(), 1);
        assert_eq!(host.bus().subscriber_count(HookEvent::ParseCompleted), 1);
    }

    #[test]
    fn test_shared_event_type_last_registered_wins() {
        let mut host = ExtensionHost::new();
        host.bootstrap(Stub::new(1), &config("a", "forum_topic", "t")).unwrap();
        host.bootstrap(Stub::new(2), &config("b", "forum_topic", "u")).unwrap();
        let registry = host.seal();

        let listener = registry.resolve_listener(&ActivityItem::new("forum_topic", 5));
        assert_eq!(listener.component, "b");
        assert_eq!(registry.querystring_for(&listener).to_string(), "u=5");
    }

    #[test]
    fn test_seal_skips_conflicting_params() {
        let mut host = ExtensionHost::with_reserved_params(["a"]);
        host.bootstrap(Stub::new(1), &config("activity", "activity_comment", "a"))
            .unwrap();
        host.bootstrap(Stub::new(2), &config("topic", "forum_topic", "t"))
            .unwrap();
        let registry = host.seal();

        assert_eq!(registry.params().names().collect::<Vec<_>>(), vec!["a", "t"]);
        assert!(registry.descriptor("activity").is_some());
    }

    #[test]
    fn test_reply_to_for_roundtrips_through_codec() {
        let mut host = ExtensionHost::new();
        host.bootstrap(
            Stub::new(1),
            &config("topic-reply", "forum_topic", "t").secondary_param("r"),
        )
        .unwrap();
        let registry = host.seal();
        let codec = ReplyAddressCodec::new("reply", "example.com", "key");

        let item = ActivityItem::new("forum_topic", 42).with_secondary(7);
        let address = registry.reply_to_for(&item, &codec).unwrap().unwrap();
        let decoded = codec.decode(&address).unwrap();
        assert_eq!(decoded.to_string(), "t=42&r=7");

        let params = registry.resolve_params(&decoded);
        assert_eq!(params.item_id("t"), Some(ItemId(42)));
        assert_eq!(params.item_id("r"), Some(ItemId(7)));

        let unclaimed = ActivityItem::new("private_message", 1);
        assert_eq!(registry.reply_to_for(&unclaimed, &codec), Ok(None));
    }

    #[test]
    fn test_only_claiming_extension_posts() {
        let mut host = ExtensionHost::new();
        host.bootstrap(Stub::new(10), &config("topic", "forum_topic", "t")).unwrap();
        host.bootstrap(Stub::new(20), &config("group", "group_details", "g")).unwrap();
        let registry = host.seal();

        let params = registry.resolve_params(&Querystring::parse("g=3").unwrap());
        let PostOutcome::Posted(receipt) = registry.post(&ParsedEmail::default(), &params) else {
            panic!("expected a receipt");
        };
        assert_eq!(receipt.extension, "group");
        assert_eq!(receipt.item_id, ItemId(20));
    }

    #[test]
    fn test_failure_message_folds_every_extension() {
        let mut host = ExtensionHost::new();
        host.bootstrap(
            Stub {
                item: 1,
                note: Some("unknown topic"),
            },
            &config("topic", "forum_topic", "t"),
        )
        .unwrap();
        host.bootstrap(Stub::new(2), &config("group", "group_details", "g")).unwrap();
        host.bootstrap(
            Stub {
                item: 3,
                note: Some("unknown group"),
            },
            &config("activity", "activity_update", "a"),
        )
        .unwrap();
        let registry = host.seal();

        let headers = EmailHeaders::new();
        let kind = FailureKind::Unclaimed;
        let ctx = ReportContext {
            kind: &kind,
            headers: &headers,
            index: 3,
            mailbox: "INBOX",
        };
        assert_eq!(
            registry.failure_message(String::new(), &ctx),
            "[topic] unknown topic[activity] unknown group"
        );
        assert_eq!(registry.internal_log("base".into(), &ctx), "base");
    }
}
