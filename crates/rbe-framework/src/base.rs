//! Bootstrapped extensions and their hook registrations.

use std::sync::Arc;

use rbe_core::{
    BootstrapResult, ExtensionConfig, ExtensionDescriptor, HookHandler, HookRegistration,
    PostOutcome,
};
use tracing::{info, warn};

use crate::extension::Extension;

/// An extension paired with its validated descriptor.
///
/// The only way to obtain one is [`bootstrap`](Self::bootstrap), which
/// consumes the bare extension. A bootstrapped extension therefore cannot be
/// bootstrapped again.
pub struct ExtensionBase<E> {
    extension: Arc<E>,
    descriptor: Arc<ExtensionDescriptor>,
}

impl<E: Extension> ExtensionBase<E> {
    /// Validates `config` and binds it to `extension`.
    ///
    /// On failure a warning is logged and the extension is dropped without
    /// contributing anything to the host.
    pub fn bootstrap(extension: E, config: &ExtensionConfig) -> BootstrapResult<Self> {
        let descriptor = ExtensionDescriptor::from_config(config).inspect_err(|e| {
            warn!(
                extension = config.id.as_deref().unwrap_or("<unnamed>"),
                error = %e,
                "Extension bootstrap failed, extension stays inert"
            );
        })?;

        info!(
            extension = %descriptor.id(),
            event_type = descriptor.event_type().unwrap_or("-"),
            primary_param = %descriptor.primary_param(),
            secondary_param = descriptor.secondary_param().unwrap_or("-"),
            "Extension bootstrapped"
        );

        Ok(Self {
            extension: Arc::new(extension),
            descriptor: Arc::new(descriptor),
        })
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    pub fn extension(&self) -> &E {
        &self.extension
    }

    pub fn id(&self) -> &str {
        self.descriptor.id()
    }

    /// The six hook registrations of this extension, all at the default
    /// priority.
    ///
    /// The `parse-completed` handler only calls [`Extension::post`] while the
    /// chain is still pending and the decoded parameters carry this
    /// extension's primary parameter. Otherwise the running value passes
    /// through untouched.
    pub fn hooks(&self) -> Vec<HookRegistration> {
        let id = self.id();
        vec![
            HookRegistration::new(id, {
                let (ext, desc) = self.parts();
                HookHandler::listener_extend(move |listener, item| {
                    ext.extend_activity_listener(&desc, listener, item)
                })
            }),
            HookRegistration::new(id, {
                let (ext, desc) = self.parts();
                HookHandler::querystring_extend(move |qs, listener| {
                    ext.extend_querystring(&desc, qs, listener)
                })
            }),
            HookRegistration::new(id, {
                let (ext, desc) = self.parts();
                HookHandler::allowed_params(move |params| ext.register_params(&desc, params))
            }),
            HookRegistration::new(id, {
                let (ext, desc) = self.parts();
                HookHandler::parse_completed(move |outcome, data, params| {
                    if !outcome.is_pending() || !desc.claims(params) {
                        return outcome;
                    }
                    match ext.post(&desc, data, params) {
                        Ok(item_id) => {
                            info!(extension = %desc.id(), %item_id, "Reply posted");
                            PostOutcome::posted(item_id).stamp(desc.id())
                        }
                        Err(failure) => {
                            warn!(
                                extension = %desc.id(),
                                kind = %failure.kind,
                                reason = %failure.reason,
                                "Reply could not be posted"
                            );
                            PostOutcome::Failed(failure)
                        }
                    }
                })
            }),
            HookRegistration::new(id, {
                let (ext, desc) = self.parts();
                HookHandler::log_no_match(move |log, ctx| ext.internal_log(&desc, log, ctx))
            }),
            HookRegistration::new(id, {
                let (ext, desc) = self.parts();
                HookHandler::no_match_email_message(move |message, ctx| {
                    ext.failure_message_to_sender(&desc, message, ctx)
                })
            }),
        ]
    }

    fn parts(&self) -> (Arc<E>, Arc<ExtensionDescriptor>) {
        (Arc::clone(&self.extension), Arc::clone(&self.descriptor))
    }
}

impl<E> std::fmt::Debug for ExtensionBase<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionBase")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rbe_core::{
        ActivityItem, BootstrapError, HookBus, HookEvent, ItemId, ParamRegistry, ParsedEmail,
        PostFailure, Querystring,
    };

    use super::*;

    struct Fixed(Result<u64, &'static str>);

    impl Extension for Fixed {
        fn post(
            &self,
            _descriptor: &ExtensionDescriptor,
            _data: &ParsedEmail,
            _params: &ParamRegistry,
        ) -> Result<ItemId, PostFailure> {
            self.0
                .map(ItemId)
                .map_err(|code| PostFailure::extension(code, "refused"))
        }
    }

    fn topic_config() -> ExtensionConfig {
        ExtensionConfig::new("topic-reply", "t")
            .event_type("forum_topic")
            .secondary_param("r")
    }

    fn bus_for<E: Extension>(base: &ExtensionBase<E>) -> HookBus {
        let mut bus = HookBus::new();
        bus.register_all(base.hooks());
        bus
    }

    #[test]
    fn test_bootstrap_rejects_empty_config() {
        let result = ExtensionBase::bootstrap(Fixed(Ok(1)), &ExtensionConfig::default());
        assert!(matches!(result, Err(BootstrapError::EmptyConfig)));
    }

    #[test]
    fn test_hooks_cover_every_event() {
        let base = ExtensionBase::bootstrap(Fixed(Ok(1)), &topic_config()).unwrap();
        let bus = bus_for(&base);
        for event in HookEvent::ALL {
            assert_eq!(bus.subscriber_count(event), 1, "{event}");
        }
        assert_eq!(bus.owners(HookEvent::ParseCompleted), vec!["topic-reply"]);
    }

    #[test]
    fn test_end_to_end_reply_to_querystring() {
        let base = ExtensionBase::bootstrap(Fixed(Ok(1)), &topic_config()).unwrap();
        let bus = bus_for(&base);

        let item = ActivityItem::new("forum_topic", 42).with_secondary(7);
        let listener = bus.extend_listener(&item);
        assert_eq!(listener.component, "topic-reply");
        assert_eq!(listener.item_id, Some(ItemId(42)));
        assert_eq!(listener.secondary_item_id, Some(ItemId(7)));
        assert_eq!(bus.extend_querystring(&listener).to_string(), "t=42&r=7");
    }

    #[test]
    fn test_post_only_runs_when_claimed_and_pending() {
        let base = ExtensionBase::bootstrap(Fixed(Ok(99)), &topic_config()).unwrap();
        let bus = bus_for(&base);
        let registry = bus.allowed_params(ParamRegistry::new());
        let data = ParsedEmail::default();

        let unclaimed = registry.resolve(&Querystring::parse("g=3").unwrap());
        assert_eq!(bus.parse_completed(&data, &unclaimed), PostOutcome::Pending);

        let claimed = registry.resolve(&Querystring::parse("t=42&r=7").unwrap());
        let PostOutcome::Posted(receipt) = bus.parse_completed(&data, &claimed) else {
            panic!("expected a receipt");
        };
        assert_eq!(receipt.item_id, ItemId(99));
        assert_eq!(receipt.extension, "topic-reply");
    }

    #[test]
    fn test_post_failure_is_returned() {
        let base = ExtensionBase::bootstrap(Fixed(Err("topic_closed")), &topic_config()).unwrap();
        let bus = bus_for(&base);
        let params = bus
            .allowed_params(ParamRegistry::new())
            .resolve(&Querystring::parse("t=1").unwrap());

        let outcome = bus.parse_completed(&ParsedEmail::default(), &params);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind.as_str(), "topic_closed");
    }
}
