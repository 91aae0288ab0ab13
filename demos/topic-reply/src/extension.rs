//! The forum topic reply extension.

use std::sync::Arc;

use rbe::core::{FailureKind, ReportContext};
use rbe::prelude::*;

use crate::store::{ReplyRejection, TopicStore};

/// Activity item type of "new reply in a topic" notifications.
pub const EVENT_TYPE: &str = "forum_reply";

/// Posts email replies into forum topics.
///
/// The primary parameter carries the topic id, the optional secondary
/// parameter the reply being answered.
pub struct TopicReply {
    store: Arc<TopicStore>,
}

impl TopicReply {
    pub fn new(store: Arc<TopicStore>) -> Self {
        Self { store }
    }

    /// The bootstrap settings used when no `[extensions.topic_reply]` table is
    /// configured.
    pub fn default_config() -> ExtensionConfig {
        ExtensionConfig::new("topic_reply", "t")
            .event_type(EVENT_TYPE)
            .secondary_param("r")
    }
}

impl Extension for TopicReply {
    fn post(
        &self,
        descriptor: &ExtensionDescriptor,
        data: &ParsedEmail,
        params: &ParamRegistry,
    ) -> Result<ItemId, PostFailure> {
        let topic = params
            .item_id(descriptor.primary_param())
            .ok_or_else(|| PostFailure::extension("invalid_topic", "topic id is not a number"))?;
        let parent = descriptor
            .secondary_param()
            .and_then(|name| params.item_id(name));

        let body = data.content.trim();
        if body.is_empty() {
            return Err(PostFailure::extension("empty_reply", "the reply has no text"));
        }

        self.store
            .add_reply(topic, parent, &data.sender, body)
            .map_err(|rejection| match rejection {
                ReplyRejection::UnknownTopic => PostFailure::extension(
                    "topic_not_found",
                    format!("topic {topic} does not exist"),
                ),
                ReplyRejection::Locked => {
                    PostFailure::extension("topic_locked", format!("topic {topic} is locked"))
                }
            })
    }

    fn failure_message_to_sender(
        &self,
        _descriptor: &ExtensionDescriptor,
        message: String,
        ctx: &ReportContext<'_>,
    ) -> String {
        match ctx.kind {
            FailureKind::Extension(code) if code == "topic_locked" => {
                "The topic you replied to has been locked, so no new replies are accepted."
                    .to_string()
            }
            _ => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use rbe::core::{ActivityItem, EmailHeaders};
    use rbe::runtime::{InboundEmail, NoopNotifier, Pipeline};

    use super::*;

    fn registry(store: &Arc<TopicStore>) -> Arc<ExtensionRegistry> {
        let mut host = ExtensionHost::with_reserved_params(["a"]);
        host.bootstrap(TopicReply::new(Arc::clone(store)), &TopicReply::default_config())
            .unwrap();
        Arc::new(host.seal())
    }

    fn codec() -> ReplyAddressCodec {
        ReplyAddressCodec::new("reply", "forum.example", "secret")
    }

    fn reply(to: &str, body: &str) -> InboundEmail {
        let headers = EmailHeaders::new()
            .with("From", "Jane <jane@example.org>")
            .with("To", to)
            .with("Subject", "Re: Welcome");
        InboundEmail::new(0, headers, body)
    }

    #[tokio::test]
    async fn test_reply_to_notification_is_posted() {
        let store = Arc::new(TopicStore::new());
        let topic = store.create_topic("Welcome");
        let first = store.add_reply(topic, None, "bob@example.org", "hi").unwrap();
        let registry = registry(&store);

        let item = ActivityItem::new(EVENT_TYPE, topic).with_secondary(first);
        let to = registry.reply_to_for(&item, &codec()).unwrap().unwrap();

        let pipeline = Pipeline::new(registry, codec(), Arc::new(NoopNotifier), "INBOX");
        let report = pipeline.process(&reply(&to, "Thanks Bob!\n")).await;
        assert!(report.is_posted());

        let replies = store.topic(topic).unwrap().replies;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].parent, Some(first));
        assert_eq!(replies[1].author, "jane@example.org");
        assert_eq!(replies[1].body, "Thanks Bob!");
    }

    #[test]
    fn test_other_item_types_get_no_reply_address() {
        let store = Arc::new(TopicStore::new());
        let registry = registry(&store);

        let item = ActivityItem::new("group_update", 4u64);
        assert_eq!(registry.reply_to_for(&item, &codec()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_locked_topic_message_replaces_default() {
        let store = Arc::new(TopicStore::new());
        let topic = store.create_topic("Closed");
        store.lock_topic(topic);
        let registry = registry(&store);

        let item = ActivityItem::new(EVENT_TYPE, topic);
        let to = registry.reply_to_for(&item, &codec()).unwrap().unwrap();
        let email = reply(&to, "late");
        let pipeline = Pipeline::new(
            Arc::clone(&registry),
            codec(),
            Arc::new(NoopNotifier),
            "INBOX",
        );
        let report = pipeline.process(&email).await;

        let failure = report.failure().unwrap();
        assert_eq!(failure.kind.as_str(), "topic_locked");

        let ctx = ReportContext {
            kind: &failure.kind,
            headers: &email.headers,
            index: 0,
            mailbox: "INBOX",
        };
        assert!(
            registry
                .failure_message(String::new(), &ctx)
                .contains("has been locked")
        );
    }
}
