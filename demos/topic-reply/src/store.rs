//! An in-memory forum: topics and their replies.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use rbe::core::ItemId;
use serde::{Deserialize, Serialize};

/// One reply in a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: ItemId,
    /// Reply this one answers, when it was sent to a reply notification.
    pub parent: Option<ItemId>,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: ItemId,
    pub title: String,
    pub locked: bool,
    pub replies: Vec<Reply>,
}

/// Why a reply was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyRejection {
    UnknownTopic,
    Locked,
}

#[derive(Debug, Default)]
struct StoreInner {
    topics: BTreeMap<ItemId, Topic>,
    next_id: u64,
}

impl StoreInner {
    fn allocate(&mut self) -> ItemId {
        self.next_id += 1;
        ItemId(self.next_id)
    }
}

/// Topics and replies share one id sequence.
#[derive(Debug, Default)]
pub struct TopicStore {
    inner: RwLock<StoreInner>,
}

impl TopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_topic(&self, title: impl Into<String>) -> ItemId {
        let mut inner = self.inner.write();
        let id = inner.allocate();
        inner.topics.insert(
            id,
            Topic {
                id,
                title: title.into(),
                locked: false,
                replies: Vec::new(),
            },
        );
        id
    }

    /// Returns `false` if the topic does not exist.
    pub fn lock_topic(&self, topic: ItemId) -> bool {
        match self.inner.write().topics.get_mut(&topic) {
            Some(topic) => {
                topic.locked = true;
                true
            }
            None => false,
        }
    }

    pub fn add_reply(
        &self,
        topic: ItemId,
        parent: Option<ItemId>,
        author: &str,
        body: &str,
    ) -> Result<ItemId, ReplyRejection> {
        let mut inner = self.inner.write();
        match inner.topics.get(&topic) {
            None => return Err(ReplyRejection::UnknownTopic),
            Some(topic) if topic.locked => return Err(ReplyRejection::Locked),
            Some(_) => {}
        }

        let id = inner.allocate();
        let reply = Reply {
            id,
            parent,
            author: author.to_string(),
            body: body.to_string(),
        };
        if let Some(topic) = inner.topics.get_mut(&topic) {
            topic.replies.push(reply);
        }
        Ok(id)
    }

    pub fn topic(&self, id: ItemId) -> Option<Topic> {
        self.inner.read().topics.get(&id).cloned()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.inner.read().topics.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_share_the_id_sequence() {
        let store = TopicStore::new();
        let topic = store.create_topic("Hello");
        let reply = store.add_reply(topic, None, "jane@example.org", "hi").unwrap();

        assert_eq!(topic, ItemId(1));
        assert_eq!(reply, ItemId(2));
        assert_eq!(store.topic(topic).unwrap().replies[0].body, "hi");
    }

    #[test]
    fn test_locked_topic_refuses_replies() {
        let store = TopicStore::new();
        let topic = store.create_topic("Closed");
        assert!(store.lock_topic(topic));

        assert_eq!(
            store.add_reply(topic, None, "jane@example.org", "late"),
            Err(ReplyRejection::Locked)
        );
        assert_eq!(
            store.add_reply(ItemId(99), None, "jane@example.org", "lost"),
            Err(ReplyRejection::UnknownTopic)
        );
    }
}
