//! Activity items and the per-item listener record.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a host item (topic, reply, group, message thread, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Returns the raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// An item generated by the host that a reply address is derived for.
///
/// `kind` is matched against each extension's event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub item_id: ItemId,
    #[serde(default)]
    pub secondary_item_id: Option<ItemId>,
}

impl ActivityItem {
    /// Creates an item without a secondary id.
    pub fn new(kind: impl Into<String>, item_id: impl Into<ItemId>) -> Self {
        Self {
            kind: kind.into(),
            item_id: item_id.into(),
            secondary_item_id: None,
        }
    }

    /// Sets the secondary id (builder pattern).
    pub fn with_secondary(mut self, id: impl Into<ItemId>) -> Self {
        self.secondary_item_id = Some(id.into());
        self
    }
}

/// The listener record extensions use to claim an item.
///
/// One record is created empty per item and threaded by value through the
/// `listener-extend` chain. `component` holds the id of the claiming
/// extension, or is empty while unclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityListener {
    pub component: String,
    pub item_id: Option<ItemId>,
    pub secondary_item_id: Option<ItemId>,
}

impl ActivityListener {
    /// Creates an unclaimed record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if any extension has claimed this record.
    pub fn is_claimed(&self) -> bool {
        !self.component.is_empty()
    }

    /// Returns `true` if the extension with `id` owns this record.
    pub fn is_claimed_by(&self, id: &str) -> bool {
        self.is_claimed() && self.component == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_parses_with_whitespace() {
        assert_eq!(" 42 ".parse::<ItemId>().unwrap(), ItemId(42));
        assert!("forty".parse::<ItemId>().is_err());
        assert!("-1".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_activity_item_serializes_kind_as_type() {
        let item = ActivityItem::new("forum_topic", 42).with_secondary(7);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "forum_topic");
        assert_eq!(json["item_id"], 42);
        assert_eq!(json["secondary_item_id"], 7);
    }

    #[test]
    fn test_unclaimed_listener_is_claimed_by_nobody() {
        let listener = ActivityListener::new();
        assert!(!listener.is_claimed());
        assert!(!listener.is_claimed_by(""));
    }
}
