//! Extension descriptor and its configuration shape.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::Querystring;
use crate::error::{BootstrapError, BootstrapResult};
use crate::model::{ActivityItem, ActivityListener, ParamRegistry};

// ─── ExtensionConfig ──────────────────────────────────────────────────────────

/// Descriptor-shaped configuration accepted at bootstrap.
///
/// Every field is optional so the value can come straight from a config file;
/// [`ExtensionDescriptor::from_config`] decides what is required. Blank
/// strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExtensionConfig {
    pub id: Option<String>,
    #[serde(alias = "eventType")]
    pub event_type: Option<String>,
    #[serde(alias = "primaryParam")]
    pub primary_param: Option<String>,
    #[serde(alias = "secondaryParam")]
    pub secondary_param: Option<String>,
}

impl ExtensionConfig {
    /// Creates a config with the two required fields set.
    pub fn new(id: impl Into<String>, primary_param: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            primary_param: Some(primary_param.into()),
            ..Self::default()
        }
    }

    /// Sets the event type (builder pattern).
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the secondary parameter (builder pattern).
    pub fn secondary_param(mut self, param: impl Into<String>) -> Self {
        self.secondary_param = Some(param.into());
        self
    }

    /// Returns `true` when no field carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        [
            &self.id,
            &self.event_type,
            &self.primary_param,
            &self.secondary_param,
        ]
        .into_iter()
        .all(|field| non_blank(field).is_none())
    }
}

fn non_blank(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// ─── ExtensionDescriptor ──────────────────────────────────────────────────────

/// Immutable identity of a bootstrapped extension.
///
/// Only [`from_config`](Self::from_config) builds one, so a descriptor always
/// has a non-empty id and primary parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionDescriptor {
    id: String,
    event_type: Option<String>,
    primary_param: String,
    secondary_param: Option<String>,
}

impl ExtensionDescriptor {
    /// Validates `config` into a descriptor.
    pub fn from_config(config: &ExtensionConfig) -> BootstrapResult<Self> {
        if config.is_empty() {
            return Err(BootstrapError::EmptyConfig);
        }
        let id = non_blank(&config.id).ok_or(BootstrapError::missing_field("id"))?;
        let primary_param = non_blank(&config.primary_param)
            .ok_or(BootstrapError::missing_field("primary_param"))?;
        let secondary_param = non_blank(&config.secondary_param);

        if secondary_param.as_deref() == Some(primary_param.as_str()) {
            return Err(BootstrapError::SameParams {
                id,
                param: primary_param,
            });
        }

        Ok(Self {
            id,
            event_type: non_blank(&config.event_type),
            primary_param,
            secondary_param,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn primary_param(&self) -> &str {
        &self.primary_param
    }

    pub fn secondary_param(&self) -> Option<&str> {
        self.secondary_param.as_deref()
    }

    /// Returns `true` if this descriptor handles items of `kind`.
    ///
    /// A descriptor without an event type matches nothing.
    pub fn matches(&self, kind: &str) -> bool {
        !kind.is_empty() && self.event_type.as_deref() == Some(kind)
    }

    /// Returns `true` if the decoded `params` carry this extension's primary
    /// parameter.
    pub fn claims(&self, params: &ParamRegistry) -> bool {
        params.value(&self.primary_param).is_some()
    }

    // ─── default chain links ──────────────────────────────────────────────────

    /// Writes this extension's claim into `listener` when `item` matches.
    pub fn fill_listener(&self, mut listener: ActivityListener, item: &ActivityItem) -> ActivityListener {
        if !self.matches(&item.kind) {
            return listener;
        }
        listener.component = self.id.clone();
        listener.item_id = Some(item.item_id);
        if self.secondary_param.is_some() {
            listener.secondary_item_id = item.secondary_item_id;
        }
        listener
    }

    /// Replaces `querystring` with this extension's segment when it owns
    /// `listener`.
    pub fn querystring_for(&self, querystring: Querystring, listener: &ActivityListener) -> Querystring {
        if listener.component != self.id {
            return querystring;
        }
        Querystring::for_ids(
            (&self.primary_param, listener.item_id),
            self.secondary_param
                .as_deref()
                .map(|name| (name, listener.secondary_item_id)),
        )
    }

    /// Reserves this extension's parameter names in `params`.
    ///
    /// When any of them is already taken, warns and returns `params`
    /// unchanged.
    pub fn register_params(&self, mut params: ParamRegistry) -> ParamRegistry {
        let names = std::iter::once(self.primary_param.as_str()).chain(self.secondary_param.as_deref());
        if let Some(taken) = names.clone().find(|name| params.contains(name)) {
            warn!(
                extension = %self.id,
                param = taken,
                "Parameter name already registered, skipping parameter registration"
            );
            return params;
        }
        for name in names {
            params.reserve(name);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemId;

    fn topic_reply() -> ExtensionDescriptor {
        ExtensionDescriptor::from_config(
            &ExtensionConfig::new("topic-reply", "t")
                .event_type("forum_topic")
                .secondary_param("r"),
        )
        .unwrap()
    }

    #[test]
    fn test_from_config_requires_fields() {
        assert_eq!(
            ExtensionDescriptor::from_config(&ExtensionConfig::default()),
            Err(BootstrapError::EmptyConfig)
        );

        let blank = ExtensionConfig {
            id: Some("  ".into()),
            ..ExtensionConfig::default()
        };
        assert_eq!(ExtensionDescriptor::from_config(&blank), Err(BootstrapError::EmptyConfig));

        let no_id = ExtensionConfig {
            primary_param: Some("t".into()),
            ..ExtensionConfig::default()
        };
        assert_eq!(
            ExtensionDescriptor::from_config(&no_id),
            Err(BootstrapError::missing_field("id"))
        );

        let no_param = ExtensionConfig {
            id: Some("x".into()),
            ..ExtensionConfig::default()
        };
        assert_eq!(
            ExtensionDescriptor::from_config(&no_param),
            Err(BootstrapError::missing_field("primary_param"))
        );
    }

    #[test]
    fn test_from_config_rejects_same_params() {
        let config = ExtensionConfig::new("x", "t").secondary_param("t");
        assert!(matches!(
            ExtensionDescriptor::from_config(&config),
            Err(BootstrapError::SameParams { .. })
        ));
    }

    #[test]
    fn test_config_accepts_camel_case_keys() {
        let config: ExtensionConfig = serde_json::from_value(serde_json::json!({
            "id": "topic-reply",
            "eventType": "forum_topic",
            "primaryParam": "t",
            "secondaryParam": "r",
        }))
        .unwrap();
        let descriptor = ExtensionDescriptor::from_config(&config).unwrap();
        assert_eq!(descriptor, topic_reply());
    }

    #[test]
    fn test_fill_listener_only_on_match() {
        let descriptor = topic_reply();
        let other = ActivityItem::new("group_details", 1);
        assert_eq!(
            descriptor.fill_listener(ActivityListener::new(), &other),
            ActivityListener::new()
        );

        let item = ActivityItem::new("forum_topic", 42).with_secondary(7);
        let listener = descriptor.fill_listener(ActivityListener::new(), &item);
        assert_eq!(listener.component, "topic-reply");
        assert_eq!(listener.item_id, Some(ItemId(42)));
        assert_eq!(listener.secondary_item_id, Some(ItemId(7)));
    }

    #[test]
    fn test_fill_listener_ignores_secondary_without_param() {
        let descriptor = ExtensionDescriptor::from_config(
            &ExtensionConfig::new("group", "g").event_type("group_details"),
        )
        .unwrap();
        let item = ActivityItem::new("group_details", 3).with_secondary(9);
        let listener = descriptor.fill_listener(ActivityListener::new(), &item);
        assert_eq!(listener.item_id, Some(ItemId(3)));
        assert_eq!(listener.secondary_item_id, None);
    }

    #[test]
    fn test_missing_event_type_matches_nothing() {
        let descriptor = ExtensionDescriptor::from_config(&ExtensionConfig::new("x", "x")).unwrap();
        assert!(!descriptor.matches(""));
        assert!(!descriptor.matches("forum_topic"));
    }

    #[test]
    fn test_querystring_for_owner_only() {
        let descriptor = topic_reply();
        let listener = ActivityListener {
            component: "topic-reply".into(),
            item_id: Some(ItemId(42)),
            secondary_item_id: Some(ItemId(7)),
        };
        assert_eq!(
            descriptor.querystring_for(Querystring::new(), &listener).to_string(),
            "t=42&r=7"
        );

        let foreign = ActivityListener {
            component: "other".into(),
            ..listener
        };
        let input = Querystring::new().with("g", "1");
        assert_eq!(descriptor.querystring_for(input.clone(), &foreign), input);
    }

    #[test]
    fn test_querystring_for_owner_replaces_running_value() {
        let descriptor = topic_reply();
        let listener = ActivityListener {
            component: "topic-reply".into(),
            item_id: Some(ItemId(42)),
            secondary_item_id: Some(ItemId(7)),
        };
        let running = Querystring::new().with("g", "1");
        assert_eq!(
            descriptor.querystring_for(running, &listener).to_string(),
            "t=42&r=7"
        );
    }

    #[test]
    fn test_register_params_is_idempotent_on_conflict() {
        let descriptor = topic_reply();
        let params = ParamRegistry::with_reserved(["r"]);

        let once = descriptor.register_params(params.clone());
        assert_eq!(once, params);
        let twice = descriptor.register_params(once);
        assert_eq!(twice, params);

        let fresh = descriptor.register_params(ParamRegistry::new());
        assert_eq!(fresh.names().collect::<Vec<_>>(), vec!["t", "r"]);
    }
}
