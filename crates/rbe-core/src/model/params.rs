//! The registry of querystring parameter names.

use serde::{Deserialize, Serialize};

use super::ItemId;
use crate::codec::Querystring;

/// Mapping from registered parameter name to its value.
///
/// During startup every name maps to the reserved placeholder (`None`). The
/// pipeline then produces a per-email copy through [`resolve`](Self::resolve)
/// in which the names present in the decoded querystring carry their value.
///
/// Entries keep registration order and are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRegistry {
    entries: Vec<(String, Option<String>)>,
}

impl ParamRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the given names already reserved.
    ///
    /// Duplicate names are reserved once.
    pub fn with_reserved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.reserve(name);
        }
        registry
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// Reserves `name` with the placeholder value.
    ///
    /// Returns `false` without touching the registry when the name is taken.
    pub fn reserve(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, None));
        true
    }

    /// Returns the decoded value of `name`, if any.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Returns the decoded value of `name` parsed as an item id.
    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.value(name).and_then(|value| value.parse().ok())
    }

    /// Returns `true` if at least one registered name carries a value.
    pub fn has_values(&self) -> bool {
        self.entries.iter().any(|(_, value)| value.is_some())
    }

    /// Iterates over the registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Returns the number of registered names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy carrying the values of `querystring`.
    ///
    /// Only registered names are taken over; unknown keys are dropped and
    /// empty values stay absent. When a key repeats, the last value wins.
    pub fn resolve(&self, querystring: &Querystring) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(key, _)| {
                let value = querystring
                    .get(key)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                (key.clone(), value)
            })
            .collect();
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_rejects_duplicates() {
        let mut registry = ParamRegistry::new();
        assert!(registry.reserve("t"));
        assert!(!registry.reserve("t"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.value("t"), None);
    }

    #[test]
    fn test_with_reserved_keeps_order() {
        let registry = ParamRegistry::with_reserved(["a", "g", "a"]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "g"]);
    }

    #[test]
    fn test_resolve_takes_only_registered_names() {
        let registry = ParamRegistry::with_reserved(["t", "r"]);
        let qs = Querystring::parse("t=42&x=9&r=").unwrap();

        let resolved = registry.resolve(&qs);
        assert_eq!(resolved.item_id("t"), Some(ItemId(42)));
        assert_eq!(resolved.value("r"), None);
        assert!(!resolved.contains("x"));
        assert!(resolved.has_values());

        // the source registry is untouched
        assert!(!registry.has_values());
    }
}
