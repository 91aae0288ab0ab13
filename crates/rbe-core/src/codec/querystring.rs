//! The `key=value&key2=value2` identifier encoding.

use std::fmt;

use crate::error::{CodecError, CodecResult};
use crate::model::ItemId;

/// Ordered `key=value` pairs embedded in a reply address.
///
/// Keys and values are kept verbatim. Values may be empty; an empty value
/// stands for an absent item id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Querystring {
    pairs: Vec<(String, String)>,
}

impl Querystring {
    /// Creates an empty querystring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `k=v&k2=v2`.
    ///
    /// An empty input yields an empty querystring. Every segment must carry
    /// a `=` and a non-empty key.
    pub fn parse(input: &str) -> CodecResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::new());
        }

        let mut pairs = Vec::new();
        for segment in input.split('&') {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(CodecError::MalformedPair {
                    segment: segment.to_string(),
                });
            };
            if key.is_empty() {
                return Err(CodecError::EmptyKey {
                    segment: segment.to_string(),
                });
            }
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(Self { pairs })
    }

    /// Builds the segment for one extension's descriptor and ids.
    ///
    /// The secondary pair is emitted only when `secondary` names a parameter.
    /// Absent ids become empty values.
    pub fn for_ids(
        primary: (&str, Option<ItemId>),
        secondary: Option<(&str, Option<ItemId>)>,
    ) -> Self {
        let render = |id: Option<ItemId>| id.map(|id| id.to_string()).unwrap_or_default();

        let mut qs = Self::new().with(primary.0, render(primary.1));
        if let Some((name, id)) = secondary {
            qs.push(name, render(id));
        }
        qs
    }

    /// Appends a pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Appends a pair (builder pattern).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Returns the value of `key`. When a key repeats the last value wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for Querystring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
