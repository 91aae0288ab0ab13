//! Parsed inbound email data.

use std::collections::BTreeMap;

use mailparse::MailAddr;
use serde::{Deserialize, Serialize};

/// Case-insensitive header map of one inbound email.
///
/// Header names are stored lowercased. Repeated headers are joined with
/// `", "` by [`append`](Self::append).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailHeaders {
    headers: BTreeMap<String, String>,
}

impl EmailHeaders {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any previous value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Appends to a header, joining with any previous value.
    pub fn append(&mut self, name: &str, value: &str) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    /// Sets a header (builder pattern).
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The bare sender address from the `From` header.
    pub fn from_address(&self) -> Option<String> {
        self.get("from")
            .and_then(|value| parse_addresses(value).into_iter().next())
    }

    /// The `Subject` header, or an empty string.
    pub fn subject(&self) -> &str {
        self.get("subject").unwrap_or_default()
    }

    /// Every bare recipient address from `To`, `Cc` and `Delivered-To`.
    pub fn recipients(&self) -> Vec<String> {
        ["to", "cc", "delivered-to"]
            .iter()
            .filter_map(|name| self.get(name))
            .flat_map(parse_addresses)
            .collect()
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parses an address-list header into bare addresses.
///
/// Group members are flattened into the list. Entries without an `@` are
/// skipped, as is a header that does not parse at all.
pub fn parse_addresses(value: &str) -> Vec<String> {
    let Ok(list) = mailparse::addrparse(&strip_comments(value)) else {
        return Vec::new();
    };
    list.iter()
        .flat_map(|addr| match addr {
            MailAddr::Single(info) => vec![info.addr.clone()],
            MailAddr::Group(group) => group.addrs.iter().map(|info| info.addr.clone()).collect(),
        })
        .map(|addr| addr.trim().to_string())
        .filter(|addr| addr.contains('@'))
        .collect()
}

/// Drops `(comments)` outside quoted strings; `addrparse` keeps them as
/// part of a bare address.
fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut quoted = false;
    let mut escaped = false;
    let mut depth = 0usize;

    for c in value.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                out.push(c);
            }
            continue;
        }
        match c {
            '\\' if quoted || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    out.push(c);
                }
            }
            '"' if depth == 0 => {
                quoted = !quoted;
                out.push(c);
            }
            '(' if !quoted => depth += 1,
            ')' if !quoted && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// The data handed to an extension's `post` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    /// Bare sender address.
    pub sender: String,
    pub subject: String,
    /// Reply text with quoted history already stripped by the mail source.
    pub content: String,
    pub headers: EmailHeaders,
}

impl ParsedEmail {
    /// Builds the parsed data from headers and a body.
    pub fn from_parts(headers: EmailHeaders, content: impl Into<String>) -> Self {
        Self {
            sender: headers.from_address().unwrap_or_default(),
            subject: headers.subject().to_string(),
            content: content.into(),
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers = EmailHeaders::new().with("Subject", "Re: Hello");
        assert_eq!(headers.get("subject"), Some("Re: Hello"));
        assert_eq!(headers.get("SUBJECT"), Some("Re: Hello"));
        assert_eq!(headers.subject(), "Re: Hello");
    }

    #[test]
    fn test_parse_addresses_handles_display_names() {
        let parts = parse_addresses(r#""Doe, Jane" <jane@example.com>, bob@example.com"#);
        assert_eq!(parts, vec!["jane@example.com", "bob@example.com"]);
    }

    #[test]
    fn test_parse_addresses_drops_comments() {
        let parts = parse_addresses("reply+743d-bde8@example.com (Forum replies)");
        assert_eq!(parts, vec!["reply+743d-bde8@example.com"]);

        let parts = parse_addresses(r#""Jane (home)" <jane@example.com> (via list)"#);
        assert_eq!(parts, vec!["jane@example.com"]);
    }

    #[test]
    fn test_parse_addresses_flattens_groups() {
        let parts = parse_addresses("Forum: reply+743d-bde8@example.com, a@example.com;, b@example.com");
        assert_eq!(
            parts,
            vec!["reply+743d-bde8@example.com", "a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_parse_addresses_skips_unparseable() {
        assert!(parse_addresses("").is_empty());
        assert!(parse_addresses("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_recipients_collects_to_cc_and_delivered_to() {
        let mut headers = EmailHeaders::new()
            .with("To", "Forum <reply+abc-def@example.com>")
            .with("Delivered-To", "catchall@example.com");
        headers.append("Cc", "a@example.com");
        headers.append("cc", "b@example.com");

        assert_eq!(
            headers.recipients(),
            vec![
                "reply+abc-def@example.com",
                "a@example.com",
                "b@example.com",
                "catchall@example.com",
            ]
        );
    }

    #[test]
    fn test_parsed_email_from_parts() {
        let headers = EmailHeaders::new()
            .with("From", "Jane <jane@example.com>")
            .with("Subject", "Re: Topic");
        let email = ParsedEmail::from_parts(headers, "Thanks!");
        assert_eq!(email.sender, "jane@example.com");
        assert_eq!(email.subject, "Re: Topic");
        assert_eq!(email.content, "Thanks!");
    }
}
