//! Signed reply addresses carrying a querystring.
//!
//! An address has the form `{mailbox}+{hex(querystring)}-{tag}@{domain}`,
//! where `tag` is the leading [`TAG_LEN`] bytes of HMAC-SHA256 over the
//! querystring, keyed with the installation key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::Querystring;
use crate::error::{ReplyAddressError, ReplyAddressResult};

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of the truncated signature tag.
pub const TAG_LEN: usize = 8;

/// Encodes and verifies reply addresses for one installation.
#[derive(Clone)]
pub struct ReplyAddressCodec {
    mailbox: String,
    domain: String,
    key: Vec<u8>,
}

impl ReplyAddressCodec {
    /// Creates a codec for `mailbox@domain` signing with `key`.
    pub fn new(mailbox: impl Into<String>, domain: impl Into<String>, key: impl AsRef<[u8]>) -> Self {
        Self {
            mailbox: mailbox.into(),
            domain: domain.into(),
            key: key.as_ref().to_vec(),
        }
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Builds the reply address embedding `querystring`.
    pub fn encode(&self, querystring: &Querystring) -> ReplyAddressResult<String> {
        let payload = querystring.to_string();
        let tag = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!(
            "{}+{}-{}@{}",
            self.mailbox,
            hex::encode(payload.as_bytes()),
            hex::encode(&tag[..TAG_LEN]),
            self.domain
        ))
    }

    /// Returns `true` if `address` is addressed to this installation's
    /// reply mailbox, signed or not.
    pub fn is_reply_address(&self, address: &str) -> bool {
        split_address(address)
            .map(|(local, domain)| {
                let base = local.split_once('+').map_or(local, |(base, _)| base);
                self.owns(base, domain)
            })
            .unwrap_or(false)
    }

    /// Verifies `address` and recovers its querystring.
    pub fn decode(&self, address: &str) -> ReplyAddressResult<Querystring> {
        let (local, domain) = split_address(address)
            .ok_or_else(|| ReplyAddressError::NotAnAddress(address.to_string()))?;

        let Some((base, token)) = local.split_once('+') else {
            return if self.owns(local, domain) {
                Err(ReplyAddressError::MissingToken(address.to_string()))
            } else {
                Err(ReplyAddressError::ForeignAddress(address.to_string()))
            };
        };
        if !self.owns(base, domain) {
            return Err(ReplyAddressError::ForeignAddress(address.to_string()));
        }

        let (payload_hex, tag_hex) = token
            .rsplit_once('-')
            .ok_or_else(|| ReplyAddressError::malformed("missing signature tag"))?;
        let payload = hex::decode(payload_hex)
            .map_err(|e| ReplyAddressError::malformed(format!("payload: {e}")))?;
        let tag = hex::decode(tag_hex)
            .map_err(|e| ReplyAddressError::malformed(format!("tag: {e}")))?;
        if tag.len() != TAG_LEN {
            return Err(ReplyAddressError::malformed(format!(
                "tag is {} bytes, expected {TAG_LEN}",
                tag.len()
            )));
        }
        let payload = String::from_utf8(payload)
            .map_err(|_| ReplyAddressError::malformed("payload is not UTF-8"))?;

        self.mac(&payload)?
            .verify_truncated_left(&tag)
            .map_err(|_| ReplyAddressError::BadSignature)?;

        Ok(Querystring::parse(&payload)?)
    }

    fn mac(&self, payload: &str) -> ReplyAddressResult<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| ReplyAddressError::InvalidKey)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    fn owns(&self, mailbox: &str, domain: &str) -> bool {
        mailbox.eq_ignore_ascii_case(&self.mailbox) && domain.eq_ignore_ascii_case(&self.domain)
    }
}

impl std::fmt::Debug for ReplyAddressCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyAddressCodec")
            .field("mailbox", &self.mailbox)
            .field("domain", &self.domain)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn split_address(address: &str) -> Option<(&str, &str)> {
    let (local, domain) = address.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some((local, domain))
}
