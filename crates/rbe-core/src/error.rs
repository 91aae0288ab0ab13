//! Unified error types for the reply-by-email core.
//!
//! None of these errors is fatal to the host: callers log them and degrade
//! to skipping the offending extension or inbound item.

use thiserror::Error;

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors that can occur while parsing a querystring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A `key=value` segment had no `=` separator.
    #[error("malformed querystring segment: '{segment}'")]
    MalformedPair {
        /// The offending segment.
        segment: String,
    },

    /// A segment had an empty key.
    #[error("querystring segment has an empty key: '{segment}'")]
    EmptyKey {
        /// The offending segment.
        segment: String,
    },
}

// =============================================================================
// Reply Address Errors
// =============================================================================

/// Errors that can occur while decoding a reply address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyAddressError {
    /// The address has no `@` separator.
    #[error("not an email address: '{0}'")]
    NotAnAddress(String),

    /// The address belongs to a different mailbox or domain.
    #[error("address '{0}' is not a reply address for this installation")]
    ForeignAddress(String),

    /// The local part carries no `+token` suffix.
    #[error("reply address '{0}' carries no token")]
    MissingToken(String),

    /// The token is not `payload-tag` hex.
    #[error("reply address token is malformed: {reason}")]
    MalformedToken {
        /// Reason for failure.
        reason: String,
    },

    /// The signature tag does not match the payload.
    #[error("reply address signature does not verify")]
    BadSignature,

    /// The installation key cannot be used as an HMAC key.
    #[error("invalid signing key")]
    InvalidKey,

    /// The decoded payload is not a valid querystring.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ReplyAddressError {
    /// Creates a malformed-token error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Bootstrap Errors
// =============================================================================

/// Errors that leave an extension unbootstrapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    /// The configuration carried no fields at all.
    #[error("extension configuration cannot be empty")]
    EmptyConfig,

    /// A required configuration field is missing or blank.
    #[error("extension configuration is missing '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// Another extension already bootstrapped with the same id.
    #[error("extension id '{0}' is already registered")]
    DuplicateId(String),

    /// The secondary parameter name equals the primary one.
    #[error("extension '{id}' uses '{param}' for both item id parameters")]
    SameParams {
        /// Extension id.
        id: String,
        /// The repeated parameter name.
        param: String,
    },
}

impl BootstrapError {
    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for reply address operations.
pub type ReplyAddressResult<T> = Result<T, ReplyAddressError>;

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;
