//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rbe_core::{ExtensionConfig, ReplyAddressCodec};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbeConfig {
    /// Parameter names the host uses itself; extensions cannot claim them.
    pub reserved_params: Vec<String>,

    /// Reply address settings.
    pub reply: ReplyConfig,

    /// Mail polling settings.
    pub mail: MailConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Per-extension bootstrap configuration, keyed by extension name.
    pub extensions: BTreeMap<String, ExtensionConfig>,
}

impl RbeConfig {
    /// Returns the bootstrap configuration for extension `name`.
    ///
    /// A missing section yields an empty configuration, which bootstrap
    /// rejects.
    pub fn extension(&self, name: &str) -> ExtensionConfig {
        self.extension_or(name, ExtensionConfig::default())
    }

    /// Returns the bootstrap configuration for extension `name`, or
    /// `fallback` when the section is missing.
    pub fn extension_or(&self, name: &str, fallback: ExtensionConfig) -> ExtensionConfig {
        self.extensions.get(name).cloned().unwrap_or(fallback)
    }
}

// =============================================================================
// Reply
// =============================================================================

/// Reply address settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Local part of the reply mailbox, before the `+token`.
    pub mailbox: String,

    /// Domain of the reply mailbox.
    pub domain: String,

    /// Installation key signing reply addresses.
    ///
    /// Generated on load when absent; addresses signed with a generated key
    /// stop verifying after a restart.
    pub key: Option<String>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            mailbox: "reply".to_string(),
            domain: "localhost".to_string(),
            key: None,
        }
    }
}

impl ReplyConfig {
    /// Fills in a random key when none is configured.
    ///
    /// Returns `true` if a key was generated.
    pub fn ensure_key(&mut self) -> bool {
        if self.key.as_deref().is_some_and(|key| !key.is_empty()) {
            return false;
        }
        self.key = Some(uuid::Uuid::new_v4().simple().to_string());
        true
    }

    /// Builds the codec for these settings.
    pub fn codec(&self) -> ReplyAddressCodec {
        ReplyAddressCodec::new(
            &self.mailbox,
            &self.domain,
            self.key.as_deref().unwrap_or_default(),
        )
    }
}

impl fmt::Debug for ReplyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyConfig")
            .field("mailbox", &self.mailbox)
            .field("domain", &self.domain)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// =============================================================================
// Mail
// =============================================================================

/// Mail polling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Seconds between two fetches within a session.
    pub poll_interval_secs: u64,

    /// Length of one mail source session before reconnecting, in minutes.
    pub keepalive_minutes: u64,

    /// Name of the mailbox folder to read.
    pub mailbox: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            keepalive_minutes: 14,
            mailbox: "INBOX".to_string(),
        }
    }
}

impl MailConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_minutes * 60)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// The debug log file at [`LoggingConfig::file_path`].
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub span_events: SpanEventConfig,

    /// Include thread ids in each line.
    pub thread_ids: bool,

    /// Include source file and line in each line.
    pub file_location: bool,

    /// Path of the debug log file used with `output = "file"`.
    pub file_path: PathBuf,

    /// Per-module level overrides, e.g. `rbe_core = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: PathBuf::from("rbe-debug.log"),
            filters: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_key_generates_once() {
        let mut reply = ReplyConfig::default();
        assert!(reply.ensure_key());
        let key = reply.key.clone().unwrap();
        assert_eq!(key.len(), 32);

        assert!(!reply.ensure_key());
        assert_eq!(reply.key.as_deref(), Some(key.as_str()));
    }

    #[test]
    fn test_reply_debug_redacts_key() {
        let reply = ReplyConfig {
            key: Some("secret".into()),
            ..ReplyConfig::default()
        };
        assert!(!format!("{reply:?}").contains("secret"));
    }

    #[test]
    fn test_missing_extension_section_is_empty() {
        let config = RbeConfig::default();
        assert!(config.extension("topic-reply").is_empty());
    }

    #[test]
    fn test_mail_durations() {
        let mail = MailConfig::default();
        assert_eq!(mail.poll_interval(), Duration::from_secs(60));
        assert_eq!(mail.keepalive(), Duration::from_secs(14 * 60));
    }
}
