//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{MailConfig, RbeConfig, ReplyConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RbeConfig) -> ConfigResult<()> {
    validate_reserved_params(&config.reserved_params)?;
    validate_reply_config(&config.reply)?;
    validate_mail_config(&config.mail)?;
    Ok(())
}

/// Validates the reserved parameter names.
fn validate_reserved_params(params: &[String]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for param in params {
        if param.is_empty() || param.contains(['=', '&']) {
            return Err(ConfigError::validation(format!(
                "Reserved parameter '{param}' must be non-empty and cannot contain '=' or '&'"
            )));
        }
        if !seen.insert(param) {
            return Err(ConfigError::DuplicateParam(param.clone()));
        }
    }
    Ok(())
}

/// Validates the reply mailbox and domain.
fn validate_reply_config(reply: &ReplyConfig) -> ConfigResult<()> {
    if reply.mailbox.is_empty() {
        return Err(ConfigError::missing_field("reply.mailbox"));
    }
    if let Some(c) = reply
        .mailbox
        .chars()
        .find(|c| matches!(c, '+' | '@') || c.is_whitespace())
    {
        return Err(ConfigError::invalid_address(
            &reply.mailbox,
            format!("mailbox cannot contain '{c}'"),
        ));
    }

    if reply.domain.is_empty() {
        return Err(ConfigError::missing_field("reply.domain"));
    }
    let labels_ok = reply
        .domain
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    if !labels_ok {
        return Err(ConfigError::invalid_address(
            &reply.domain,
            "domain must be dot-separated alphanumeric labels",
        ));
    }

    if reply.key.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigError::missing_field("reply.key"));
    }
    Ok(())
}

/// Validates the polling intervals.
fn validate_mail_config(mail: &MailConfig) -> ConfigResult<()> {
    if mail.poll_interval_secs == 0 {
        return Err(ConfigError::validation(
            "Poll interval must be greater than 0",
        ));
    }
    if mail.keepalive_minutes == 0 {
        return Err(ConfigError::validation("Keepalive must be greater than 0"));
    }
    if mail.keepalive() <= mail.poll_interval() {
        return Err(ConfigError::validation(
            "Keepalive window must be longer than the poll interval",
        ));
    }
    if mail.mailbox.is_empty() {
        return Err(ConfigError::missing_field("mail.mailbox"));
    }
    Ok(())
}
