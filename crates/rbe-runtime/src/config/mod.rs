//! Configuration module for the reply-by-email runtime.
//!
//! Layered figment loading, the configuration schema and its validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, MailConfig, RbeConfig, ReplyConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
