//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: enables TOML configuration files (`rbe.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`rbe.yaml`, `rbe.yml`, etc.)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`rbe.{profile}.toml` / `rbe.{profile}.yaml`)
//! 3. Main config file (`rbe.toml` / `rbe.yaml`)
//! 4. Environment variables (`RBE_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `RBE_` prefix with `__` as separator:
//!
//! - `RBE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `RBE_REPLY__KEY=s3cret` → `reply.key = "s3cret"`
//! - `RBE_MAIL__POLL_INTERVAL_SECS=30` → `mail.poll_interval_secs = 30`
//!
//! # Example
//!
//! ```rust,ignore
//! use rbe_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/rbe.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::RbeConfig;
use super::validation::validate_config;

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the `dev` and `prod` short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `RBE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("RBE_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("rbe")),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: RbeConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, completes and validates the configuration.
    ///
    /// A missing reply key is generated here.
    pub fn load(self) -> ConfigResult<RbeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let mut config: RbeConfig = figment.extract()?;

        if config.reply.ensure_key() {
            warn!(
                "No reply key configured, generated a random one; \
                 reply addresses will not verify after a restart"
            );
        }

        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            extensions = config.extensions.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RbeConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with RBE_ prefix");
            figment = figment.merge(Env::prefixed("RBE_").split("__"));
        }

        // Programmatic overrides win over every other source.
        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let file = match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Figment::from(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Figment::from(Yaml::file(path)),
            _ => {
                return Err(ConfigError::ParseError(format!(
                    "Unsupported or disabled configuration file format: .{ext}"
                )));
            }
        };
        Ok(figment.merge(file))
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("rbe"));
        }
        paths
    }

    /// Searches one file format across the search paths.
    ///
    /// For each candidate, a profile-specific variant is merged first, then
    /// the base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    /// Searches for and loads configuration files from search paths.
    ///
    /// Which formats are attempted is controlled by the `toml-config` and
    /// `yaml-config` feature flags.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["rbe.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["rbe.yaml", "rbe.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<RbeConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<RbeConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::LogLevel;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.mail.keepalive_minutes, 14);
            assert!(config.reply.key.is_some());
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("DEV"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("RBE_LOGGING__LEVEL", "debug");
            jail.set_env("RBE_REPLY__KEY", "from-env");
            jail.set_env("RBE_MAIL__POLL_INTERVAL_SECS", "5");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.reply.key.as_deref(), Some("from-env"));
            assert_eq!(config.mail.poll_interval_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigLoader::new().file("/nonexistent/rbe.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_file_format_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("rbe.ini", "mailbox = reply")?;
            let result = ConfigLoader::new()
                .file(jail.directory().join("rbe.ini"))
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::ParseError(msg)) if msg.ends_with(".ini")));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_explicit_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[reply]\ndomain = \"forum.example\"\n")?;
            let config = ConfigLoader::new()
                .file(jail.directory().join("custom.toml"))
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.reply.domain, "forum.example");
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_merge_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("RBE_MAIL__MAILBOX", "Archive");
            let mut overrides = RbeConfig::default();
            overrides.mail.mailbox = "Replies".into();

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .load()
                .unwrap();
            assert_eq!(config.mail.mailbox, "Replies");
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_with_profile_and_extensions() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rbe.toml",
                r#"
                    reserved_params = ["a", "g"]

                    [reply]
                    mailbox = "forum"
                    domain = "example.com"
                    key = "file-key"

                    [extensions.topic-reply]
                    id = "topic-reply"
                    event_type = "forum_topic"
                    primary_param = "t"
                    secondary_param = "r"
                "#,
            )?;
            jail.create_file(
                "rbe.production.toml",
                r#"
                    [mail]
                    keepalive_minutes = 29
                "#,
            )?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();

            assert_eq!(config.reserved_params, vec!["a", "g"]);
            assert_eq!(config.reply.mailbox, "forum");
            assert_eq!(config.reply.key.as_deref(), Some("file-key"));
            assert_eq!(config.mail.keepalive_minutes, 29);
            let ext = config.extension("topic-reply");
            assert_eq!(ext.primary_param.as_deref(), Some("t"));
            assert_eq!(ext.secondary_param.as_deref(), Some("r"));
            Ok(())
        });
    }
}
