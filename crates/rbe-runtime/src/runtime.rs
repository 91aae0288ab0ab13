//! The mail loop.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rbe_runtime::RbeRuntime;
//!
//! let runtime = RbeRuntime::builder()
//!     .config_file("rbe.toml")
//!     .extension("topic_reply", TopicReply::new(store))
//!     .source(ImapSource::new(..))
//!     .build()?;
//!
//! runtime.run().await?;
//! ```
//!
//! Each session connects the source, polls it every
//! `mail.poll_interval_secs` and disconnects once the
//! `mail.keepalive_minutes` window is over. The next session reconnects.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rbe_core::ExtensionConfig;
use rbe_framework::{Extension, ExtensionHost, ExtensionRegistry};
use tokio::signal;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, RbeConfig};
use crate::error::{RuntimeError, RuntimeResult, SourceResult};
use crate::logging;
use crate::pipeline::{ItemReport, Pipeline};
use crate::source::{MailSource, NoopNotifier, SenderNotifier};

/// Running counters of the mail loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Emails fetched and processed.
    pub received: u64,
    pub posted: u64,
    pub failed: u64,
    /// Sessions successfully opened.
    pub sessions: u64,
}

impl RuntimeStats {
    fn record(&mut self, report: &ItemReport) {
        self.received += 1;
        if report.is_posted() {
            self.posted += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Polls a [`MailSource`] and feeds every email through the [`Pipeline`].
pub struct RbeRuntime {
    config: RbeConfig,
    pipeline: Pipeline,
    source: Arc<dyn MailSource>,
    stats: Mutex<RuntimeStats>,
}

impl RbeRuntime {
    /// Creates a runtime from already loaded parts.
    ///
    /// Logging is left alone; see [`RbeRuntime::builder`] for the variant
    /// that also loads configuration and initializes logging.
    pub fn new(
        config: RbeConfig,
        registry: Arc<ExtensionRegistry>,
        source: Arc<dyn MailSource>,
        notifier: Arc<dyn SenderNotifier>,
    ) -> Self {
        let pipeline = Pipeline::new(
            registry,
            config.reply.codec(),
            notifier,
            config.mail.mailbox.clone(),
        );
        Self {
            config,
            pipeline,
            source,
            stats: Mutex::new(RuntimeStats::default()),
        }
    }

    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RbeConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// A snapshot of the running counters.
    pub fn stats(&self) -> RuntimeStats {
        *self.stats.lock()
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();

        info!("Reply-by-email runtime is now running. Press Ctrl+C to stop.");

        let (result, signal) = tokio::join!(self.run_until(shutdown), async move {
            let signal = wait_for_shutdown().await;
            trigger.cancel();
            signal
        });
        signal?;
        result
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run_until(&self, shutdown: CancellationToken) -> RuntimeResult<()> {
        info!(
            source = %self.source.name(),
            poll_interval_secs = self.config.mail.poll_interval_secs,
            keepalive_minutes = self.config.mail.keepalive_minutes,
            "Mail loop started"
        );

        while !shutdown.is_cancelled() {
            if let Err(e) = self.session(&shutdown).await {
                error!(source = %self.source.name(), error = %e, "Mail session failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(self.config.mail.poll_interval()) => {}
                }
            }
        }

        info!(stats = ?self.stats(), "Mail loop stopped");
        Ok(())
    }

    /// One connect/poll/disconnect cycle.
    async fn session(&self, shutdown: &CancellationToken) -> SourceResult<()> {
        self.source.connect().await?;
        self.stats.lock().sessions += 1;
        info!(source = %self.source.name(), "Mail session opened");

        let deadline = Instant::now() + self.config.mail.keepalive();
        let mut ticker = tokio::time::interval(self.config.mail.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("Keepalive window elapsed, reconnecting");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll().await {
                        break Err(e);
                    }
                }
            }
        };

        if let Err(e) = self.source.disconnect().await {
            warn!(source = %self.source.name(), error = %e, "Failed to disconnect cleanly");
        }
        result
    }

    /// Fetches unseen mail and processes it in order.
    async fn poll(&self) -> SourceResult<()> {
        let emails = self.source.fetch().await?;
        if emails.is_empty() {
            return Ok(());
        }
        debug!(count = emails.len(), "Fetched unseen emails");

        for email in &emails {
            let report = self.pipeline.process(email).await;
            self.stats.lock().record(&report);
            if let Err(e) = self.source.acknowledge(email.index).await {
                warn!(
                    index = email.index,
                    posted = report.is_posted(),
                    error = %e,
                    "Failed to acknowledge email, it will be fetched again"
                );
            }
        }
        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(|e| RuntimeError::Signal(e.to_string()))?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

type Installer = Box<dyn FnOnce(&RbeConfig, &mut ExtensionHost) + Send>;

/// Loads configuration, bootstraps extensions and assembles an [`RbeRuntime`].
///
/// Each extension reads its bootstrap settings from `[extensions.<name>]`.
/// An extension that fails to bootstrap is left out and the build continues.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    installers: Vec<Installer>,
    source: Option<Arc<dyn MailSource>>,
    notifier: Arc<dyn SenderNotifier>,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a builder searching the current directory for configuration.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            installers: Vec::new(),
            source: None,
            notifier: Arc::new(NoopNotifier),
            init_logging: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration on top of every other source.
    pub fn merge(mut self, config: RbeConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Adds an extension configured by `[extensions.<name>]`.
    pub fn extension<E: Extension>(self, name: impl Into<String>, extension: E) -> Self {
        self.extension_with_defaults(name, extension, ExtensionConfig::default())
    }

    /// Like [`extension`](Self::extension), bootstrapping from `defaults`
    /// when the configuration has no `[extensions.<name>]` section.
    pub fn extension_with_defaults<E: Extension>(
        mut self,
        name: impl Into<String>,
        extension: E,
        defaults: ExtensionConfig,
    ) -> Self {
        let name = name.into();
        self.installers.push(Box::new(move |config: &RbeConfig, host: &mut ExtensionHost| {
            if let Err(e) = host.bootstrap(extension, &config.extension_or(&name, defaults)) {
                warn!(section = %name, error = %e, "Extension left unregistered");
            }
        }));
        self
    }

    pub fn source(mut self, source: impl MailSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn notifier(mut self, notifier: impl SenderNotifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Skips logging initialization, for hosts that install their own subscriber.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<RbeRuntime> {
        let source = self.source.ok_or(RuntimeError::NoMailSource)?;
        let config = self.config_loader.load()?;
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let mut host = ExtensionHost::with_reserved_params(config.reserved_params.iter().cloned());
        for install in self.installers {
            install(&config, &mut host);
        }
        info!(
            extensions = host.extension_count(),
            reply_mailbox = %config.reply.mailbox,
            reply_domain = %config.reply.domain,
            "Runtime initialized from configuration"
        );

        let registry = Arc::new(host.seal());
        Ok(RbeRuntime::new(config, registry, source, self.notifier))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
