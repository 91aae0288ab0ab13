//! A spool directory mail source.
//!
//! Every `*.json` file in the directory is one email:
//!
//! ```json
//! {
//!   "headers": { "From": "jane@example.org", "To": "reply+...@forum.example" },
//!   "body": "Thanks!"
//! }
//! ```
//!
//! Processed files are renamed to `*.done`; files that do not parse are
//! renamed to `*.bad`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rbe::core::EmailHeaders;
use rbe::runtime::{
    InboundEmail, MailSource, NotifyResult, SenderNotifier, SourceError, SourceResult,
};
use serde::Deserialize;
use tracing::{info, warn};

/// One email as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpooledEmail {
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl SpooledEmail {
    pub fn into_inbound(self, index: usize) -> InboundEmail {
        let mut headers = EmailHeaders::new();
        for (name, value) in &self.headers {
            headers.append(name, value);
        }
        InboundEmail::new(index, headers, self.body)
    }
}

/// Reads a JSON array of emails.
pub fn load_batch(path: &Path) -> anyhow::Result<Vec<InboundEmail>> {
    let text = std::fs::read_to_string(path)?;
    let emails: Vec<SpooledEmail> = serde_json::from_str(&text)?;
    Ok(emails
        .into_iter()
        .enumerate()
        .map(|(index, email)| email.into_inbound(index))
        .collect())
}

pub struct SpoolSource {
    dir: PathBuf,
    connected: AtomicBool,
    batch: Mutex<Vec<PathBuf>>,
}

impl SpoolSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            connected: AtomicBool::new(false),
            batch: Mutex::new(Vec::new()),
        }
    }

    fn ensure_connected(&self) -> SourceResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::NotConnected)
        }
    }

    async fn spooled_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl MailSource for SpoolSource {
    fn name(&self) -> &str {
        "spool"
    }

    async fn connect(&self) -> SourceResult<()> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => {
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Ok(_) => Err(SourceError::connect_failed(
                self.name(),
                format!("{} is not a directory", self.dir.display()),
            )),
            Err(e) => Err(SourceError::connect_failed(self.name(), e.to_string())),
        }
    }

    async fn fetch(&self) -> SourceResult<Vec<InboundEmail>> {
        self.ensure_connected()?;
        let files = self
            .spooled_files()
            .await
            .map_err(|e| SourceError::FetchFailed(e.to_string()))?;

        let mut emails = Vec::new();
        let mut batch = Vec::new();
        for path in files {
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    serde_json::from_str::<SpooledEmail>(&text).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(email) => {
                    emails.push(email.into_inbound(batch.len()));
                    batch.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable spool file");
                    if let Err(e) = tokio::fs::rename(&path, path.with_extension("bad")).await {
                        warn!(path = %path.display(), error = %e, "Failed to set spool file aside");
                    }
                }
            }
        }

        *self.batch.lock() = batch;
        Ok(emails)
    }

    async fn acknowledge(&self, index: usize) -> SourceResult<()> {
        self.ensure_connected()?;
        let path = self
            .batch
            .lock()
            .get(index)
            .cloned()
            .ok_or_else(|| SourceError::AckFailed {
                index,
                reason: "not in the current batch".to_string(),
            })?;

        tokio::fs::rename(&path, path.with_extension("done"))
            .await
            .map_err(|e| SourceError::AckFailed {
                index,
                reason: e.to_string(),
            })
    }

    async fn disconnect(&self) -> SourceResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.batch.lock().clear();
        Ok(())
    }
}

/// Writes failure messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl SenderNotifier for LogNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> NotifyResult<()> {
        info!(%recipient, %subject, "Would notify sender: {body}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spooled_headers_become_case_insensitive() {
        let email: SpooledEmail = serde_json::from_str(
            r#"{"headers": {"From": "Jane <jane@example.org>", "Subject": "Hi"}, "body": "yo"}"#,
        )
        .unwrap();
        let inbound = email.into_inbound(3);

        assert_eq!(inbound.index, 3);
        assert_eq!(inbound.headers.get("subject"), Some("Hi"));
        assert_eq!(
            inbound.headers.from_address().as_deref(),
            Some("jane@example.org")
        );
    }

    #[tokio::test]
    async fn test_fetch_requires_connection() {
        let source = SpoolSource::new("/nonexistent-spool");
        assert_eq!(source.fetch().await, Err(SourceError::NotConnected));
        assert!(matches!(
            source.connect().await,
            Err(SourceError::ConnectFailed { .. })
        ));
    }
}
