//! Topic Reply Demo
//!
//! Forum topic replies by email on top of the rbe framework. The forum lives
//! in memory and starts with two topics: "Welcome" (id 1) and the locked
//! "Archive" (id 2).
//!
//! # Usage
//!
//! ```bash
//! # Reply address for a notification about topic 1
//! cargo run --package topic-reply -- reply-to 1
//!
//! # Process a JSON array of emails once
//! cargo run --package topic-reply -- receive emails.json
//!
//! # Poll a spool directory until Ctrl+C
//! cargo run --package topic-reply -- serve --spool ./spool
//! ```
//!
//! Settings come from `rbe.toml` in the current directory. The
//! `[extensions.topic_reply]` table bootstraps the extension; without one the
//! built-in `t`/`r` parameters are used.

mod extension;
mod spool;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rbe::core::{ActivityItem, ItemId};
use rbe::runtime::RbeRuntime;
use tracing::info;

use crate::extension::{EVENT_TYPE, TopicReply};
use crate::spool::{LogNotifier, SpoolSource, load_batch};
use crate::store::TopicStore;

#[derive(Debug, Parser)]
#[command(name = "topic-reply", version, about = "Forum topic replies by email")]
struct Cli {
    /// Configuration file to load instead of searching the current directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spool directory polled by `serve`
    #[arg(long, default_value = "spool", global = true)]
    spool: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the reply address for a new-reply notification
    ReplyTo {
        /// Topic id
        topic: u64,
        /// Id of the reply the notification is about
        #[arg(long)]
        reply: Option<u64>,
    },
    /// Process a JSON array of emails once and print what happened
    Receive { file: PathBuf },
    /// Poll the spool directory until Ctrl+C
    Serve,
}

fn build_runtime(cli: &Cli, store: &Arc<TopicStore>) -> Result<RbeRuntime> {
    let mut builder = RbeRuntime::builder()
        .extension_with_defaults(
            "topic_reply",
            TopicReply::new(Arc::clone(store)),
            TopicReply::default_config(),
        )
        .source(SpoolSource::new(&cli.spool))
        .notifier(LogNotifier);
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = Arc::new(TopicStore::new());
    let welcome = store.create_topic("Welcome");
    let archive = store.create_topic("Archive");
    store.lock_topic(archive);
    let runtime = build_runtime(&cli, &store)?;

    match cli.command {
        Command::ReplyTo { topic, reply } => {
            let mut item = ActivityItem::new(EVENT_TYPE, topic);
            if let Some(reply) = reply {
                item = item.with_secondary(reply);
            }
            let codec = runtime.config().reply.codec();
            let Some(address) = runtime.pipeline().registry().reply_to_for(&item, &codec)? else {
                bail!("no extension claims '{EVENT_TYPE}' items; check [extensions.topic_reply]");
            };
            println!("{address}");
        }
        Command::Receive { file } => {
            let emails =
                load_batch(&file).with_context(|| format!("reading {}", file.display()))?;
            for email in &emails {
                let report = runtime.pipeline().process(email).await;
                match report.failure() {
                    None => println!("#{}: posted", report.index),
                    Some(failure) => println!(
                        "#{}: {failure} (sender notified: {})",
                        report.index, report.notified
                    ),
                }
            }
            if let Some(topic) = store.topic(welcome) {
                println!("'{}' now has {} replies", topic.title, topic.replies.len());
            }
        }
        Command::Serve => {
            info!(spool = %cli.spool.display(), %welcome, %archive, "Serving topics");
            runtime.run().await?;
            for topic in store.topics() {
                info!(topic = %topic.id, replies = topic.replies.len(), "{}", topic.title);
                for reply in &topic.replies {
                    info!(
                        reply = %reply.id,
                        parent = ?reply.parent.map(ItemId::get),
                        author = %reply.author,
                        "{}",
                        reply.body
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_reply_to() {
        let cli = Cli::parse_from(["topic-reply", "reply-to", "1", "--reply", "7"]);
        assert!(matches!(
            cli.command,
            Command::ReplyTo {
                topic: 1,
                reply: Some(7)
            }
        ));
        assert_eq!(cli.spool, PathBuf::from("spool"));
    }

    #[test]
    fn test_cli_parses_serve_with_spool() {
        let cli = Cli::parse_from(["topic-reply", "serve", "--spool", "/var/spool/rbe"]);
        assert!(matches!(cli.command, Command::Serve));
        assert_eq!(cli.spool, PathBuf::from("/var/spool/rbe"));
    }
}
