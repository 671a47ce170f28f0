//! thinlink command-line client
//!
//! Sends messages to a thinlink backend over the configured carriers and
//! inspects a local object cache.
//!
//! Usage:
//!   thinlink send --app 5 --msg 1 --field 1=str:hello --listen-secs 5
//!   thinlink cache stats

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use thinlink_cache::{CacheLookup, CachedValue, ObjectCache};
use thinlink_cli::{AppConfig, format_fields, format_message, parse_field};
use thinlink_protocol::{Message, ProtocolVersion};
use thinlink_transport::TransportClient;
use thinlink_types::CacheItemId;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "thinlink")]
#[command(about = "thinlink protocol client and cache tool")]
struct Args {
    /// Path to config file (defaults to ./thinlink.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect, send one message and print what comes back
    Send {
        /// Application id
        #[arg(long)]
        app: u8,

        /// Message id
        #[arg(long)]
        msg: u8,

        /// Field as id=type:value (repeatable)
        #[arg(short, long = "field")]
        fields: Vec<String>,

        /// Deflate the field stream
        #[arg(long)]
        compress: bool,

        /// Seconds to keep listening after sending
        #[arg(long, default_value = "5")]
        listen_secs: u64,
    },

    /// Inspect or modify the local object cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Record and index counts
    Stats,
    /// SHA-256 over all cached item ids
    Hash,
    /// Drop every record belonging to an application
    Purge {
        #[arg(long)]
        app: i32,
    },
    /// Print one record by cache item id
    Get {
        /// Dotted hex form, e.g. 000000000000002a.0001.0001.0001
        #[arg(long)]
        ciid: CacheItemId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Send {
            app,
            msg,
            fields,
            compress,
            listen_secs,
        } => send(config, app, msg, &fields, compress, listen_secs).await,
        Command::Cache(command) => cache(&config, command),
    }
}

async fn send(
    config: AppConfig,
    app: u8,
    msg: u8,
    fields: &[String],
    compress: bool,
    listen_secs: u64,
) -> Result<()> {
    let mut message = Message::new(ProtocolVersion::V4, app, msg).with_compression(compress);
    for arg in fields {
        message.fields.push(parse_field(arg)?);
    }

    let ciphers = config.cipher_suite()?;
    let client = TransportClient::builder(config.transport)
        .ciphers(ciphers)
        .on_message(|m| println!("<- {}", format_message(&m)))
        .on_transport_error(|code| warn!("Transport error: {}", code))
        .on_state_changed(|old, new| info!("State {} -> {}", old, new))
        .start();

    client.connect().context("Failed to start transport")?;
    let seq = client
        .send_message(&message)
        .context("Failed to queue message")?;
    println!("-> #{} {}", seq, format_message(&message));

    tokio::time::sleep(Duration::from_secs(listen_secs)).await;

    let pending = client.outbox_len();
    if pending > 0 {
        warn!("{} message(s) still unsent", pending);
    }
    client.close().context("Failed to close transport")?;
    Ok(())
}

fn cache(config: &AppConfig, command: CacheCommand) -> Result<()> {
    let cache = ObjectCache::from_config(&config.cache).with_context(|| {
        format!("Failed to open cache at {}", config.cache.root.display())
    })?;

    match command {
        CacheCommand::Stats => {
            let stats = cache.stats();
            println!("records:     {}", stats.records);
            println!("with ciid:   {}", stats.with_ciid);
            println!("with key:    {}", stats.with_key);
        }
        CacheCommand::Hash => {
            println!("{}", hex::encode(cache.compute_hash()));
        }
        CacheCommand::Purge { app } => {
            let removed = cache.purge_by_application(app);
            println!("Removed {} record(s) for application {}", removed, app);
        }
        CacheCommand::Get { ciid } => match cache.get(CacheLookup::Ciid(&ciid)) {
            Some(CachedValue::Binary(data)) => println!("binary {}", hex::encode(data)),
            Some(CachedValue::Text(text)) => println!("text {}", text),
            Some(CachedValue::FieldList(list)) => println!("fields {}", format_fields(&list)),
            Some(CachedValue::Message(message)) => println!("message {}", format_message(&message)),
            None => anyhow::bail!("No record for {}", ciid),
        },
    }
    Ok(())
}
