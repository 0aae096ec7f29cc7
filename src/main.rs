//! # Event Watch CLI (`event-watch`)
//!
//! ## Usage
//!
//! ```bash
//! event-watch --config ./config/event-watch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `event-watch run [monitor]` | Fetch, detect new items, save, notify |
//! | `event-watch sources` | List monitors and store health |
//! | `event-watch stats` | Tracked item counts per monitor |
//! | `event-watch get <monitor> [id]` | Print tracked items as JSON |
//! | `event-watch prune <monitor> --older-than-days N` | Drop old tracked items |
//! | `event-watch notify-test` | Send a test message |
//!
//! Intended to be invoked periodically by cron or a systemd timer.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use event_watch::progress::ProgressMode;
use event_watch::{config, get, logging, pipeline, sources, stats};

/// Event Watch: notifies about newly announced events, once.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/event-watch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "event-watch",
    about = "Event Watch — notifies about newly announced concerts, games and conventions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/event-watch.toml")]
    config: PathBuf,

    /// Progress on stderr: off, human, or json. Defaults to human when
    /// stderr is a TTY.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run monitors once.
    ///
    /// Monitor format: `all`, `<kind>`, or `<kind>:<name>`.
    /// Examples: `all`, `nhl`, `bandsintown:bands`.
    Run {
        /// Monitor specifier.
        #[arg(default_value = "all")]
        monitor: String,

        /// Classify only: do not save the store or send notifications.
        #[arg(long)]
        dry_run: bool,
    },

    /// List configured monitors and their store health.
    Sources,

    /// Show tracked item counts per monitor.
    Stats,

    /// Print tracked items of one monitor as JSON.
    Get {
        /// Monitor instance, e.g. `nhl:canes`.
        monitor: String,

        /// Only this item id.
        id: Option<String>,
    },

    /// Remove tracked items first seen more than N days ago.
    ///
    /// Pruned items will be announced again if they reappear upstream.
    Prune {
        /// Monitor instance, e.g. `nhl:canes`.
        monitor: String,

        #[arg(long)]
        older_than_days: u32,
    },

    /// Send a test message through the configured notifier.
    NotifyTest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let cfg = config::load_config(&cli.config)?;
    let credentials = cfg
        .notify
        .telegram
        .resolve_credentials(|key| std::env::var(key).ok());

    match cli.command {
        Commands::Run { monitor, dry_run } => {
            let reporter = cli
                .progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let notifier = pipeline::notifier_for(&cfg, credentials)?;
            pipeline::run_watch(&cfg, &monitor, notifier.as_ref(), reporter.as_ref(), dry_run)
                .await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg, credentials.is_some())?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Get { monitor, id } => {
            get::run_get(&cfg, &monitor, id.as_deref())?;
        }
        Commands::Prune {
            monitor,
            older_than_days,
        } => {
            get::run_prune(&cfg, &monitor, older_than_days)?;
        }
        Commands::NotifyTest => {
            let notifier = pipeline::notifier_for(&cfg, credentials)?;
            pipeline::run_notify_test(notifier.as_ref(), &cfg).await?;
        }
    }

    Ok(())
}
