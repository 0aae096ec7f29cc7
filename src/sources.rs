//! Monitor health and status listing.
//!
//! Reports which monitors are configured and whether their store documents
//! are readable. Used by `event-watch sources`.
//!
//! | Check | Healthy When |
//! |-------|-------------|
//! | store | Document is absent (first run) or parses |
//! | notifier | Telegram credentials resolved |

use anyhow::Result;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::models::TrackedItem;
use crate::monitors::{self, MonitorInfo};

/// Health and configuration status of a single monitor.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    /// `<kind>:<name>`, e.g. `nhl:canes`.
    pub name: String,
    pub sources: usize,
    pub tracked: usize,
    pub healthy: bool,
    pub notes: Option<String>,
}

fn check_store(info: &MonitorInfo) -> MonitorStatus {
    let path = &info.store_path;
    let (tracked, healthy, notes) = match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (0, true, format!("no store yet: {}", path.display()))
        }
        Err(e) => (0, false, format!("store unreadable: {}", e)),
        Ok(content) => match serde_json::from_str::<BTreeMap<String, TrackedItem>>(&content) {
            Ok(items) => (items.len(), true, format!("store: {}", path.display())),
            Err(e) => (
                0,
                false,
                format!("store corrupt, next run starts empty: {}", e),
            ),
        },
    };

    MonitorStatus {
        name: info.label(),
        sources: info.source_count,
        tracked,
        healthy,
        notes: Some(notes),
    }
}

/// Status of every configured monitor, in kind then name order.
pub fn get_sources(config: &Config) -> Vec<MonitorStatus> {
    monitors::describe_monitors(config)
        .iter()
        .map(check_store)
        .collect()
}

pub fn list_sources(config: &Config, telegram_ready: bool) -> Result<()> {
    let statuses = get_sources(config);

    println!(
        "{:<28} {:>7} {:>8} {:<8} NOTES",
        "MONITOR", "SOURCES", "TRACKED", "HEALTHY"
    );
    if statuses.is_empty() {
        println!("(no monitors configured)");
    }
    for s in &statuses {
        println!(
            "{:<28} {:>7} {:>8} {:<8} {}",
            s.name,
            s.sources,
            s.tracked,
            s.healthy,
            s.notes.as_deref().unwrap_or("")
        );
    }

    println!();
    if telegram_ready {
        println!("notifier: telegram");
    } else {
        println!("notifier: console (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set)");
    }

    Ok(())
}
