//! Store statistics.
//!
//! Quick per-monitor summary of what is being tracked, so an operator can
//! tell whether runs are recording anything. Used by `event-watch stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::monitors;
use crate::store::KnownItemStore;

struct MonitorStats {
    label: String,
    tracked: usize,
    size: u64,
    newest: Option<DateTime<Utc>>,
}

/// Run the stats command: load every store and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let stats: Vec<MonitorStats> = monitors::describe_monitors(config)
        .into_iter()
        .map(|info| {
            let store = KnownItemStore::load(&info.store_path);
            MonitorStats {
                label: info.label(),
                tracked: store.len(),
                size: std::fs::metadata(&info.store_path)
                    .map(|m| m.len())
                    .unwrap_or(0),
                newest: store.newest_first_seen(),
            }
        })
        .collect();

    let total: usize = stats.iter().map(|s| s.tracked).sum();
    let total_size: u64 = stats.iter().map(|s| s.size).sum();

    println!("Event Watch — Store Stats");
    println!("=========================");
    println!();
    println!("  Store dir:   {}", config.store.dir.display());
    println!("  Size:        {}", format_bytes(total_size));
    println!("  Tracked:     {}", total);

    if !stats.is_empty() {
        println!();
        println!("  By monitor:");
        println!(
            "  {:<28} {:>8} {:>10}   {}",
            "MONITOR", "TRACKED", "SIZE", "NEWEST"
        );
        println!("  {}", "-".repeat(66));
        for s in &stats {
            let newest = match s.newest {
                Some(ts) => format_ts_relative(ts, Utc::now()),
                None => "never".to_string(),
            };
            println!(
                "  {:<28} {:>8} {:>10}   {}",
                s.label,
                s.tracked,
                format_bytes(s.size),
                newest
            );
        }
    }

    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// "3 hours ago" style rendering; falls back to a date past 30 days.
fn format_ts_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();

    if delta < 0 {
        ts.format("%Y-%m-%d %H:%M").to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
