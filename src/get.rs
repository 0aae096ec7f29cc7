//! Store inspection and retention.
//!
//! `get` reads a monitor's store; `prune` is the only path that ever removes
//! tracked items.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};

use crate::config::Config;
use crate::models::TrackedItem;
use crate::monitors::{self, MonitorInfo};
use crate::store::{KnownItemStore, StoreLock};

fn single_monitor(config: &Config, spec: &str) -> Result<MonitorInfo> {
    let mut selected = monitors::select(config, spec)?;
    if selected.len() != 1 {
        let labels: Vec<String> = selected.iter().map(MonitorInfo::label).collect();
        bail!(
            "'{}' matches {} monitors ({}); use <kind>:<name>",
            spec,
            selected.len(),
            labels.join(", ")
        );
    }
    Ok(selected.remove(0))
}

/// Tracked items for one monitor, optionally narrowed to a single id.
pub fn get_items(config: &Config, spec: &str, id: Option<&str>) -> Result<Vec<TrackedItem>> {
    let info = single_monitor(config, spec)?;
    let store = KnownItemStore::load(&info.store_path);
    match id {
        Some(id) => match store.get(id) {
            Some(item) => Ok(vec![item.clone()]),
            None => bail!("item not found in {}: {}", info.label(), id),
        },
        None => Ok(store.items().into_iter().cloned().collect()),
    }
}

/// CLI entry point for `event-watch get`. Prints pretty JSON to stdout.
pub fn run_get(config: &Config, spec: &str, id: Option<&str>) -> Result<()> {
    let items = get_items(config, spec, id)?;
    let json = match id {
        Some(_) => serde_json::to_string_pretty(&items[0])?,
        None => serde_json::to_string_pretty(&items)?,
    };
    println!("{}", json);
    Ok(())
}

/// Remove items first seen before `cutoff`, under the store lock.
pub fn prune(config: &Config, spec: &str, cutoff: DateTime<Utc>) -> Result<(MonitorInfo, usize)> {
    let info = single_monitor(config, spec)?;
    let _lock = StoreLock::acquire(&info.store_path)?;
    let mut store = KnownItemStore::load(&info.store_path);
    let removed = store.prune_older_than(cutoff);
    if removed > 0 {
        store
            .save()
            .with_context(|| format!("{}: failed to persist store", info.label()))?;
    }
    tracing::info!(monitor = %info.label(), removed, remaining = store.len(), "pruned store");
    Ok((info, removed))
}

/// `now` minus `older_than_days`, or an error if that is before the
/// earliest representable instant.
pub fn prune_cutoff(now: DateTime<Utc>, older_than_days: u32) -> Result<DateTime<Utc>> {
    TimeDelta::try_days(i64::from(older_than_days))
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| anyhow!("--older-than-days {} is out of range", older_than_days))
}

/// CLI entry point for `event-watch prune`.
pub fn run_prune(config: &Config, spec: &str, older_than_days: u32) -> Result<()> {
    let cutoff = prune_cutoff(Utc::now(), older_than_days)?;
    let (info, removed) = prune(config, spec, cutoff)?;
    println!("prune {}", info.label());
    println!("  cutoff: {}", cutoff.format("%Y-%m-%d %H:%M"));
    println!("  removed: {}", removed);
    println!("ok");
    Ok(())
}
