//! Run orchestration.
//!
//! One run walks the selected monitors in order. For each monitor:
//!
//! 1. take the store lock,
//! 2. load the known-item store (missing or corrupt ⇒ empty),
//! 3. fetch every source in turn, classifying each batch as it arrives,
//! 4. save the store once,
//! 5. hand the delta to the notifier.
//!
//! A source that fails or times out contributes zero candidates. A failed
//! notification is logged and does not undo the save. Only a failed save
//! (or lock contention) makes the run fail.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::Config;
use crate::detector::Detection;
use crate::models::{CandidateItem, DeltaSet};
use crate::monitors::{self, Monitor};
use crate::notify;
use crate::progress::{RunProgressEvent, RunProgressReporter};
use crate::store::{KnownItemStore, StoreLock};
use crate::traits::{Notifier, Source};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Classify only: no store write, no notification, no lock.
    pub dry_run: bool,
    /// Upper bound for each fetch and each notification.
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// What one monitor's run did.
#[derive(Debug)]
pub struct RunSummary {
    pub monitor: String,
    pub fetched: usize,
    pub failed_sources: Vec<String>,
    pub detection: Detection,
    pub saved: bool,
    /// `None` when nothing was sent (empty delta or dry run).
    pub notified: Option<bool>,
}

impl RunSummary {
    pub fn delta(&self) -> &DeltaSet {
        &self.detection.delta
    }
}

/// Fetch a source within `timeout`. Failures and timeouts are logged and
/// returned as the error text; the caller treats them as an empty batch.
pub async fn fetch_bounded(
    source: &dyn Source,
    timeout: Duration,
) -> Result<Vec<CandidateItem>, String> {
    match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => {
            let error = format!("{:#}", e);
            tracing::warn!(source = source.name(), error = %error, "fetch failed");
            Err(error)
        }
        Err(_) => {
            tracing::warn!(
                source = source.name(),
                timeout_secs = timeout.as_secs(),
                "fetch timed out"
            );
            Err("timed out".to_string())
        }
    }
}

/// Run a single monitor end to end.
pub async fn run_monitor(
    monitor: &Monitor,
    notifier: &dyn Notifier,
    progress: &dyn RunProgressReporter,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let label = monitor.info.label();
    let store_path = &monitor.info.store_path;

    let _lock = if opts.dry_run {
        None
    } else {
        Some(StoreLock::acquire(store_path)?)
    };

    let mut store = KnownItemStore::load(store_path);
    tracing::info!(monitor = %label, known = store.len(), "store loaded");

    let mut detection = Detection::default();
    let mut fetched = 0usize;
    let mut failed_sources = Vec::new();

    for source in &monitor.sources {
        progress.report(RunProgressEvent::Fetching {
            monitor: label.clone(),
            source: source.name().to_string(),
        });

        let (candidates, failed) = match fetch_bounded(source.as_ref(), opts.timeout).await {
            Ok(items) => (items, false),
            Err(_) => {
                failed_sources.push(source.name().to_string());
                (Vec::new(), true)
            }
        };
        progress.report(RunProgressEvent::Fetched {
            monitor: label.clone(),
            source: source.name().to_string(),
            candidates: candidates.len() as u64,
            failed,
        });

        fetched += candidates.len();
        detection.absorb(monitor.detector.classify(&mut store, candidates, now));
    }

    progress.report(RunProgressEvent::Classified {
        monitor: label.clone(),
        new_items: detection.delta.len() as u64,
        known: detection.already_known as u64,
    });

    if opts.dry_run {
        return Ok(RunSummary {
            monitor: label,
            fetched,
            failed_sources,
            detection,
            saved: false,
            notified: None,
        });
    }

    store
        .save()
        .with_context(|| format!("{}: failed to persist store", label))?;

    let notified = if detection.delta.is_empty() {
        None
    } else {
        let sent = tokio::time::timeout(
            opts.timeout,
            notifier.notify(&monitor.format, &detection.delta),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::warn!(monitor = %label, "notification timed out");
            false
        });
        if !sent {
            tracing::warn!(
                monitor = %label,
                items = detection.delta.len(),
                "notification not delivered; items stay recorded as seen"
            );
        }
        Some(sent)
    };

    Ok(RunSummary {
        monitor: label,
        fetched,
        failed_sources,
        detection,
        saved: true,
        notified,
    })
}

/// Run every monitor in `monitors`, one after another.
///
/// A monitor whose store cannot be written does not stop the others; the
/// failures are collected and returned as one error at the end.
pub async fn run_monitors(
    monitors: &[Monitor],
    notifier: &dyn Notifier,
    progress: &dyn RunProgressReporter,
    opts: &RunOptions,
) -> Result<Vec<RunSummary>> {
    let mut summaries = Vec::new();
    run_each(monitors, notifier, progress, opts, |s| summaries.push(s)).await?;
    Ok(summaries)
}

async fn run_each<F>(
    monitors: &[Monitor],
    notifier: &dyn Notifier,
    progress: &dyn RunProgressReporter,
    opts: &RunOptions,
    mut on_summary: F,
) -> Result<()>
where
    F: FnMut(RunSummary),
{
    let mut failures = Vec::new();

    for monitor in monitors {
        match run_monitor(monitor, notifier, progress, opts, Utc::now()).await {
            Ok(summary) => on_summary(summary),
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::error!(monitor = %monitor.info.label(), error = %error, "run failed");
                failures.push(error);
            }
        }
    }

    if !failures.is_empty() {
        anyhow::bail!("{} monitor(s) failed: {}", failures.len(), failures.join("; "));
    }
    Ok(())
}

/// CLI entry point for `event-watch run`.
pub async fn run_watch(
    config: &Config,
    spec: &str,
    notifier: &dyn Notifier,
    progress: &dyn RunProgressReporter,
    dry_run: bool,
) -> Result<()> {
    let client = config.http.client()?;
    let monitors = monitors::resolve(config, spec, &client)?;
    let opts = RunOptions {
        dry_run,
        timeout: Duration::from_secs(config.http.timeout_secs),
    };

    run_each(&monitors, notifier, progress, &opts, |s| print_summary(&s, dry_run)).await
}

fn print_summary(s: &RunSummary, dry_run: bool) {
    if dry_run {
        println!("run {} (dry-run)", s.monitor);
    } else {
        println!("run {}", s.monitor);
    }
    println!("  fetched: {} candidates", s.fetched);
    if !s.failed_sources.is_empty() {
        println!("  failed sources: {}", s.failed_sources.join(", "));
    }
    println!("  not relevant: {}", s.detection.irrelevant);
    println!("  already known: {}", s.detection.already_known);
    if s.detection.refreshed > 0 {
        println!("  refreshed: {}", s.detection.refreshed);
    }
    if !s.detection.diagnostics.is_empty() {
        println!("  skipped (malformed): {}", s.detection.diagnostics.len());
    }
    println!("  new: {}", s.detection.delta.len());
    for item in &s.detection.delta {
        println!("    + {}", item.id);
    }
    match s.notified {
        Some(true) => println!("  notified: yes"),
        Some(false) => println!("  notified: no (delivery failed)"),
        None => {}
    }
    println!("ok");
}

/// CLI entry point for `event-watch notify-test`.
pub async fn run_notify_test(notifier: &dyn Notifier, config: &Config) -> Result<()> {
    let labels: Vec<String> = monitors::describe_monitors(config)
        .iter()
        .map(|m| m.label())
        .collect();
    let text = format!(
        "🔔 **Test Message**\n\nYour event-watch notifier is working!\nMonitors: {}",
        if labels.is_empty() {
            "none configured".to_string()
        } else {
            labels.join(", ")
        }
    );
    if notifier.deliver(&text).await {
        println!("Test message sent via {}.", notifier.name());
        Ok(())
    } else {
        anyhow::bail!("test message was not delivered via {}", notifier.name())
    }
}

/// Build the notifier from config plus already-resolved credentials.
pub fn notifier_for(
    config: &Config,
    credentials: Option<crate::config::TelegramCredentials>,
) -> Result<Box<dyn Notifier>> {
    Ok(notify::build_notifier(
        &config.notify.telegram,
        credentials,
        config.http.client()?,
    ))
}
