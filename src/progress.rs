//! Run progress reporting.
//!
//! Reports what a run is doing (which source is being fetched, how many
//! candidates came back) on **stderr**, so stdout stays parseable for
//! scripts and cron mail.

use std::io::Write;

/// A single progress event for a run.
#[derive(Clone, Debug)]
pub enum RunProgressEvent {
    /// A source is being fetched.
    Fetching { monitor: String, source: String },
    /// A source returned; `failed` means its batch was treated as empty.
    Fetched {
        monitor: String,
        source: String,
        candidates: u64,
        failed: bool,
    },
    /// A monitor finished classifying.
    Classified {
        monitor: String,
        new_items: u64,
        known: u64,
    },
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait RunProgressReporter: Send + Sync {
    fn report(&self, event: RunProgressEvent);
}

/// Human-friendly progress on stderr: "run bandsintown:bands  fetching bandsintown:Metallica".
pub struct StderrProgress;

impl RunProgressReporter for StderrProgress {
    fn report(&self, event: RunProgressEvent) {
        let line = match &event {
            RunProgressEvent::Fetching { monitor, source } => {
                format!("run {}  fetching {}\n", monitor, source)
            }
            RunProgressEvent::Fetched {
                monitor,
                source,
                candidates,
                failed,
            } => {
                if *failed {
                    format!("run {}  {} failed, treated as empty\n", monitor, source)
                } else {
                    format!(
                        "run {}  {} returned {} candidates\n",
                        monitor,
                        source,
                        format_number(*candidates)
                    )
                }
            }
            RunProgressEvent::Classified {
                monitor,
                new_items,
                known,
            } => format!(
                "run {}  {} new, {} already known\n",
                monitor,
                format_number(*new_items),
                format_number(*known)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl RunProgressReporter for JsonProgress {
    fn report(&self, event: RunProgressEvent) {
        let obj = match &event {
            RunProgressEvent::Fetching { monitor, source } => serde_json::json!({
                "event": "progress",
                "monitor": monitor,
                "phase": "fetching",
                "source": source
            }),
            RunProgressEvent::Fetched {
                monitor,
                source,
                candidates,
                failed,
            } => serde_json::json!({
                "event": "progress",
                "monitor": monitor,
                "phase": "fetched",
                "source": source,
                "candidates": candidates,
                "failed": failed
            }),
            RunProgressEvent::Classified {
                monitor,
                new_items,
                known,
            } => serde_json::json!({
                "event": "progress",
                "monitor": monitor,
                "phase": "classified",
                "new": new_items,
                "known": known
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RunProgressReporter for NoProgress {
    fn report(&self, _event: RunProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn RunProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
