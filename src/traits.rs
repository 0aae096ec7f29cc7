//! Extension seams for sources and notifiers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────────┐   ┌────────────┐
//! │   Sources    │──▶│     ChangeDetector      │──▶│  Notifier  │
//! │ Bandsintown  │   │ filter → id → store     │   │  Telegram  │
//! │ NHL / Shops  │   └───────────┬────────────┘   │  Console   │
//! └──────────────┘               ▼                └────────────┘
//!                         KnownItemStore (JSON)
//! ```
//!
//! Built-in sources live in the `source_*` modules; anything else that can
//! produce [`CandidateItem`]s can be plugged in by implementing [`Source`].

use anyhow::Result;
use async_trait::async_trait;

use crate::message::{self, MessageFormat};
use crate::models::{CandidateItem, TrackedItem};

/// A data provider polled once per run.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use event_watch::models::CandidateItem;
/// use event_watch::traits::Source;
///
/// pub struct FixedSource;
///
/// #[async_trait]
/// impl Source for FixedSource {
///     fn name(&self) -> &str { "fixed:demo" }
///
///     async fn fetch(&self) -> Result<Vec<CandidateItem>> {
///         Ok(vec![CandidateItem::new("fixed:demo")
///             .with_id("1")
///             .with_field("name", "Demo event")])
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Label used in logs, progress and synthesized ids (e.g. `bandsintown:Metallica`).
    fn name(&self) -> &str;

    /// Fetch the current snapshot.
    ///
    /// Errors are reported by the pipeline and the batch counts as empty;
    /// implementations do not need to swallow them.
    async fn fetch(&self) -> Result<Vec<CandidateItem>>;
}

/// Delivers rendered alerts to a messaging endpoint.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Send `text` as-is. Returns whether the endpoint accepted it.
    async fn deliver(&self, text: &str) -> bool;

    /// Render the ordered delta and deliver it. An empty delta is a no-op
    /// and counts as delivered.
    async fn notify(&self, format: &MessageFormat, items: &[TrackedItem]) -> bool {
        let checked_at = chrono::Local::now().naive_local();
        match message::render(format, items, checked_at) {
            Some(text) => self.deliver(&text).await,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn deliver(&self, text: &str) -> bool {
            self.0.lock().unwrap().push(text.to_string());
            true
        }
    }

    #[tokio::test]
    async fn notify_renders_then_delivers() {
        let rec = Recorder(Mutex::new(Vec::new()));
        let item = TrackedItem {
            id: "1".into(),
            attributes: BTreeMap::from([("name".to_string(), "Supercon".to_string())]),
            first_seen: Utc::now(),
        };
        assert!(rec.notify(&MessageFormat::Conventions, &[item]).await);
        let sent = rec.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("**Supercon**"));
    }

    #[tokio::test]
    async fn empty_delta_sends_nothing() {
        let rec = Recorder(Mutex::new(Vec::new()));
        assert!(rec.notify(&MessageFormat::Concerts, &[]).await);
        assert!(rec.0.lock().unwrap().is_empty());
    }
}
