//! Change detection: which candidates are new since the last run.
//!
//! For every candidate the detector applies the criteria filter, resolves
//! its id and checks the known-item store. Unknown ids are normalized into
//! [`TrackedItem`]s, upserted into the store and appended to the delta, so a
//! duplicate later in the same batch is already known by the time it is
//! reached.
//!
//! The detector never persists anything; the caller saves the store once
//! after every source of the run has been classified.

use chrono::{DateTime, Utc};

use crate::config::UpdatePolicy;
use crate::filter::CriteriaFilter;
use crate::identity::IdentityResolver;
use crate::models::{CandidateError, CandidateItem, DeltaSet, TrackedItem};
use crate::store::KnownItemStore;

/// A candidate that was skipped because it could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub source: String,
    /// Position in the batch it came from.
    pub index: usize,
    pub error: CandidateError,
}

/// Outcome of classifying one or more batches.
#[derive(Debug, Default)]
pub struct Detection {
    pub delta: DeltaSet,
    pub diagnostics: Vec<Diagnostic>,
    pub seen: usize,
    pub irrelevant: usize,
    pub already_known: usize,
    pub refreshed: usize,
}

impl Detection {
    /// Fold another detection into this one, keeping delta order.
    pub fn absorb(&mut self, other: Detection) {
        self.delta.extend(other.delta);
        self.diagnostics.extend(other.diagnostics);
        self.seen += other.seen;
        self.irrelevant += other.irrelevant;
        self.already_known += other.already_known;
        self.refreshed += other.refreshed;
    }
}

pub struct ChangeDetector {
    filter: CriteriaFilter,
    resolver: IdentityResolver,
    required_fields: Vec<String>,
    policy: UpdatePolicy,
}

impl ChangeDetector {
    pub fn new(filter: CriteriaFilter, resolver: IdentityResolver) -> Self {
        Self {
            filter,
            resolver,
            required_fields: Vec::new(),
            policy: UpdatePolicy::default(),
        }
    }

    pub fn with_required_fields<T: AsRef<str>>(mut self, fields: &[T]) -> Self {
        self.required_fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Classify one batch against `store`, mutating it in memory.
    pub fn classify(
        &self,
        store: &mut KnownItemStore,
        candidates: Vec<CandidateItem>,
        now: DateTime<Utc>,
    ) -> Detection {
        let mut detection = Detection::default();

        for (index, candidate) in candidates.into_iter().enumerate() {
            detection.seen += 1;

            if !self.filter.is_relevant(&candidate) {
                detection.irrelevant += 1;
                continue;
            }

            let id = match self.resolver.resolve(&candidate) {
                Ok(id) => id,
                Err(error) => {
                    record(&mut detection, &candidate, index, error);
                    continue;
                }
            };

            if store.contains(&id) {
                detection.already_known += 1;
                if self.policy == UpdatePolicy::Refresh {
                    if let Some(refreshed) = self.refreshed(store, &id, &candidate) {
                        store.upsert(refreshed);
                        detection.refreshed += 1;
                    }
                }
                continue;
            }

            let item = match self.normalize(id, &candidate, now) {
                Ok(item) => item,
                Err(error) => {
                    record(&mut detection, &candidate, index, error);
                    continue;
                }
            };

            tracing::debug!(id = %item.id, source = %candidate.source, "new item");
            store.upsert(item.clone());
            detection.delta.push(item);
        }

        detection
    }

    /// Turn a candidate into the record that gets persisted.
    pub fn normalize(
        &self,
        id: String,
        candidate: &CandidateItem,
        now: DateTime<Utc>,
    ) -> Result<TrackedItem, CandidateError> {
        if let Some(missing) = self
            .required_fields
            .iter()
            .find(|f| candidate.field(f).is_none())
        {
            return Err(CandidateError::MissingField(missing.clone()));
        }

        let mut attributes = candidate.fields.clone();
        attributes.insert("source".to_string(), candidate.source.clone());

        Ok(TrackedItem {
            id,
            attributes,
            first_seen: now,
        })
    }

    /// The stored record with fresh attributes, or `None` if nothing changed
    /// or the candidate no longer normalizes.
    fn refreshed(
        &self,
        store: &KnownItemStore,
        id: &str,
        candidate: &CandidateItem,
    ) -> Option<TrackedItem> {
        let existing = store.get(id)?;
        let fresh = self
            .normalize(id.to_string(), candidate, existing.first_seen)
            .ok()?;
        (fresh.attributes != existing.attributes).then_some(fresh)
    }
}

fn record(
    detection: &mut Detection,
    candidate: &CandidateItem,
    index: usize,
    error: CandidateError,
) {
    tracing::warn!(
        source = %candidate.source,
        index,
        error = %error,
        "skipping malformed candidate"
    );
    detection.diagnostics.push(Diagnostic {
        source: candidate.source.clone(),
        index,
        error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn nc_detector() -> ChangeDetector {
        let filter = CriteriaFilter::from_config(&FilterConfig {
            location_tokens: vec![", nc".into(), "north carolina".into()],
            ..Default::default()
        });
        ChangeDetector::new(filter, IdentityResolver::new(&["date", "venue"]))
    }

    fn show(id: &str, venue: &str, region: &str) -> CandidateItem {
        CandidateItem::new("bandsintown:Metallica")
            .with_id(id)
            .with_field("venue", venue)
            .with_field("city", "Raleigh")
            .with_field("region", region)
            .with_field("date", "2024-01-01T20:00:00")
    }

    #[test]
    fn duplicate_in_one_batch_is_reported_once() {
        let mut store = KnownItemStore::empty("unused.json");
        let batch = vec![
            show("X-2024-01-01", "PNC Arena", "NC"),
            show("X-2024-01-01", "PNC Arena", "NC"),
        ];
        let d = nc_detector().classify(&mut store, batch, now());
        assert_eq!(d.delta.len(), 1);
        assert_eq!(d.already_known, 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("X-2024-01-01"));
    }

    #[test]
    fn irrelevant_candidates_touch_neither_delta_nor_store() {
        let mut store = KnownItemStore::empty("unused.json");
        let batch = vec![show("a", "PNC Arena", "SC"), show("b", "Colonial Life Arena", "SC")];
        let d = nc_detector().classify(&mut store, batch, now());
        assert!(d.delta.is_empty());
        assert_eq!(d.irrelevant, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn known_id_with_changed_attributes_stays_out_of_delta() {
        let mut store = KnownItemStore::empty("unused.json");
        let det = nc_detector();
        det.classify(&mut store, vec![show("a", "PNC Arena", "NC")], now());

        let moved = show("a", "Lenovo Center", "NC");
        let d = det.classify(&mut store, vec![moved], now());
        assert!(d.delta.is_empty());
        assert_eq!(store.get("a").unwrap().attr("venue"), Some("PNC Arena"));
        assert_eq!(d.refreshed, 0);
    }

    #[test]
    fn refresh_policy_updates_attributes_but_keeps_first_seen() {
        let mut store = KnownItemStore::empty("unused.json");
        let det = nc_detector().with_policy(UpdatePolicy::Refresh);
        det.classify(&mut store, vec![show("a", "PNC Arena", "NC")], now());

        let later = now() + chrono::Duration::days(3);
        let d = det.classify(&mut store, vec![show("a", "Lenovo Center", "NC")], later);
        assert!(d.delta.is_empty());
        assert_eq!(d.refreshed, 1);
        let stored = store.get("a").unwrap();
        assert_eq!(stored.attr("venue"), Some("Lenovo Center"));
        assert_eq!(stored.first_seen, now());
    }

    #[test]
    fn malformed_candidate_is_skipped_not_fatal() {
        let mut store = KnownItemStore::empty("unused.json");
        let det = nc_detector().with_required_fields(&["venue", "date"]);
        let broken = CandidateItem::new("bandsintown:Metallica")
            .with_id("broken")
            .with_field("city", "Raleigh, NC");
        let batch = vec![broken, show("ok", "PNC Arena", "NC")];
        let d = det.classify(&mut store, batch, now());

        assert_eq!(d.delta.len(), 1);
        assert_eq!(d.delta[0].id, "ok");
        assert_eq!(d.diagnostics.len(), 1);
        assert_eq!(d.diagnostics[0].index, 0);
        assert_eq!(
            d.diagnostics[0].error,
            CandidateError::MissingField("venue".into())
        );
        assert!(!store.contains("broken"));
    }

    #[test]
    fn unidentifiable_candidate_is_skipped() {
        let mut store = KnownItemStore::empty("unused.json");
        let c = CandidateItem::new("s").with_field("location", "Durham, NC");
        let d = nc_detector().classify(&mut store, vec![c], now());
        assert!(d.delta.is_empty());
        assert!(matches!(
            d.diagnostics[0].error,
            CandidateError::MissingIdentity { .. }
        ));
    }

    #[test]
    fn delta_keeps_source_order() {
        let mut store = KnownItemStore::empty("unused.json");
        let batch = vec![
            show("c", "Venue C", "NC"),
            show("a", "Venue A", "NC"),
            show("b", "Venue B", "NC"),
        ];
        let d = nc_detector().classify(&mut store, batch, now());
        let ids: Vec<&str> = d.delta.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn normalized_item_records_source_and_first_seen() {
        let mut store = KnownItemStore::empty("unused.json");
        let d = nc_detector().classify(&mut store, vec![show("a", "PNC Arena", "NC")], now());
        let item = &d.delta[0];
        assert_eq!(item.attr("source"), Some("bandsintown:Metallica"));
        assert_eq!(item.attr("city"), Some("Raleigh"));
        assert_eq!(item.first_seen, now());
    }

    #[test]
    fn second_run_over_saved_store_finds_nothing_new() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bands.json");
        let det = nc_detector();

        let mut store = KnownItemStore::load(&path);
        let first = det.classify(&mut store, vec![show("a", "PNC Arena", "NC")], now());
        store.save().unwrap();
        assert_eq!(first.delta.len(), 1);
        assert_eq!(KnownItemStore::load(&path).len(), 1);

        let mut store = KnownItemStore::load(&path);
        let second = det.classify(&mut store, vec![show("a", "PNC Arena", "NC")], now());
        assert!(second.delta.is_empty());
    }

    #[test]
    fn absorb_concatenates_in_order() {
        let mut store = KnownItemStore::empty("unused.json");
        let det = nc_detector();
        let mut total = det.classify(&mut store, vec![show("a", "A", "NC")], now());
        let batch = vec![show("b", "B", "SC"), show("c", "C", "NC")];
        total.absorb(det.classify(&mut store, batch, now()));
        let ids: Vec<&str> = total.delta.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(total.seen, 3);
        assert_eq!(total.irrelevant, 1);
    }
}
