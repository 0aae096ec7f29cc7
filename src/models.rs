//! Core data models used throughout event-watch.
//!
//! Candidates flow in from a source, tracked items are what the store keeps,
//! and the delta set is what a single run hands to the notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Raw record produced by a source before filtering and deduplication.
///
/// Lives for one fetch cycle only and is never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Label of the source that produced it (e.g. `bandsintown:Metallica`).
    pub source: String,
    /// Identifier supplied by the provider, if it has one.
    pub canonical_id: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl CandidateItem {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            canonical_id: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.canonical_id = Some(id.into());
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Returns the field value if present and not blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Normalized record persisted in the known-item store.
///
/// The `id` is fixed once written; records are only removed by an explicit
/// prune.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
    pub first_seen: DateTime<Utc>,
}

impl TrackedItem {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Items classified as new during one run, in source order.
pub type DeltaSet = Vec<TrackedItem>;

/// Why a single candidate could not be turned into a tracked item.
///
/// These never abort a run; the detector records them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("no canonical id and none of the key fields {fields:?} are present")]
    MissingIdentity { fields: Vec<String> },
    #[error("required field '{0}' is missing or empty")]
    MissingField(String),
}
