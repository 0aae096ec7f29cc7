//! Stable identifiers for candidates.
//!
//! A provider-supplied id always wins. Otherwise the id is built from the
//! source label and a few discriminating fields, each normalized so that
//! casing, stray whitespace or timestamp formatting do not produce a new id.
//!
//! Two distinct items that normalize to the same key collide, and the second
//! one is never reported. That is an accepted limitation of synthesized ids.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::{CandidateError, CandidateItem};

/// Joins the parts of a synthesized id.
pub const SEPARATOR: &str = "|";

/// Key fields used when a monitor does not configure its own.
pub const DEFAULT_KEY_FIELDS: &[&str] = &["date", "name"];

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    key_fields: Vec<String>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_FIELDS)
    }
}

impl IdentityResolver {
    pub fn new<T: AsRef<str>>(key_fields: &[T]) -> Self {
        Self {
            key_fields: key_fields.iter().map(|f| f.as_ref().to_string()).collect(),
        }
    }

    pub fn resolve(&self, candidate: &CandidateItem) -> Result<String, CandidateError> {
        if let Some(id) = candidate
            .canonical_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(id.to_string());
        }

        let values: Vec<Option<&str>> = self
            .key_fields
            .iter()
            .map(|f| candidate.field(f))
            .collect();
        if values.iter().all(Option::is_none) {
            return Err(CandidateError::MissingIdentity {
                fields: self.key_fields.clone(),
            });
        }

        let mut parts = Vec::with_capacity(values.len() + 1);
        parts.push(normalize_text(&candidate.source));
        // Absent fields keep their slot so positions stay comparable.
        parts.extend(values.into_iter().map(|v| v.map(normalize_part).unwrap_or_default()));
        Ok(parts.join(SEPARATOR))
    }
}

/// Normalize one key part: timestamps to a canonical form, text otherwise.
pub fn normalize_part(value: &str) -> String {
    normalize_date(value).unwrap_or_else(|| normalize_text(value))
}

/// Lowercase and collapse internal whitespace.
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonicalize dates and datetimes.
///
/// RFC 3339 values are converted to UTC. Datetimes keep minute precision
/// (`YYYY-MM-DDTHH:MM`); plain dates stay `YYYY-MM-DD`. Anything else is
/// not a date.
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc().format("%Y-%m-%dT%H:%M").to_string());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.format("%Y-%m-%dT%H:%M").to_string());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}
