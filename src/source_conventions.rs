//! Recurring conventions tracked from configuration.
//!
//! There is no upstream API here: each configured convention becomes a
//! candidate during its typical month (or every month for `Various`), keyed
//! by name and year so it is announced once per year.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};

use crate::config::ConventionEntry;
use crate::models::CandidateItem;
use crate::traits::Source;

pub const KIND: &str = "conventions";

/// Value stored in the `source` attribute of every convention.
pub const TRACKER: &str = "Convention Tracker";

pub struct ConventionsSource {
    label: String,
    events: Vec<ConventionEntry>,
    today: Option<NaiveDate>,
}

impl ConventionsSource {
    pub fn new(name: &str, events: Vec<ConventionEntry>) -> Self {
        Self {
            label: format!("{}:{}", KIND, name),
            events,
            today: None,
        }
    }

    /// Pin the clock instead of reading the local date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn candidates_for(&self, today: NaiveDate) -> Vec<CandidateItem> {
        let month = today.format("%B").to_string();
        self.events
            .iter()
            .filter(|e| in_season(&e.typical_month, &month))
            .map(|e| {
                CandidateItem::new(self.label.as_str())
                    .with_id(format!("{}-{}", e.name.trim(), today.year()))
                    .with_field("name", e.name.trim())
                    .with_field("location", e.location.as_str())
                    .with_field("venue", e.venue.as_str())
                    .with_field("url", e.url.as_str())
                    .with_field("date", "TBD")
                    .with_field("tracker", TRACKER)
            })
            .collect()
    }
}

fn in_season(typical_month: &str, current_month: &str) -> bool {
    let typical = typical_month.trim();
    typical.eq_ignore_ascii_case("various") || typical.eq_ignore_ascii_case(current_month)
}

#[async_trait]
impl Source for ConventionsSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<CandidateItem>> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        Ok(self.candidates_for(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, month: &str) -> ConventionEntry {
        ConventionEntry {
            name: name.to_string(),
            location: "Raleigh, NC".to_string(),
            venue: "Raleigh Convention Center".to_string(),
            url: String::new(),
            typical_month: month.to_string(),
        }
    }

    fn source() -> ConventionsSource {
        ConventionsSource::new(
            "comics",
            vec![
                entry("Animazement", "May"),
                entry("Supercon", "July"),
                entry("Charlotte Comicon", "Various"),
            ],
        )
    }

    #[test]
    fn only_in_season_events_are_emitted() {
        let may = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let names: Vec<String> = source()
            .candidates_for(may)
            .iter()
            .filter_map(|c| c.field("name").map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Animazement", "Charlotte Comicon"]);
    }

    #[test]
    fn id_is_name_and_year() {
        let july = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let items = source().candidates_for(july);
        let ids: Vec<&str> = items
            .iter()
            .filter_map(|c| c.canonical_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["Supercon-2025", "Charlotte Comicon-2025"]);
        assert_eq!(items[0].field("date"), Some("TBD"));
        assert_eq!(items[0].field("url"), None);
    }

    #[tokio::test]
    async fn fetch_uses_pinned_clock() {
        let src = source().with_today(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let items = src.fetch().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].canonical_id.as_deref(), Some("Charlotte Comicon-2024"));
    }
}
