//! NHL team schedule.
//!
//! Fetches `{base}/api/v1/schedule?teamId=..&startDate=..&endDate=..` for a
//! window starting today and flattens `dates[].games[]` into candidates,
//! one per game, keyed by `gamePk`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeDelta};
use serde_json::Value;

use crate::models::CandidateItem;
use crate::traits::Source;

pub const KIND: &str = "nhl";

/// A game the schedule lists without both team names cannot be described,
/// so these are required before it is tracked.
pub const REQUIRED_FIELDS: &[&str] = &["date", "opponent"];

pub struct NhlScheduleSource {
    label: String,
    team_id: u32,
    team_name: String,
    days_ahead: i64,
    base_url: String,
    client: reqwest::Client,
}

impl NhlScheduleSource {
    pub fn new(
        team_id: u32,
        team_name: &str,
        days_ahead: i64,
        base_url: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            label: format!("{}:{}", KIND, team_name),
            team_id,
            team_name: team_name.to_string(),
            days_ahead,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn schedule_url(&self, today: NaiveDate) -> Result<String> {
        let end = TimeDelta::try_days(self.days_ahead)
            .and_then(|window| today.checked_add_signed(window));
        let Some(end) = end else {
            bail!("days_ahead {} is out of range", self.days_ahead);
        };
        Ok(format!(
            "{}/api/v1/schedule?teamId={}&startDate={}&endDate={}",
            self.base_url,
            self.team_id,
            today.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ))
    }
}

#[async_trait]
impl Source for NhlScheduleSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<CandidateItem>> {
        let url = self.schedule_url(Local::now().date_naive())?;
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let payload: Value = response.json().await?;
        Ok(parse_schedule(&self.label, &self.team_name, &payload))
    }
}

/// Flatten a schedule payload. A payload without `dates` has no games.
pub fn parse_schedule(label: &str, team_name: &str, payload: &Value) -> Vec<CandidateItem> {
    let Some(dates) = payload["dates"].as_array() else {
        tracing::warn!(source = label, "schedule payload has no dates");
        return Vec::new();
    };

    let mut items = Vec::new();
    for day in dates {
        let date = day["date"].as_str().unwrap_or_default();
        let Some(games) = day["games"].as_array() else {
            continue;
        };
        for game in games {
            let mut item = CandidateItem::new(label)
                .with_field("date", date)
                .with_field("time", game["gameDate"].as_str().unwrap_or("TBD"))
                .with_field("venue", game["venue"]["name"].as_str().unwrap_or("TBD"));

            if let Some(pk) = game_pk(&game["gamePk"]) {
                item = item.with_id(pk);
            }

            let home = game["teams"]["home"]["team"]["name"].as_str();
            let away = game["teams"]["away"]["team"]["name"].as_str();
            if let (Some(home), Some(away)) = (home, away) {
                let is_home = home == team_name;
                item = item
                    .with_field("home_team", home)
                    .with_field("away_team", away)
                    .with_field("opponent", if is_home { away } else { home })
                    .with_field("side", if is_home { "Home" } else { "Away" });
            }
            items.push(item);
        }
    }
    items
}

fn game_pk(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::filter::CriteriaFilter;
    use serde_json::json;

    fn game(pk: u64, home: &str, away: &str) -> Value {
        json!({
            "gamePk": pk,
            "gameDate": "2024-10-11T23:00:00Z",
            "venue": { "name": "PNC Arena" },
            "teams": {
                "home": { "team": { "name": home } },
                "away": { "team": { "name": away } }
            }
        })
    }

    #[test]
    fn flattens_dates_and_resolves_opponent() {
        let payload = json!({
            "dates": [
                { "date": "2024-10-11", "games": [game(2024020010, "Carolina Hurricanes", "Tampa Bay Lightning")] },
                { "date": "2024-10-13", "games": [game(2024020025, "New Jersey Devils", "Carolina Hurricanes")] }
            ]
        });
        let items = parse_schedule("nhl:Carolina Hurricanes", "Carolina Hurricanes", &payload);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].canonical_id.as_deref(), Some("2024020010"));
        assert_eq!(items[0].field("opponent"), Some("Tampa Bay Lightning"));
        assert_eq!(items[0].field("side"), Some("Home"));

        assert_eq!(items[1].field("opponent"), Some("New Jersey Devils"));
        assert_eq!(items[1].field("side"), Some("Away"));
        assert_eq!(items[1].field("date"), Some("2024-10-13"));
    }

    #[test]
    fn game_without_teams_has_no_opponent() {
        let payload = json!({
            "dates": [{ "date": "2024-10-11", "games": [{ "gamePk": 1 }] }]
        });
        let items = parse_schedule("nhl:x", "Carolina Hurricanes", &payload);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].field("opponent"), None);
        assert_eq!(items[0].field("venue"), Some("TBD"));
    }

    #[test]
    fn payload_without_dates_is_empty() {
        assert!(parse_schedule("nhl:x", "x", &json!({ "message": "gone" })).is_empty());
        assert!(parse_schedule("nhl:x", "x", &json!(null)).is_empty());
    }

    #[test]
    fn schedule_url_spans_window() {
        let src = NhlScheduleSource::new(
            12,
            "Carolina Hurricanes",
            180,
            "https://statsapi.web.nhl.com/",
            reqwest::Client::new(),
        );
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            src.schedule_url(today).unwrap(),
            "https://statsapi.web.nhl.com/api/v1/schedule?teamId=12&startDate=2024-01-01&endDate=2024-06-29"
        );
    }

    #[test]
    fn huge_window_is_an_error() {
        let src = NhlScheduleSource::new(
            12,
            "x",
            i64::MAX,
            "http://nhl.test",
            reqwest::Client::new(),
        );
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(src.schedule_url(today).is_err());
    }

    #[test]
    fn home_or_away_does_not_feed_the_location_filter() {
        let payload = json!({
            "dates": [{
                "date": "2024-10-11",
                "games": [game(1, "Carolina Hurricanes", "Boston Bruins")]
            }]
        });
        let items = parse_schedule("nhl:x", "Carolina Hurricanes", &payload);
        assert_eq!(items[0].field("location"), None);

        let filter = CriteriaFilter::from_config(&FilterConfig {
            location_tokens: vec!["home".into()],
            ..Default::default()
        });
        assert!(!filter.is_relevant(&items[0]));
    }
}
