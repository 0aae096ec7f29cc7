//! Bandsintown artist events.
//!
//! One [`BandsintownSource`] per artist. Each fetch is a single
//! `GET {base}/artists/{artist}/events?app_id=...`; the payload must be a
//! JSON array of events or the batch is treated as empty.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::CandidateItem;
use crate::traits::Source;

pub const KIND: &str = "bandsintown";

/// Key fields for events that arrive without an id.
pub const KEY_FIELDS: &[&str] = &["date", "venue"];

pub struct BandsintownSource {
    label: String,
    artist: String,
    app_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl BandsintownSource {
    pub fn new(artist: &str, app_id: &str, base_url: &str, client: reqwest::Client) -> Self {
        Self {
            label: format!("{}:{}", KIND, artist),
            artist: artist.to_string(),
            app_id: app_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn events_url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("base_url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["artists", self.artist.as_str(), "events"]);
        url.query_pairs_mut().append_pair("app_id", &self.app_id);
        Ok(url)
    }
}

#[async_trait]
impl Source for BandsintownSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<CandidateItem>> {
        let url = self.events_url()?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let payload: Value = response.json().await?;
        Ok(parse_events(&self.label, &self.artist, &payload))
    }
}

/// Map an events payload to candidates. Anything but an array is empty.
pub fn parse_events(label: &str, artist: &str, payload: &Value) -> Vec<CandidateItem> {
    let Some(events) = payload.as_array() else {
        tracing::warn!(source = label, "events payload is not a list");
        return Vec::new();
    };

    events
        .iter()
        .filter(|e| e.is_object())
        .map(|event| {
            let venue = &event["venue"];
            let mut item = CandidateItem::new(label)
                .with_field("artist", artist)
                .with_field("venue", str_or(&venue["name"], "Unknown Venue"))
                .with_field("city", str_or(&venue["city"], ""))
                .with_field("region", str_or(&venue["region"], ""))
                .with_field("country", str_or(&venue["country"], ""))
                .with_field("date", str_or(&event["datetime"], "TBD"))
                .with_field("url", str_or(&event["url"], ""));
            if let Some(id) = id_string(&event["id"]) {
                item = item.with_id(id);
            }
            item
        })
        .collect()
}

fn str_or(value: &Value, default: &str) -> String {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Ids show up as strings or numbers depending on the endpoint.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
