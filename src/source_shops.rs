//! Local shop event pages.
//!
//! One [`ShopSource`] per configured shop. The events page is fetched as
//! HTML, reduced to text lines, and every line that carries a date and an
//! event keyword becomes a candidate keyed by `"{shop}-{line}"`.
//!
//! Dates are recognised as `<Month> <day>` or `<m>/<d>/<yy[yy]>`; the
//! keyword may appear anywhere later on the same line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use crate::config::ShopEntry;
use crate::models::CandidateItem;
use crate::traits::Source;

pub const KIND: &str = "shops";

/// Keywords used when a monitor configures neither keywords nor patterns.
pub const DEFAULT_KEYWORDS: &[&str] = &["signing", "event"];

pub const KEY_FIELDS: &[&str] = &["shop", "title"];
pub const REQUIRED_FIELDS: &[&str] = &["title"];

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static LINE_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|li|div|tr|td|h[1-6]|article|section)\s*>")
        .expect("valid line break regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f]+").expect("valid ws regex"));

/// Compile the event matchers for a monitor.
///
/// Explicit `patterns` win. Otherwise one matcher per date form and keyword
/// is built, month-name dates first.
pub fn event_patterns<T: AsRef<str>>(keywords: &[T], patterns: &[T]) -> Result<Vec<Regex>> {
    let sources: Vec<String> = if patterns.is_empty() {
        let date_forms = [
            format!(r"(?:{})\s+\d{{1,2}}", MONTHS),
            r"\d{1,2}/\d{1,2}/\d{2,4}".to_string(),
        ];
        date_forms
            .iter()
            .flat_map(|date| {
                keywords.iter().map(move |kw| {
                    format!(r"{}[^\n]*{}[^\n]*", date, regex::escape(kw.as_ref().trim()))
                })
            })
            .collect()
    } else {
        patterns.iter().map(|p| p.as_ref().to_string()).collect()
    };

    sources
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid event pattern: {}", p))
        })
        .collect()
}

/// Strip markup down to one text line per block element.
pub fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK_RE.replace_all(html, "\n");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    SPACE_RE.replace_all(&text, " ").into_owned()
}

pub struct ShopSource {
    label: String,
    shop: ShopEntry,
    patterns: Vec<Regex>,
    client: reqwest::Client,
}

impl ShopSource {
    pub fn new(shop: ShopEntry, patterns: Vec<Regex>, client: reqwest::Client) -> Self {
        Self {
            label: format!("{}:{}", KIND, shop.name.trim()),
            shop,
            patterns,
            client,
        }
    }

    /// Event candidates found in an events page, in pattern then page order.
    pub fn extract_events(&self, html: &str) -> Vec<CandidateItem> {
        let text = html_to_text(html);
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for pattern in &self.patterns {
            for m in pattern.find_iter(&text) {
                let title = m.as_str().trim();
                if title.is_empty() || !seen.insert(title.to_string()) {
                    continue;
                }
                let name = self.shop.name.trim();
                items.push(
                    CandidateItem::new(self.label.as_str())
                        .with_id(format!("{}-{}", name, title))
                        .with_field("shop", name)
                        .with_field("location", self.shop.location.as_str())
                        .with_field("title", title)
                        .with_field("url", self.shop.url.as_str()),
                );
            }
        }
        items
    }
}

#[async_trait]
impl Source for ShopSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<CandidateItem>> {
        let response = self
            .client
            .get(&self.shop.url)
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;
        Ok(self.extract_events(&html))
    }
}
