//! Markdown rendering of a delta set.
//!
//! Each monitor kind has its own layout; all of them end with a
//! `Checked:` footer so the recipient can tell when the run happened.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::TrackedItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFormat {
    Concerts,
    Games { team_name: String },
    Conventions,
    /// Shop events grouped per shop; `shop_count` is how many were checked.
    Shops { shop_count: usize },
}

/// Render `items` for delivery. Returns `None` when there is nothing to say.
pub fn render(
    format: &MessageFormat,
    items: &[TrackedItem],
    checked_at: NaiveDateTime,
) -> Option<String> {
    if items.is_empty() {
        return None;
    }

    let mut out = match format {
        MessageFormat::Concerts => render_concerts(items),
        MessageFormat::Games { team_name } => render_games(team_name, items),
        MessageFormat::Conventions => render_conventions(items),
        MessageFormat::Shops { .. } => render_shops(items),
    };

    out.push_str("---\n");
    out.push_str(&format!("Checked: {}", checked_at.format("%Y-%m-%d %H:%M")));
    if let MessageFormat::Shops { shop_count } = format {
        out.push_str(&format!("\nShops checked: {}", shop_count));
    }
    Some(out)
}

fn render_concerts(items: &[TrackedItem]) -> String {
    let mut out = String::from("🎸 **New Concert Announcements!** 🎸\n\n");
    for item in items {
        let date = item.attr("date").unwrap_or("TBD");
        out.push_str(&format!("**{}**\n", item.attr("artist").unwrap_or("Unknown Artist")));
        out.push_str(&format!("📍 {}\n", item.attr("venue").unwrap_or("Unknown Venue")));
        out.push_str(&format!(
            "🌆 {}, {}\n",
            item.attr("city").unwrap_or(""),
            item.attr("region").unwrap_or("")
        ));
        out.push_str(&format!("📅 {}\n", pretty_datetime(date)));
        if let Some(url) = item.attr("url").filter(|u| !u.is_empty()) {
            out.push_str(&format!("🔗 [Get Tickets]({})\n", url));
        }
        out.push('\n');
    }
    out
}

fn render_games(team_name: &str, items: &[TrackedItem]) -> String {
    let mut out = format!("🏒 **{} Schedule Update!** 🏒\n\n", team_name);
    for item in items {
        let date = item.attr("date").unwrap_or("TBD");
        out.push_str(&format!("**vs {}**\n", item.attr("opponent").unwrap_or("TBD")));
        out.push_str(&format!("📅 {}\n", pretty_date(date)));
        out.push_str(&format!(
            "🏟️ {} - {}\n\n",
            item.attr("side").unwrap_or("TBD"),
            item.attr("venue").unwrap_or("TBD")
        ));
    }
    out
}

fn render_conventions(items: &[TrackedItem]) -> String {
    let mut out = String::from("📚 **New Events Announced!** 📚\n\n");
    for item in items {
        out.push_str(&format!("**{}**\n", item.attr("name").unwrap_or("Unnamed event")));
        if let Some(location) = item.attr("location").filter(|l| !l.is_empty()) {
            out.push_str(&format!("📍 {}\n", location));
        }
        if let Some(venue) = item.attr("venue").filter(|v| !v.is_empty()) {
            out.push_str(&format!("🏟️ {}\n", venue));
        }
        if let Some(date) = item.attr("date").filter(|d| *d != "TBD" && !d.is_empty()) {
            out.push_str(&format!("📅 {}\n", pretty_date(date)));
        }
        if let Some(url) = item.attr("url").filter(|u| !u.is_empty()) {
            out.push_str(&format!("🔗 [More Info]({})\n", url));
        }
        out.push('\n');
    }
    out
}

/// One block per shop, in order of first appearance in the delta.
fn render_shops(items: &[TrackedItem]) -> String {
    let mut groups: Vec<(&str, Vec<&TrackedItem>)> = Vec::new();
    for item in items {
        let shop = item.attr("shop").unwrap_or("Unknown shop");
        match groups.iter_mut().find(|(name, _)| *name == shop) {
            Some((_, members)) => members.push(item),
            None => groups.push((shop, vec![item])),
        }
    }

    let mut out = String::from("📚 **Local Comic Shop Events!** 📚\n\n");
    for (shop, members) in groups {
        let first = members[0];
        out.push_str(&format!("**{}**\n", shop));
        if let Some(location) = first.attr("location").filter(|l| !l.is_empty()) {
            out.push_str(&format!("📍 {}\n", location));
        }
        for item in &members {
            out.push_str(&format!("• {}\n", item.attr("title").unwrap_or(&item.id)));
        }
        if let Some(url) = first.attr("url").filter(|u| !u.is_empty()) {
            out.push_str(&format!("🔗 [Website]({})\n", url));
        }
        out.push('\n');
    }
    out
}

/// `2024-08-10T19:00:00` → `Saturday, August 10, 2024 at 07:00 PM`.
/// Values that are not datetimes are returned unchanged.
pub fn pretty_datetime(value: &str) -> String {
    if !value.contains('T') {
        return value.to_string();
    }
    let parsed = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"));
    match parsed {
        Ok(dt) => dt.format("%A, %B %d, %Y at %I:%M %p").to_string(),
        Err(_) => value.to_string(),
    }
}

/// `2024-10-11` → `Friday, October 11, 2024`. Unparseable values pass through.
pub fn pretty_date(value: &str) -> String {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.format("%A, %B %d, %Y").to_string())
        .unwrap_or_else(|_| value.to_string())
}
