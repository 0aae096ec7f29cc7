//! Monitor resolution.
//!
//! Turns a CLI specifier into runnable monitors. Specifiers follow the
//! `all` / `<kind>` / `<kind>:<name>` form, e.g. `all`, `nhl`,
//! `bandsintown:bands`.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::config::{Config, MonitorCommon};
use crate::detector::ChangeDetector;
use crate::filter::CriteriaFilter;
use crate::identity::{IdentityResolver, DEFAULT_KEY_FIELDS};
use crate::message::MessageFormat;
use crate::source_bandsintown::{self, BandsintownSource};
use crate::source_conventions::{self, ConventionsSource};
use crate::source_nhl::{self, NhlScheduleSource};
use crate::source_shops::{self, ShopSource};
use crate::traits::Source;

pub const KINDS: &[&str] = &[
    source_bandsintown::KIND,
    source_nhl::KIND,
    source_conventions::KIND,
    source_shops::KIND,
];

/// Static description of a configured monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub kind: &'static str,
    pub name: String,
    pub source_count: usize,
    pub store_path: PathBuf,
}

impl MonitorInfo {
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }
}

/// A monitor ready to run: its sources, detector and rendering.
pub struct Monitor {
    pub info: MonitorInfo,
    pub sources: Vec<Box<dyn Source>>,
    pub detector: ChangeDetector,
    pub format: MessageFormat,
}

fn store_path(config: &Config, kind: &str, name: &str, common: &MonitorCommon) -> PathBuf {
    match &common.store_file {
        Some(p) if p.is_absolute() => p.clone(),
        Some(p) => config.store.dir.join(p),
        None => config.store.dir.join(format!("{}-{}.json", kind, name)),
    }
}

fn detector(common: &MonitorCommon, key_fields: &[&str], required: &[&str]) -> ChangeDetector {
    let resolver = match &common.key_fields {
        Some(fields) => IdentityResolver::new(fields.as_slice()),
        None => IdentityResolver::new(key_fields),
    };
    let detector = ChangeDetector::new(CriteriaFilter::from_config(&common.filter), resolver)
        .with_policy(common.on_known);
    match &common.required_fields {
        Some(fields) => detector.with_required_fields(fields.as_slice()),
        None => detector.with_required_fields(required),
    }
}

/// Every configured monitor, in kind then name order.
pub fn describe_monitors(config: &Config) -> Vec<MonitorInfo> {
    let m = &config.monitors;
    let mut out = Vec::new();
    for (name, c) in &m.bandsintown {
        out.push(MonitorInfo {
            kind: source_bandsintown::KIND,
            name: name.clone(),
            source_count: c.artists.iter().filter(|a| !a.trim().is_empty()).count(),
            store_path: store_path(config, source_bandsintown::KIND, name, &c.common),
        });
    }
    for (name, c) in &m.nhl {
        out.push(MonitorInfo {
            kind: source_nhl::KIND,
            name: name.clone(),
            source_count: 1,
            store_path: store_path(config, source_nhl::KIND, name, &c.common),
        });
    }
    for (name, c) in &m.conventions {
        out.push(MonitorInfo {
            kind: source_conventions::KIND,
            name: name.clone(),
            source_count: 1,
            store_path: store_path(config, source_conventions::KIND, name, &c.common),
        });
    }
    for (name, c) in &m.shops {
        out.push(MonitorInfo {
            kind: source_shops::KIND,
            name: name.clone(),
            source_count: c.shops.len(),
            store_path: store_path(config, source_shops::KIND, name, &c.common),
        });
    }
    out
}

/// Select monitor descriptions matching `spec`.
pub fn select(config: &Config, spec: &str) -> Result<Vec<MonitorInfo>> {
    let all = describe_monitors(config);
    let selected: Vec<MonitorInfo> = match spec.split_once(':') {
        _ if spec == "all" => all.clone(),
        Some((kind, name)) => all
            .iter()
            .filter(|m| m.kind == kind && m.name == name)
            .cloned()
            .collect(),
        None => {
            if !KINDS.contains(&spec) {
                bail!(
                    "Unknown monitor kind: '{}'. Available: all, {}",
                    spec,
                    KINDS.join(", ")
                );
            }
            all.iter().filter(|m| m.kind == spec).cloned().collect()
        }
    };

    if selected.is_empty() {
        let available: Vec<String> = all.iter().map(MonitorInfo::label).collect();
        bail!(
            "No monitor matches '{}'. Configured: {}",
            spec,
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        );
    }
    Ok(selected)
}

/// Build runnable monitors for `spec`, sharing one HTTP client.
pub fn resolve(config: &Config, spec: &str, client: &reqwest::Client) -> Result<Vec<Monitor>> {
    select(config, spec)?
        .into_iter()
        .map(|info| build(config, info, client))
        .collect()
}

fn build(config: &Config, info: MonitorInfo, client: &reqwest::Client) -> Result<Monitor> {
    let m = &config.monitors;
    let monitor = match info.kind {
        source_bandsintown::KIND => {
            let c = &m.bandsintown[&info.name];
            let sources = c
                .artists
                .iter()
                .filter(|a| !a.trim().is_empty())
                .map(|artist| {
                    Box::new(BandsintownSource::new(
                        artist.trim(),
                        &c.app_id,
                        &c.base_url,
                        client.clone(),
                    )) as Box<dyn Source>
                })
                .collect();
            Monitor {
                detector: detector(&c.common, source_bandsintown::KEY_FIELDS, &[]),
                sources,
                format: MessageFormat::Concerts,
                info,
            }
        }
        source_nhl::KIND => {
            let c = &m.nhl[&info.name];
            let source = NhlScheduleSource::new(
                c.team_id,
                &c.team_name,
                c.days_ahead,
                &c.base_url,
                client.clone(),
            );
            Monitor {
                detector: detector(
                    &c.common,
                    source_nhl::REQUIRED_FIELDS,
                    source_nhl::REQUIRED_FIELDS,
                ),
                sources: vec![Box::new(source)],
                format: MessageFormat::Games {
                    team_name: c.team_name.clone(),
                },
                info,
            }
        }
        source_conventions::KIND => {
            let c = &m.conventions[&info.name];
            let source = ConventionsSource::new(&info.name, c.events.clone());
            Monitor {
                detector: detector(&c.common, DEFAULT_KEY_FIELDS, &["name"]),
                sources: vec![Box::new(source)],
                format: MessageFormat::Conventions,
                info,
            }
        }
        source_shops::KIND => {
            let c = &m.shops[&info.name];
            let patterns =
                source_shops::event_patterns(c.keywords.as_slice(), c.patterns.as_slice())?;
            let sources = c
                .shops
                .iter()
                .map(|shop| {
                    Box::new(ShopSource::new(shop.clone(), patterns.clone(), client.clone()))
                        as Box<dyn Source>
                })
                .collect();
            Monitor {
                detector: detector(
                    &c.common,
                    source_shops::KEY_FIELDS,
                    source_shops::REQUIRED_FIELDS,
                ),
                sources,
                format: MessageFormat::Shops {
                    shop_count: c.shops.len(),
                },
                info,
            }
        }
        other => bail!("Unknown monitor kind: '{}'", other),
    };
    Ok(monitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config() -> Config {
        parse_config(
            r#"
[store]
dir = "/var/lib/event-watch"

[monitors.bandsintown.bands]
artists = ["Metallica", "Green Day", " "]
app_id = "x"

[monitors.nhl.canes]
team_id = 12
team_name = "Carolina Hurricanes"
store_file = "/tmp/canes.json"

[[monitors.conventions.comics.events]]
name = "Animazement"
typical_month = "May"
"#,
        )
        .unwrap()
    }

    #[test]
    fn describes_every_monitor_with_store_paths() {
        let all = describe_monitors(&config());
        let labels: Vec<String> = all.iter().map(MonitorInfo::label).collect();
        assert_eq!(labels, vec!["bandsintown:bands", "nhl:canes", "conventions:comics"]);
        assert_eq!(all[0].source_count, 2);
        assert_eq!(
            all[0].store_path,
            PathBuf::from("/var/lib/event-watch/bandsintown-bands.json")
        );
        assert_eq!(all[1].store_path, PathBuf::from("/tmp/canes.json"));
    }

    #[test]
    fn select_by_kind_and_instance() {
        let cfg = config();
        assert_eq!(select(&cfg, "all").unwrap().len(), 3);
        assert_eq!(select(&cfg, "nhl").unwrap()[0].name, "canes");
        assert_eq!(select(&cfg, "bandsintown:bands").unwrap().len(), 1);
    }

    #[test]
    fn shops_monitor_gets_one_source_per_shop() {
        let cfg = parse_config(
            r#"
[store]
dir = "/var/lib/event-watch"

[[monitors.shops.nc.shops]]
name = "Capitol Comics"
location = "Raleigh, NC"
url = "https://capitol.example/events"

[[monitors.shops.nc.shops]]
name = "Gator Comics"
location = "Greensboro, NC"
url = "https://gator.example/events"
"#,
        )
        .unwrap();
        let client = reqwest::Client::new();
        let monitors = resolve(&cfg, "shops:nc", &client).unwrap();
        let names: Vec<&str> = monitors[0].sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["shops:Capitol Comics", "shops:Gator Comics"]);
        assert_eq!(monitors[0].format, MessageFormat::Shops { shop_count: 2 });
        assert_eq!(
            monitors[0].info.store_path,
            PathBuf::from("/var/lib/event-watch/shops-nc.json")
        );
    }

    #[test]
    fn select_rejects_unknown() {
        let cfg = config();
        assert!(select(&cfg, "weather").is_err());
        assert!(select(&cfg, "nhl:bruins").is_err());
    }

    #[test]
    fn resolve_builds_one_source_per_artist() {
        let cfg = config();
        let client = reqwest::Client::new();
        let monitors = resolve(&cfg, "bandsintown", &client).unwrap();
        let names: Vec<&str> = monitors[0].sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["bandsintown:Metallica", "bandsintown:Green Day"]);
        assert_eq!(monitors[0].format, MessageFormat::Concerts);
    }
}
