use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub monitors: MonitorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    /// Shared HTTP client; every request is bounded by `timeout_secs`.
    pub fn client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .user_agent(self.user_agent.clone())
            .build()?;
        Ok(client)
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("event-watch/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
    #[serde(default)]
    pub disable_web_page_preview: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api(),
            parse_mode: default_parse_mode(),
            disable_web_page_preview: false,
        }
    }
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}
fn default_parse_mode() -> String {
    "Markdown".to_string()
}

/// Telegram credentials, resolved once at startup.
///
/// Config values win over the process environment. Nothing below `main`
/// reads the environment; this value is handed to the notifier instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    /// Resolve credentials from config, falling back to `lookup` for
    /// `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`. Empty strings count as unset.
    pub fn resolve_credentials<F>(&self, lookup: F) -> Option<TelegramCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |configured: &Option<String>, var: &str| {
            configured
                .clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(var).filter(|v| !v.trim().is_empty()))
        };
        let bot_token = pick(&self.bot_token, "TELEGRAM_BOT_TOKEN")?;
        let chat_id = pick(&self.chat_id, "TELEGRAM_CHAT_ID")?;
        Some(TelegramCredentials { bot_token, chat_id })
    }
}

/// What happens when a candidate's id is already in the store.
///
/// Both variants keep the item out of the delta; they differ only in
/// whether the stored attributes are replaced.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    #[default]
    FirstSeenWins,
    Refresh,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    /// Substrings matched case-insensitively against venue/city/region/location.
    #[serde(default)]
    pub location_tokens: Vec<String>,
    /// Exact (case-insensitive) values accepted in the `region` field.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Substrings matched case-insensitively against name/title/description.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Settings shared by every monitor kind.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorCommon {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub on_known: UpdatePolicy,
    #[serde(default)]
    pub key_fields: Option<Vec<String>>,
    #[serde(default)]
    pub required_fields: Option<Vec<String>>,
    #[serde(default)]
    pub store_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorsConfig {
    #[serde(default)]
    pub bandsintown: BTreeMap<String, BandsintownMonitorConfig>,
    #[serde(default)]
    pub nhl: BTreeMap<String, NhlMonitorConfig>,
    #[serde(default)]
    pub conventions: BTreeMap<String, ConventionsMonitorConfig>,
    #[serde(default)]
    pub shops: BTreeMap<String, ShopsMonitorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BandsintownMonitorConfig {
    pub artists: Vec<String>,
    pub app_id: String,
    #[serde(default = "default_bandsintown_base")]
    pub base_url: String,
    #[serde(flatten)]
    pub common: MonitorCommon,
}

fn default_bandsintown_base() -> String {
    "https://rest.bandsintown.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct NhlMonitorConfig {
    pub team_id: u32,
    pub team_name: String,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,
    #[serde(default = "default_nhl_base")]
    pub base_url: String,
    #[serde(flatten)]
    pub common: MonitorCommon,
}

/// Longest schedule window a monitor may request, in days.
pub const MAX_DAYS_AHEAD: i64 = 3650;

fn default_days_ahead() -> i64 {
    180
}
fn default_nhl_base() -> String {
    "https://statsapi.web.nhl.com".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConventionsMonitorConfig {
    pub events: Vec<ConventionEntry>,
    #[serde(flatten)]
    pub common: MonitorCommon,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConventionEntry {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub url: String,
    /// Full English month name, or `Various` to match every month.
    pub typical_month: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShopsMonitorConfig {
    pub shops: Vec<ShopEntry>,
    /// Event keywords combined with the built-in date forms.
    #[serde(default = "default_shop_keywords")]
    pub keywords: Vec<String>,
    /// Full regular expressions; when set, `keywords` is ignored.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(flatten)]
    pub common: MonitorCommon,
}

fn default_shop_keywords() -> Vec<String> {
    crate::source_shops::DEFAULT_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShopEntry {
    pub name: String,
    #[serde(default)]
    pub location: String,
    /// Events page.
    pub url: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    for (name, m) in &config.monitors.bandsintown {
        if m.artists.iter().all(|a| a.trim().is_empty()) {
            anyhow::bail!("monitors.bandsintown.{}: at least one artist is required", name);
        }
        if m.app_id.trim().is_empty() {
            anyhow::bail!("monitors.bandsintown.{}: app_id must not be empty", name);
        }
    }

    for (name, m) in &config.monitors.nhl {
        if m.team_name.trim().is_empty() {
            anyhow::bail!("monitors.nhl.{}: team_name must not be empty", name);
        }
        if !(0..=MAX_DAYS_AHEAD).contains(&m.days_ahead) {
            anyhow::bail!(
                "monitors.nhl.{}: days_ahead must be between 0 and {}",
                name,
                MAX_DAYS_AHEAD
            );
        }
    }

    for (name, m) in &config.monitors.conventions {
        if m.events.is_empty() {
            anyhow::bail!("monitors.conventions.{}: events must not be empty", name);
        }
        if m.events.iter().any(|e| e.name.trim().is_empty()) {
            anyhow::bail!("monitors.conventions.{}: every event needs a name", name);
        }
    }

    for (name, m) in &config.monitors.shops {
        if m.shops.is_empty() {
            anyhow::bail!("monitors.shops.{}: shops must not be empty", name);
        }
        let incomplete = m
            .shops
            .iter()
            .any(|s| s.name.trim().is_empty() || s.url.trim().is_empty());
        if incomplete {
            anyhow::bail!("monitors.shops.{}: every shop needs a name and url", name);
        }
        if m.patterns.is_empty() && m.keywords.iter().all(|k| k.trim().is_empty()) {
            anyhow::bail!("monitors.shops.{}: keywords or patterns are required", name);
        }
        crate::source_shops::event_patterns(m.keywords.as_slice(), m.patterns.as_slice())
            .with_context(|| format!("monitors.shops.{}", name))?;
    }

    Ok(config)
}
