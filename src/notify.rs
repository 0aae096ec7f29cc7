//! Built-in notifiers.
//!
//! | Notifier | Used when |
//! |----------|-----------|
//! | [`TelegramNotifier`] | bot token and chat id resolved |
//! | [`ConsoleNotifier`] | credentials missing; prints and reports "not delivered" |
//!
//! Delivery failures are logged and reported as `false`; they never
//! propagate as errors.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{TelegramConfig, TelegramCredentials};
use crate::traits::Notifier;

pub struct TelegramNotifier {
    credentials: TelegramCredentials,
    api_base: String,
    parse_mode: String,
    disable_web_page_preview: bool,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(
        config: &TelegramConfig,
        credentials: TelegramCredentials,
        client: reqwest::Client,
    ) -> Self {
        Self {
            credentials,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            parse_mode: config.parse_mode.clone(),
            disable_web_page_preview: config.disable_web_page_preview,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base, self.credentials.bot_token
        )
    }

    fn payload(&self, text: &str) -> Value {
        json!({
            "chat_id": self.credentials.chat_id,
            "text": text,
            "parse_mode": self.parse_mode,
            "disable_web_page_preview": self.disable_web_page_preview,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, text: &str) -> bool {
        let resp = self
            .client
            .post(self.endpoint())
            .json(&self.payload(text))
            .send()
            .await;

        let response = match resp {
            Ok(r) => r,
            Err(e) => {
                // Strip the URL: it carries the bot token.
                tracing::warn!(error = %e.without_url(), "telegram request failed");
                return false;
            }
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() && body["ok"].as_bool() == Some(true) {
            tracing::info!("telegram message sent");
            true
        } else {
            tracing::warn!(%status, response = %body, "telegram API rejected message");
            false
        }
    }
}

/// Prints the message to stdout. Used when no credentials are configured.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, text: &str) -> bool {
        tracing::warn!(
            "telegram credentials not set (TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID); message not sent"
        );
        println!("Message that would have been sent:");
        println!("{}", "=".repeat(50));
        println!("{}", text);
        println!("{}", "=".repeat(50));
        false
    }
}

/// Pick the notifier for the resolved credentials.
pub fn build_notifier(
    config: &TelegramConfig,
    credentials: Option<TelegramCredentials>,
    client: reqwest::Client,
) -> Box<dyn Notifier> {
    match credentials {
        Some(creds) => Box::new(TelegramNotifier::new(config, creds, client)),
        None => Box::new(ConsoleNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> TelegramCredentials {
        TelegramCredentials {
            bot_token: "123:abc".into(),
            chat_id: "42".into(),
        }
    }

    #[test]
    fn endpoint_and_payload_follow_config() {
        let cfg = TelegramConfig {
            api_base: "http://127.0.0.1:9/".into(),
            disable_web_page_preview: true,
            ..Default::default()
        };
        let n = TelegramNotifier::new(&cfg, creds(), reqwest::Client::new());
        assert_eq!(n.endpoint(), "http://127.0.0.1:9/bot123:abc/sendMessage");
        let p = n.payload("hello");
        assert_eq!(p["chat_id"], "42");
        assert_eq!(p["parse_mode"], "Markdown");
        assert_eq!(p["disable_web_page_preview"], true);
    }

    #[test]
    fn missing_credentials_pick_console() {
        let n = build_notifier(&TelegramConfig::default(), None, reqwest::Client::new());
        assert_eq!(n.name(), "console");
        let n = build_notifier(&TelegramConfig::default(), Some(creds()), reqwest::Client::new());
        assert_eq!(n.name(), "telegram");
    }

    #[tokio::test]
    async fn console_reports_not_delivered() {
        assert!(!ConsoleNotifier.deliver("hi").await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_not_delivered() {
        let cfg = TelegramConfig {
            // Port 9 (discard) is closed on test hosts.
            api_base: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let n = TelegramNotifier::new(&cfg, creds(), reqwest::Client::new());
        assert!(!n.deliver("hello").await);
    }
}
