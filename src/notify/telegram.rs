use crate::config::TelegramSettings;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Fire-and-forget Telegram messages.
///
/// Without both a bot token and a chat id every send is a no-op.
pub struct TelegramNotifier {
    client: Client,
    credentials: Option<(String, String)>,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(settings: &TelegramSettings) -> Self {
        Self::with_base_url(settings, TELEGRAM_API_BASE)
    }

    pub fn with_base_url(settings: &TelegramSettings, base_url: &str) -> Self {
        let credentials = match (&settings.bot_token, &settings.chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Some((token.clone(), chat.clone()))
            }
            _ => None,
        };

        Self {
            client: Client::new(),
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send `text`; failures are logged and swallowed.
    pub async fn send(&self, text: &str) {
        let Some((token, chat_id)) = &self.credentials else {
            return;
        };

        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let result = self
            .client
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => debug!("Telegram notification sent"),
            // reqwest errors include the URL, which carries the bot token.
            Err(e) => warn!(error = %e.without_url(), "Failed to send Telegram notification"),
        }
    }
}
