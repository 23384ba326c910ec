use crate::dto::TelegramMessage;
use crate::notifier::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECS: u64 = 2;

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .field("api_base", &"<redacted>")
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(client: Client, bot_token: &str, chat_id: String) -> Self {
        Self {
            client,
            api_base: format!("https://api.telegram.org/bot{}", bot_token),
            chat_id,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: String) {
        let payload = TelegramMessage {
            chat_id: self.chat_id.to_owned(),
            text: message,
            disable_web_page_preview: true,
        };
        for attempt in 0..MAX_RETRIES {
            match self
                .client
                .post(format!("{}/sendMessage", self.api_base))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => warn!(
                    "Telegram send attempt {}/{} failed: {}",
                    attempt + 1,
                    MAX_RETRIES,
                    resp.status()
                ),
                Err(e) => warn!(
                    "Telegram send attempt {}/{} failed: {:?}",
                    attempt + 1,
                    MAX_RETRIES,
                    e
                ),
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECS * (attempt as u64 + 1)))
                    .await;
            }
        }
        warn!(
            "Failed to send Telegram message after {} attempts",
            MAX_RETRIES
        );
    }
}
