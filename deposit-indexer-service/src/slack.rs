use crate::dto;
use crate::notifier::Notifier;
use async_trait::async_trait;
use tracing::{info, warn};

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    channel_id: String,
}

impl SlackNotifier {
    pub fn new(client: reqwest::Client, webhook_url: String, channel_id: String) -> Self {
        Self {
            client,
            webhook_url,
            channel_id,
        }
    }

    async fn send_to_slack(&self, text: String) -> Result<(), String> {
        let serialized_data = match serde_json::to_string(&dto::SlackNotificationData {
            channel: self.channel_id.to_owned(),
            text,
        }) {
            Ok(json) => json,
            Err(err) => return Err(format!("error in serializing data {}", err)),
        };
        let response = self
            .client
            .post(&self.webhook_url)
            .header("content-type", "application/json")
            .body(serialized_data)
            .send()
            .await;
        match response {
            Ok(resp) => match resp.status() {
                reqwest::StatusCode::OK => Ok(()),
                status => Err(format!("slack responded {}", status)),
            },
            Err(error) => Err(format!("slack request failed {}", error)),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: String) {
        match self.send_to_slack(message).await {
            Ok(()) => info!("Posted to slack channel {}", self.channel_id),
            Err(error) => warn!("Slack notification failed: {}", error),
        }
    }
}
