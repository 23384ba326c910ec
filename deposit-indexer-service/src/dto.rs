use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(crate = "serde")]
pub struct SlackNotificationData {
    pub channel: String,
    pub text: String,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(crate = "serde")]
pub struct TelegramMessage {
    pub chat_id: String,
    pub text: String,
    pub disable_web_page_preview: bool,
}
