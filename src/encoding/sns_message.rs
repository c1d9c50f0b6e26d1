use serde::{Deserialize, Serialize};

pub const NOTIFICATION: &str = "Notification";
pub const SUBSCRIPTION_CONFIRMATION: &str = "SubscriptionConfirmation";
pub const UNSUBSCRIBE_CONFIRMATION: &str = "UnsubscribeConfirmation";

/// JSON document SNS delivers to HTTP subscribers, and the body an SQS queue
/// receives when it is subscribed to a topic without raw message delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsMessage {
    #[serde(rename = "Type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, rename = "SubscribeURL", skip_serializing_if = "Option::is_none")]
    pub subscribe_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl SnsMessage {
    pub fn is_notification(&self) -> bool {
        self.kind == NOTIFICATION
    }

    /// Returns the inner message when `body` is an SNS notification envelope.
    pub fn unwrap_notification(body: &str) -> Option<String> {
        serde_json::from_str::<SnsMessage>(body)
            .ok()
            .filter(SnsMessage::is_notification)
            .map(|m| m.message)
    }
}
