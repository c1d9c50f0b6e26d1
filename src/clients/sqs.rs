use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use aws_sdk_sqs::error::DisplayErrorContext;
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::transport::sqs::TRANSPORT_NAME;

/// One message returned by a receive call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
    pub body: Option<String>,
}

/// Long-poll parameters of a receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveParams {
    pub max_messages: i32,
    pub wait_time_seconds: i32,
    pub visibility_timeout_seconds: i32,
}

impl Default for ReceiveParams {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_seconds: 20,
            visibility_timeout_seconds: 20,
        }
    }
}

#[async_trait]
pub trait SqsApi: Send + Sync {
    async fn send_message(&self, queue_url: &str, body: String) -> Result<()>;
    async fn receive_messages(
        &self,
        queue_url: &str,
        params: ReceiveParams,
    ) -> Result<Vec<QueueMessage>>;
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AwsSqs {
    inner: SqsClient,
}

impl AwsSqs {
    pub fn new(inner: SqsClient) -> Self {
        Self { inner }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(SqsClient::new(config))
    }
}

#[async_trait]
impl SqsApi for AwsSqs {
    #[instrument(level = "debug", skip(self, body))]
    async fn send_message(&self, queue_url: &str, body: String) -> Result<()> {
        self.inner
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                Error::backend(TRANSPORT_NAME, "SendMessage", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn receive_messages(
        &self,
        queue_url: &str,
        params: ReceiveParams,
    ) -> Result<Vec<QueueMessage>> {
        let resp = self
            .inner
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(params.max_messages)
            .wait_time_seconds(params.wait_time_seconds)
            .visibility_timeout(params.visibility_timeout_seconds)
            .send()
            .await
            .map_err(|e| {
                Error::backend(TRANSPORT_NAME, "ReceiveMessage", DisplayErrorContext(&e).to_string())
            })?;

        Ok(resp
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| QueueMessage {
                message_id: m.message_id,
                receipt_handle: m.receipt_handle,
                body: m.body,
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.inner
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                Error::backend(TRANSPORT_NAME, "DeleteMessage", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }
}
