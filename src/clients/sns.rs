use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use aws_sdk_sns::error::DisplayErrorContext;
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::transport::sns::TRANSPORT_NAME;

#[async_trait]
pub trait SnsApi: Send + Sync {
    async fn publish(&self, topic_arn: &str, message: String) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AwsSns {
    inner: SnsClient,
}

impl AwsSns {
    pub fn new(inner: SnsClient) -> Self {
        Self { inner }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(SnsClient::new(config))
    }
}

#[async_trait]
impl SnsApi for AwsSns {
    #[instrument(level = "debug", skip(self, message))]
    async fn publish(&self, topic_arn: &str, message: String) -> Result<()> {
        self.inner
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| {
                Error::backend(TRANSPORT_NAME, "Publish", DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }
}
