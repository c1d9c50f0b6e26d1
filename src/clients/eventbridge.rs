use async_trait::async_trait;
use aws_sdk_eventbridge::Client as EventBridgeClient;
use aws_sdk_eventbridge::error::DisplayErrorContext;
use aws_sdk_eventbridge::primitives::DateTime as AwsDateTime;
use aws_sdk_eventbridge::types::PutEventsRequestEntry;
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::transport::eventbridge::TRANSPORT_NAME;

/// One `PutEvents` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEntry {
    pub event_bus_name: String,
    pub detail: String,
    pub detail_type: String,
    pub source: String,
    pub time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait EventBridgeApi: Send + Sync {
    async fn put_event(&self, entry: BusEntry) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AwsEventBridge {
    inner: EventBridgeClient,
}

impl AwsEventBridge {
    pub fn new(inner: EventBridgeClient) -> Self {
        Self { inner }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(EventBridgeClient::new(config))
    }
}

#[async_trait]
impl EventBridgeApi for AwsEventBridge {
    #[instrument(level = "debug", skip(self, entry), fields(bus = %entry.event_bus_name))]
    async fn put_event(&self, entry: BusEntry) -> Result<()> {
        let request = PutEventsRequestEntry::builder()
            .event_bus_name(entry.event_bus_name)
            .detail(entry.detail)
            .detail_type(entry.detail_type)
            .source(entry.source)
            .set_time(entry.time.map(|t| AwsDateTime::from_millis(t.timestamp_millis())))
            .build();

        let resp = self
            .inner
            .put_events()
            .entries(request)
            .send()
            .await
            .map_err(|e| {
                Error::backend(TRANSPORT_NAME, "PutEvents", DisplayErrorContext(&e).to_string())
            })?;

        // PutEvents succeeds at the HTTP level even when individual entries are rejected.
        if let Some(rejected) = resp.entries().iter().find(|e| e.error_code().is_some()) {
            let reason = format!(
                "{}: {}",
                rejected.error_code().unwrap_or_default(),
                rejected.error_message().unwrap_or("no message")
            );
            return Err(Error::backend(TRANSPORT_NAME, "PutEvents", reason));
        }
        Ok(())
    }
}
