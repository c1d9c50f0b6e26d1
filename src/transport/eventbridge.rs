//! EventBridge bus transport. Send-only.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{Receiver, Transport, require_destination};
use crate::clients::eventbridge::{AwsEventBridge, BusEntry, EventBridgeApi};
use crate::clients::load_aws_config;
use crate::core::event::Event;
use crate::encoding::{Codec, CodecCell, Encoding};
use crate::errors::{Error, Result};

pub const TRANSPORT_NAME: &str = "AWS EventBridge";

pub struct EventBridgeTransport {
    client: Arc<dyn EventBridgeApi>,
    bus_name: String,
    codec: CodecCell,
    receiver: Option<Arc<dyn Receiver>>,
}

impl std::fmt::Debug for EventBridgeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridgeTransport")
            .field("bus_name", &self.bus_name)
            .field("encoding", &self.codec.encoding())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct EventBridgeTransportBuilder {
    bus_arn: String,
    encoding: Encoding,
}

impl EventBridgeTransportBuilder {
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if the bus ARN is empty.
    pub async fn build(self) -> Result<EventBridgeTransport> {
        let bus_name = self.bus_name()?;
        let config = load_aws_config().await;
        Ok(self.finish(Arc::new(AwsEventBridge::from_conf(&config)), bus_name))
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if the bus ARN is empty.
    pub fn build_with_client(self, client: Arc<dyn EventBridgeApi>) -> Result<EventBridgeTransport> {
        let bus_name = self.bus_name()?;
        Ok(self.finish(client, bus_name))
    }

    fn bus_name(&self) -> Result<String> {
        let arn = require_destination(&self.bus_arn, "event bus ARN")?;
        bus_name_from_arn(&arn)
    }

    fn finish(self, client: Arc<dyn EventBridgeApi>, bus_name: String) -> EventBridgeTransport {
        EventBridgeTransport {
            client,
            bus_name,
            codec: CodecCell::new(self.encoding, TRANSPORT_NAME),
            receiver: None,
        }
    }
}

/// `arn:aws:events:eu-central-1:123:event-bus/orders` names the bus `orders`.
/// A bare bus name is returned unchanged.
fn bus_name_from_arn(arn: &str) -> Result<String> {
    match arn.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(Error::InvalidOption(format!(
            "event bus ARN has no bus name: {arn:?}"
        ))),
    }
}

impl EventBridgeTransport {
    pub fn builder(bus_arn: impl Into<String>) -> EventBridgeTransportBuilder {
        EventBridgeTransportBuilder {
            bus_arn: bus_arn.into(),
            encoding: Encoding::Default,
        }
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    /// # Errors
    ///
    /// Returns `Error::UnsupportedEncoding` if the encoding has no codec.
    pub fn codec(&self) -> Result<Arc<dyn Codec>> {
        self.codec.get()
    }
}

#[async_trait]
impl Transport for EventBridgeTransport {
    fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    #[instrument(level = "debug", skip_all, fields(bus = %self.bus_name, event_id = %event.id))]
    async fn send(&self, event: &Event) -> Result<()> {
        let codec = self.codec.get()?;
        let detail = codec.encode(event)?.into_text()?;
        self.client
            .put_event(BusEntry {
                event_bus_name: self.bus_name.clone(),
                detail,
                detail_type: event.ty.clone(),
                source: event.source.clone(),
                time: event.time,
            })
            .await
    }

    fn set_receiver(&mut self, receiver: Arc<dyn Receiver>) {
        self.receiver = Some(receiver);
    }

    fn has_receiver(&self) -> bool {
        self.receiver.is_some()
    }

    async fn start_receiver(&self, _cancel: CancellationToken) -> Result<()> {
        Err(Error::ReceiveUnsupported(TRANSPORT_NAME))
    }
}
