//! SQS queue transport.
//!
//! Sending puts one structured event per message. Receiving long-polls the
//! queue and deletes a message only after the receiver accepted its event, so
//! delivery is at-least-once: a message that fails to decode or that the
//! receiver rejects becomes visible again once its visibility timeout expires.
//!
//! Queues subscribed to an SNS topic receive the topic's notification envelope
//! rather than the event itself; such bodies are unwrapped before decoding.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{Receiver, Transport, require_destination, require_receiver};
use crate::clients::sqs::{AwsSqs, QueueMessage, ReceiveParams, SqsApi};
use crate::clients::load_aws_config;
use crate::core::event::Event;
use crate::encoding::{Codec, CodecCell, Encoding, Message, SnsMessage};
use crate::errors::{Error, Result};

pub const TRANSPORT_NAME: &str = "AWS SQS";

const MAX_BATCH: i32 = 10;
const MAX_WAIT_SECONDS: i32 = 20;
const MAX_VISIBILITY_SECONDS: i32 = 43_200;

pub struct SqsTransport {
    client: Arc<dyn SqsApi>,
    queue_url: String,
    params: ReceiveParams,
    codec: CodecCell,
    receiver: Option<Arc<dyn Receiver>>,
}

impl std::fmt::Debug for SqsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsTransport")
            .field("queue_url", &self.queue_url)
            .field("params", &self.params)
            .field("encoding", &self.codec.encoding())
            .field("has_receiver", &self.receiver.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SqsTransportBuilder {
    queue_url: String,
    encoding: Encoding,
    max_messages: i32,
    wait_time_seconds: i32,
    visibility_timeout_seconds: i32,
}

impl SqsTransportBuilder {
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Messages requested per receive call, 1 to 10.
    pub fn max_messages(mut self, max: i32) -> Self {
        self.max_messages = max;
        self
    }

    /// Long-poll wait, 0 to 20 seconds.
    pub fn wait_time_seconds(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    /// How long a received message stays hidden before it can be redelivered.
    pub fn visibility_timeout_seconds(mut self, seconds: i32) -> Self {
        self.visibility_timeout_seconds = seconds;
        self
    }

    /// Builds the transport with an SQS client from the ambient AWS configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if any option is out of range.
    pub async fn build(self) -> Result<SqsTransport> {
        let params = self.validate()?;
        let config = load_aws_config().await;
        Ok(self.finish(Arc::new(AwsSqs::from_conf(&config)), params))
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if any option is out of range.
    pub fn build_with_client(self, client: Arc<dyn SqsApi>) -> Result<SqsTransport> {
        let params = self.validate()?;
        Ok(self.finish(client, params))
    }

    fn validate(&self) -> Result<ReceiveParams> {
        require_destination(&self.queue_url, "queue URL")?;
        if !(1..=MAX_BATCH).contains(&self.max_messages) {
            return Err(Error::InvalidOption(format!(
                "max messages must be between 1 and {MAX_BATCH}: {}",
                self.max_messages
            )));
        }
        if !(0..=MAX_WAIT_SECONDS).contains(&self.wait_time_seconds) {
            return Err(Error::InvalidOption(format!(
                "wait time must be between 0 and {MAX_WAIT_SECONDS} seconds: {}",
                self.wait_time_seconds
            )));
        }
        if !(0..=MAX_VISIBILITY_SECONDS).contains(&self.visibility_timeout_seconds) {
            return Err(Error::InvalidOption(format!(
                "visibility timeout must be between 0 and {MAX_VISIBILITY_SECONDS} seconds: {}",
                self.visibility_timeout_seconds
            )));
        }
        Ok(ReceiveParams {
            max_messages: self.max_messages,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout_seconds: self.visibility_timeout_seconds,
        })
    }

    fn finish(self, client: Arc<dyn SqsApi>, params: ReceiveParams) -> SqsTransport {
        SqsTransport {
            client,
            queue_url: self.queue_url.trim().to_string(),
            params,
            codec: CodecCell::new(self.encoding, TRANSPORT_NAME),
            receiver: None,
        }
    }
}

impl SqsTransport {
    pub fn builder(queue_url: impl Into<String>) -> SqsTransportBuilder {
        let defaults = ReceiveParams::default();
        SqsTransportBuilder {
            queue_url: queue_url.into(),
            encoding: Encoding::Default,
            max_messages: defaults.max_messages,
            wait_time_seconds: defaults.wait_time_seconds,
            visibility_timeout_seconds: defaults.visibility_timeout_seconds,
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn receive_params(&self) -> ReceiveParams {
        self.params
    }

    /// The codec selected for the configured encoding.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedEncoding` if the encoding has no codec.
    pub fn codec(&self) -> Result<Arc<dyn Codec>> {
        self.codec.get()
    }

    /// Runs one receive call and processes every returned message.
    ///
    /// # Errors
    ///
    /// Only a failed receive call is an error; per-message failures are logged.
    pub async fn poll_once(&self, codec: &dyn Codec, receiver: &dyn Receiver) -> Result<usize> {
        let messages = self
            .client
            .receive_messages(&self.queue_url, self.params)
            .await?;
        Ok(self.process_batch(codec, receiver, messages).await)
    }

    async fn process_batch(
        &self,
        codec: &dyn Codec,
        receiver: &dyn Receiver,
        messages: Vec<QueueMessage>,
    ) -> usize {
        let count = messages.len();
        for message in messages {
            self.process(codec, receiver, message).await;
        }
        count
    }

    #[instrument(level = "debug", skip_all, fields(message_id = message.message_id.as_deref().unwrap_or("")))]
    async fn process(&self, codec: &dyn Codec, receiver: &dyn Receiver, message: QueueMessage) {
        let Some(body) = message.body.filter(|b| !b.is_empty()) else {
            debug!("Skipping message without body");
            return;
        };

        // Queues subscribed to a topic receive the notification envelope.
        let body = SnsMessage::unwrap_notification(&body).unwrap_or(body);

        let event = match codec.decode(&Message::from(body)) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "failed to decode message");
                return;
            }
        };
        let event_id = event.id.clone();

        if let Err(e) = receiver.receive(event).await {
            warn!(event_id = %event_id, error = %e, "sqs receiver returned error");
            return;
        }

        let Some(receipt_handle) = message.receipt_handle else {
            warn!(event_id = %event_id, "message has no receipt handle, cannot delete");
            return;
        };
        if let Err(e) = self
            .client
            .delete_message(&self.queue_url, &receipt_handle)
            .await
        {
            warn!(event_id = %event_id, error = %e, "failed to delete processed message");
        }
    }
}

#[async_trait]
impl Transport for SqsTransport {
    fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    #[instrument(level = "debug", skip_all, fields(queue_url = %self.queue_url, event_id = %event.id))]
    async fn send(&self, event: &Event) -> Result<()> {
        let codec = self.codec.get()?;
        let body = codec.encode(event)?.into_text()?;
        self.client.send_message(&self.queue_url, body).await
    }

    fn set_receiver(&mut self, receiver: Arc<dyn Receiver>) {
        self.receiver = Some(receiver);
    }

    fn has_receiver(&self) -> bool {
        self.receiver.is_some()
    }

    /// Polls until `cancel` fires. A failed receive call ends the loop and is
    /// returned; retrying is left to the caller.
    ///
    /// Cancellation interrupts a pending long poll but never a batch in
    /// progress: every received message is handed to the receiver (and
    /// deleted on success) before the token is checked again.
    async fn start_receiver(&self, cancel: CancellationToken) -> Result<()> {
        let codec = self.codec.get()?;
        let receiver = require_receiver(self.receiver.as_ref(), TRANSPORT_NAME)?;

        info!(queue_url = %self.queue_url, "starting receiver");
        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(queue_url = %self.queue_url, "receiver cancelled");
                    return Ok(());
                }
                received = self.client.receive_messages(&self.queue_url, self.params) => received,
            };
            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    error!(queue_url = %self.queue_url, error = %e, "receive failed, stopping receiver");
                    return Err(e);
                }
            };
            self.process_batch(codec.as_ref(), receiver.as_ref(), messages)
                .await;
        }
    }
}
