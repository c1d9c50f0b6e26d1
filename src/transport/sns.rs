//! SNS topic transport.
//!
//! Sending publishes one structured event per message. Receiving runs an HTTP
//! endpoint that an SNS HTTP(S) subscription pushes to.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::{Receiver, Transport, require_destination, require_receiver};
use crate::clients::load_aws_config;
use crate::clients::sns::{AwsSns, SnsApi};
use crate::core::event::Event;
use crate::encoding::sns_message::{
    NOTIFICATION, SUBSCRIPTION_CONFIRMATION, UNSUBSCRIBE_CONFIRMATION,
};
use crate::encoding::{Codec, CodecCell, Encoding, Message, SnsMessage};
use crate::errors::{Error, Result};

pub const TRANSPORT_NAME: &str = "AWS SNS";

/// Timeout given to the HTTP server to drain connections once receiving is cancelled.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PATH: &str = "/";

pub struct SnsTransport {
    client: Arc<dyn SnsApi>,
    topic_arn: String,
    port: u16,
    path: String,
    shutdown_timeout: Duration,
    confirm_subscriptions: bool,
    codec: CodecCell,
    receiver: Option<Arc<dyn Receiver>>,
    http: reqwest::Client,
}

impl std::fmt::Debug for SnsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnsTransport")
            .field("topic_arn", &self.topic_arn)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("encoding", &self.codec.encoding())
            .field("has_receiver", &self.receiver.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SnsTransportBuilder {
    topic_arn: String,
    encoding: Encoding,
    port: Option<i64>,
    path: Option<String>,
    shutdown_timeout: Option<Duration>,
    confirm_subscriptions: bool,
}

impl SnsTransportBuilder {
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Port the receiver binds to. Defaults to 8080.
    pub fn port(mut self, port: i64) -> Self {
        self.port = Some(port);
        self
    }

    /// Path the receiver accepts notifications on. Defaults to "/".
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Whether subscription confirmations are confirmed by fetching their
    /// `SubscribeURL`. Enabled by default.
    pub fn confirm_subscriptions(mut self, confirm: bool) -> Self {
        self.confirm_subscriptions = confirm;
        self
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if any option is invalid.
    pub async fn build(self) -> Result<SnsTransport> {
        let validated = self.validate()?;
        let config = load_aws_config().await;
        Ok(self.finish(Arc::new(AwsSns::from_conf(&config)), validated))
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if any option is invalid.
    pub fn build_with_client(self, client: Arc<dyn SnsApi>) -> Result<SnsTransport> {
        let validated = self.validate()?;
        Ok(self.finish(client, validated))
    }

    fn validate(&self) -> Result<(String, u16, String, Duration)> {
        let topic_arn = require_destination(&self.topic_arn, "topic ARN")?;

        let port = match self.port {
            None => DEFAULT_PORT,
            Some(port) => u16::try_from(port).map_err(|_| {
                Error::InvalidOption(format!("http port option was given an invalid port: {port}"))
            })?,
        };

        let path = match &self.path {
            None => DEFAULT_PATH.to_string(),
            Some(path) => {
                let trimmed = path.trim();
                if trimmed.is_empty() {
                    return Err(Error::InvalidOption(format!(
                        "http path option was given an invalid path: {path:?}"
                    )));
                }
                if trimmed.starts_with('/') {
                    trimmed.to_string()
                } else {
                    format!("/{trimmed}")
                }
            }
        };

        let shutdown_timeout = self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        if shutdown_timeout.is_zero() {
            return Err(Error::InvalidOption(
                "http shutdown timeout must be greater than zero".to_string(),
            ));
        }

        Ok((topic_arn, port, path, shutdown_timeout))
    }

    fn finish(
        self,
        client: Arc<dyn SnsApi>,
        (topic_arn, port, path, shutdown_timeout): (String, u16, String, Duration),
    ) -> SnsTransport {
        SnsTransport {
            client,
            topic_arn,
            port,
            path,
            shutdown_timeout,
            confirm_subscriptions: self.confirm_subscriptions,
            codec: CodecCell::new(self.encoding, TRANSPORT_NAME),
            receiver: None,
            http: reqwest::Client::new(),
        }
    }
}

impl SnsTransport {
    pub fn builder(topic_arn: impl Into<String>) -> SnsTransportBuilder {
        SnsTransportBuilder {
            topic_arn: topic_arn.into(),
            encoding: Encoding::Default,
            port: None,
            path: None,
            shutdown_timeout: None,
            confirm_subscriptions: true,
        }
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// # Errors
    ///
    /// Returns `Error::UnsupportedEncoding` if the encoding has no codec.
    pub fn codec(&self) -> Result<Arc<dyn Codec>> {
        self.codec.get()
    }

    /// The notification endpoint mounted at the configured path, for serving
    /// from an existing axum application.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot be loaded or no receiver is set.
    pub fn router(&self) -> Result<Router> {
        let endpoint = Arc::new(Endpoint {
            codec: self.codec.get()?,
            receiver: require_receiver(self.receiver.as_ref(), TRANSPORT_NAME)?,
            http: self.http.clone(),
            confirm_subscriptions: self.confirm_subscriptions,
        });
        Ok(Router::new()
            .route(&self.path, post(handle_sns_message))
            .with_state(endpoint))
    }

    /// Serves the notification endpoint on `listener` until `cancel` fires,
    /// then shuts down gracefully within the shutdown timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be built, the server fails, or
    /// shutdown does not complete in time.
    pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let router = self.router()?;
        let addr = listener.local_addr()?;
        info!(%addr, path = %self.path, "starting receiver");

        let shutdown = cancel.clone();
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            served = &mut server => return served.map_err(Error::from),
            () = cancel.cancelled() => {}
        }

        info!(%addr, timeout = ?self.shutdown_timeout, "shutting down receiver");
        match tokio::time::timeout(self.shutdown_timeout, server).await {
            Ok(served) => served.map_err(Error::from),
            Err(_) => {
                error!(%addr, "receiver shutdown timed out");
                Err(Error::ShutdownTimeout(self.shutdown_timeout))
            }
        }
    }
}

#[async_trait]
impl Transport for SnsTransport {
    fn name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    #[instrument(level = "debug", skip_all, fields(topic_arn = %self.topic_arn, event_id = %event.id))]
    async fn send(&self, event: &Event) -> Result<()> {
        let codec = self.codec.get()?;
        let body = codec.encode(event)?.into_text()?;
        self.client.publish(&self.topic_arn, body).await
    }

    fn set_receiver(&mut self, receiver: Arc<dyn Receiver>) {
        self.receiver = Some(receiver);
    }

    fn has_receiver(&self) -> bool {
        self.receiver.is_some()
    }

    async fn start_receiver(&self, cancel: CancellationToken) -> Result<()> {
        // Fail on configuration problems before binding the port.
        self.codec.get()?;
        require_receiver(self.receiver.as_ref(), TRANSPORT_NAME)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, cancel).await
    }
}

struct Endpoint {
    codec: Arc<dyn Codec>,
    receiver: Arc<dyn Receiver>,
    http: reqwest::Client,
    confirm_subscriptions: bool,
}

impl Endpoint {
    // Decode and receiver failures are logged; SNS still gets a 200.
    async fn notification(&self, message: SnsMessage) -> StatusCode {
        let event = match self.codec.decode(&Message::from(message.message)) {
            Ok(event) => event,
            Err(e) => {
                error!(message_id = ?message.message_id, error = %e, "failed to decode message");
                return StatusCode::OK;
            }
        };
        let event_id = event.id.clone();
        if let Err(e) = self.receiver.receive(event).await {
            warn!(event_id = %event_id, error = %e, "SNS receiver returned error");
        }
        StatusCode::OK
    }

    async fn confirm_subscription(&self, message: SnsMessage) -> StatusCode {
        if !self.confirm_subscriptions {
            info!(topic_arn = ?message.topic_arn, "subscription confirmation ignored");
            return StatusCode::OK;
        }
        let Some(url) = message.subscribe_url else {
            warn!("subscription confirmation without SubscribeURL");
            return StatusCode::BAD_REQUEST;
        };
        let confirmed = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);
        match confirmed {
            Ok(_) => {
                info!(topic_arn = ?message.topic_arn, "subscription confirmed");
                StatusCode::OK
            }
            Err(e) => {
                error!(topic_arn = ?message.topic_arn, error = %e, "failed to confirm subscription");
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

async fn handle_sns_message(State(endpoint): State<Arc<Endpoint>>, body: String) -> StatusCode {
    let message: SnsMessage = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "request body is not an SNS message");
            return StatusCode::BAD_REQUEST;
        }
    };

    match message.kind.as_str() {
        NOTIFICATION => endpoint.notification(message).await,
        SUBSCRIPTION_CONFIRMATION => endpoint.confirm_subscription(message).await,
        UNSUBSCRIBE_CONFIRMATION => {
            info!(topic_arn = ?message.topic_arn, "unsubscribed from topic");
            StatusCode::OK
        }
        other => {
            warn!(kind = other, "unknown SNS message type");
            StatusCode::BAD_REQUEST
        }
    }
}
