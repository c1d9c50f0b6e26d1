//! The uniform send / start-receiving contract and the three AWS adapters.

pub mod eventbridge;
pub mod sns;
pub mod sqs;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::event::Event;
use crate::errors::{Error, Result};

pub use eventbridge::EventBridgeTransport;
pub use sns::SnsTransport;
pub use sqs::SqsTransport;

/// Callback invoked once per successfully decoded inbound event.
///
/// Returning an error means the event was not handled: queue messages are left
/// on the queue for redelivery.
#[async_trait]
pub trait Receiver: Send + Sync {
    async fn receive(&self, event: Event) -> anyhow::Result<()>;
}

pub struct FnReceiver<F>(F);

#[async_trait]
impl<F, Fut> Receiver for FnReceiver<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn receive(&self, event: Event) -> anyhow::Result<()> {
        (self.0)(event).await
    }
}

/// Wraps an async closure as a `Receiver`.
///
/// ```
/// use cloudevents_aws::transport::receiver_fn;
///
/// let receiver = receiver_fn(|event| async move {
///     println!("got {}", event.id());
///     anyhow::Ok(())
/// });
/// # drop(receiver);
/// ```
pub fn receiver_fn<F, Fut>(f: F) -> Arc<dyn Receiver>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnReceiver(f))
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Encodes `event` and hands it to the backend.
    async fn send(&self, event: &Event) -> Result<()>;

    fn set_receiver(&mut self, receiver: Arc<dyn Receiver>);

    fn has_receiver(&self) -> bool;

    /// Receives events until `cancel` fires. This future only completes on
    /// cancellation or on a fatal error.
    async fn start_receiver(&self, cancel: CancellationToken) -> Result<()>;
}

pub(crate) fn require_receiver(
    receiver: Option<&Arc<dyn Receiver>>,
    transport: &'static str,
) -> Result<Arc<dyn Receiver>> {
    receiver.cloned().ok_or(Error::NoReceiver(transport))
}

pub(crate) fn require_destination(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidOption(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}
