/// cloudevents-aws - CloudEvents transports for SQS, SNS and EventBridge.
///
/// Each transport implements the same [`transport::Transport`] contract, so a
/// producer or consumer can move between backends without touching its event
/// handling:
/// - [`SqsTransport`] sends to a queue and long-polls it, deleting messages once
///   the receiver accepted them
/// - [`SnsTransport`] publishes to a topic and receives pushed notifications over HTTP
/// - [`EventBridgeTransport`] puts events on a bus and cannot receive
///
/// # Example
///
/// ```no_run
/// use cloudevents_aws::{Event, SqsTransport, Transport};
/// use cloudevents_aws::transport::receiver_fn;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     cloudevents_aws::setup_logging();
///
///     let mut transport =
///         SqsTransport::builder("https://sqs.eu-central-1.amazonaws.com/123456789012/events")
///             .build()
///             .await?;
///
///     let event = Event::builder()
///         .id("order-1")
///         .ty("com.example.order.created")
///         .source("/orders")
///         .data(serde_json::json!({"total": 42}))
///         .build()?;
///     transport.send(&event).await?;
///
///     transport.set_receiver(receiver_fn(|event| async move {
///         println!("received {}", event.id());
///         anyhow::Ok(())
///     }));
///     transport.start_receiver(CancellationToken::new()).await?;
///     Ok(())
/// }
/// ```
pub mod clients;
pub mod core;
pub mod encoding;
pub mod errors;
pub mod transport;

pub use crate::core::event::{Data, Event, SpecVersion};
pub use encoding::Encoding;
pub use errors::{Error, Result};
pub use transport::{EventBridgeTransport, Receiver, SnsTransport, SqsTransport, Transport};

/// Configure structured JSON logging.
///
/// Safe to call more than once; only the first call installs the subscriber.
///
/// # Example
///
/// ```
/// cloudevents_aws::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
