//! Backend capability traits and their AWS SDK implementations.
//!
//! Each transport talks to its backend only through one of these traits, so
//! the transports can be driven by in-memory doubles in tests.

pub mod eventbridge;
pub mod sns;
pub mod sqs;

pub use eventbridge::{AwsEventBridge, BusEntry, EventBridgeApi};
pub use sns::{AwsSns, SnsApi};
pub use sqs::{AwsSqs, QueueMessage, ReceiveParams, SqsApi};

/// Loads the shared AWS configuration from the standard environment chain.
pub async fn load_aws_config() -> aws_config::SdkConfig {
    aws_config::from_env().load().await
}
