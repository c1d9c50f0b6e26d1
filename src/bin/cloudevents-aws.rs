// Demo entry point: sends a sample event to, or receives events from, the
// transport configured through CE_* environment variables.

use anyhow::{Context, bail};
use chrono::Utc;
use cloudevents_aws::core::config::{AppConfig, TransportKind};
use cloudevents_aws::transport::receiver_fn;
use cloudevents_aws::{Event, EventBridgeTransport, SnsTransport, SqsTransport, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

async fn build_transport(config: &AppConfig) -> anyhow::Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.transport {
        TransportKind::Sqs => Box::new(
            SqsTransport::builder(&config.destination)
                .encoding(config.encoding)
                .build()
                .await?,
        ),
        TransportKind::Sns => {
            let mut builder = SnsTransport::builder(&config.destination).encoding(config.encoding);
            if let Some(port) = config.port {
                builder = builder.port(port);
            }
            if let Some(path) = &config.path {
                builder = builder.path(path);
            }
            Box::new(builder.build().await?)
        }
        TransportKind::EventBridge => Box::new(
            EventBridgeTransport::builder(&config.destination)
                .encoding(config.encoding)
                .build()
                .await?,
        ),
    };
    Ok(transport)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cloudevents_aws::setup_logging();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        e
    })?;
    let mut transport = build_transport(&config).await?;

    match std::env::args().nth(1).as_deref() {
        None | Some("send") => {
            let event = Event::builder()
                .id(Uuid::new_v4().to_string())
                .ty("com.cloudevents.readme.sent")
                .source("cloudevents-aws")
                .time(Utc::now())
                .data(serde_json::json!({ "message": "hello world" }))
                .build()
                .map_err(anyhow::Error::msg)?;
            transport
                .send(&event)
                .await
                .with_context(|| format!("sending via {}", transport.name()))?;
            info!(event_id = %event.id(), transport = transport.name(), "event sent");
        }
        Some("receive") => {
            transport.set_receiver(receiver_fn(|event| async move {
                info!(
                    event_id = %event.id(),
                    event_type = %event.ty(),
                    source = %event.source(),
                    "event received"
                );
                anyhow::Ok(())
            }));

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Received shutdown signal");
                on_signal.cancel();
            });

            transport.start_receiver(cancel).await?;
        }
        Some(other) => bail!("unknown command {other:?}, expected `send` or `receive`"),
    }

    Ok(())
}
