#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cloudevents_aws::clients::{BusEntry, EventBridgeApi, QueueMessage, ReceiveParams, SnsApi, SqsApi};
use cloudevents_aws::encoding::{Codec, StructuredCodec};
use cloudevents_aws::{Error, Event, Receiver, Result};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub fn sample_event(id: &str) -> Event {
    Event::builder()
        .id(id)
        .ty("com.cloudevents.readme.sent")
        .source("test")
        .time(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap())
        .data(serde_json::json!({ "message": format!("hello world {id}") }))
        .build()
        .unwrap()
}

/// Structured 1.0 JSON for `event`, as a queue or topic body.
pub fn encoded(event: &Event) -> String {
    let message = StructuredCodec::new(None, "test").encode(event).unwrap();
    String::from_utf8(message.body).unwrap()
}

pub fn sns_envelope(inner: &str) -> String {
    serde_json::json!({
        "Type": "Notification",
        "MessageId": "22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324",
        "TopicArn": "arn:aws:sns:eu-central-1:458470902217:test",
        "Message": inner,
        "Timestamp": "2020-01-02T03:04:05.000Z",
    })
    .to_string()
}

pub fn queue_message(receipt: &str, body: &str) -> QueueMessage {
    QueueMessage {
        message_id: Some(format!("msg-{receipt}")),
        receipt_handle: Some(receipt.to_string()),
        body: Some(body.to_string()),
    }
}

/// Queue double that serves scripted batches and cancels the receiver once
/// they run out.
pub struct MockSqs {
    batches: Mutex<VecDeque<Result<Vec<QueueMessage>>>>,
    cancel_when_drained: CancellationToken,
    pub fail_deletes: bool,
    pub sent: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub receive_params: Mutex<Vec<ReceiveParams>>,
    pub receive_calls: AtomicUsize,
}

impl MockSqs {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            cancel_when_drained: cancel,
            fail_deletes: false,
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            receive_params: Mutex::new(Vec::new()),
            receive_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_batches(self, batches: Vec<Result<Vec<QueueMessage>>>) -> Self {
        *self.batches.lock().unwrap() = batches.into();
        self
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqsApi for MockSqs {
    async fn send_message(&self, queue_url: &str, body: String) -> Result<()> {
        self.sent.lock().unwrap().push((queue_url.to_string(), body));
        Ok(())
    }

    async fn receive_messages(
        &self,
        _queue_url: &str,
        params: ReceiveParams,
    ) -> Result<Vec<QueueMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        self.receive_params.lock().unwrap().push(params);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                self.cancel_when_drained.cancel();
                Ok(Vec::new())
            }
        }
    }

    async fn delete_message(&self, _queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        if self.fail_deletes {
            return Err(Error::Backend {
                transport: "AWS SQS",
                operation: "DeleteMessage",
                message: "ReceiptHandleIsInvalid".to_string(),
            });
        }
        Ok(())
    }
}

/// Queue double whose long poll never returns.
pub struct HangingSqs;

#[async_trait]
impl SqsApi for HangingSqs {
    async fn send_message(&self, _: &str, _: String) -> Result<()> {
        Ok(())
    }

    async fn receive_messages(&self, _: &str, _: ReceiveParams) -> Result<Vec<QueueMessage>> {
        std::future::pending().await
    }

    async fn delete_message(&self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSns {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SnsApi for MockSns {
    async fn publish(&self, topic_arn: &str, message: String) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((topic_arn.to_string(), message));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockEventBridge {
    pub entries: Mutex<Vec<BusEntry>>,
    pub reject_with: Option<String>,
}

#[async_trait]
impl EventBridgeApi for MockEventBridge {
    async fn put_event(&self, entry: BusEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        match &self.reject_with {
            Some(reason) => Err(Error::Backend {
                transport: "AWS EventBridge",
                operation: "PutEvents",
                message: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Receiver that records every event and optionally rejects them.
#[derive(Default)]
pub struct RecordingReceiver {
    pub events: Mutex<Vec<Event>>,
    pub reject: bool,
}

impl RecordingReceiver {
    pub fn rejecting() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.id().to_string())
            .collect()
    }
}

#[async_trait]
impl Receiver for RecordingReceiver {
    async fn receive(&self, event: Event) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        if self.reject {
            anyhow::bail!("receiver rejected event");
        }
        Ok(())
    }
}

/// Receiver that takes `delay` to handle each event. `started` is notified
/// when handling begins; `finished()` reports whether it ran to the end.
pub struct SlowReceiver {
    delay: Duration,
    pub started: Notify,
    finished: AtomicBool,
    pub events: Mutex<Vec<Event>>,
}

impl SlowReceiver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Notify::new(),
            finished: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Receiver for SlowReceiver {
    async fn receive(&self, event: Event) -> anyhow::Result<()> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.events.lock().unwrap().push(event);
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}
