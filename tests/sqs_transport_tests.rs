mod common;

use std::sync::Arc;
use std::time::Duration;

use cloudevents_aws::clients::{QueueMessage, ReceiveParams};
use cloudevents_aws::encoding::Message;
use cloudevents_aws::{Encoding, Error, SqsTransport, Transport};
use common::{
    HangingSqs, MockSqs, RecordingReceiver, SlowReceiver, encoded, queue_message, sample_event, sns_envelope,
};
use tokio_util::sync::CancellationToken;

const QUEUE_URL: &str = "https://sqs.eu-central-1.amazonaws.com/458470902217/sqs-queue-test";

fn transport(client: Arc<MockSqs>, receiver: Arc<RecordingReceiver>) -> SqsTransport {
    let mut transport = SqsTransport::builder(QUEUE_URL)
        .build_with_client(client)
        .unwrap();
    transport.set_receiver(receiver);
    transport
}

async fn run(transport: &SqsTransport, cancel: CancellationToken) -> cloudevents_aws::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), transport.start_receiver(cancel))
        .await
        .expect("receiver did not stop")
}

#[tokio::test]
async fn test_send_encodes_event_onto_queue() {
    let client = Arc::new(MockSqs::new(CancellationToken::new()));
    let transport = SqsTransport::builder(QUEUE_URL)
        .encoding(Encoding::StructuredV1)
        .build_with_client(client.clone())
        .unwrap();

    transport.send(&sample_event("test123 0")).await.unwrap();

    let sent = client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, QUEUE_URL);
    let body: serde_json::Value = serde_json::from_str(&sent[0].1).unwrap();
    assert_eq!(body["specversion"], "1.0");
    assert_eq!(body["id"], "test123 0");
    assert_eq!(body["type"], "com.cloudevents.readme.sent");
    assert_eq!(body["data"]["message"], "hello world test123 0");
}

#[tokio::test]
async fn test_codec_is_selected_once_and_reused() {
    let client = Arc::new(MockSqs::new(CancellationToken::new()));
    let transport = SqsTransport::builder(QUEUE_URL)
        .encoding(Encoding::StructuredV03)
        .build_with_client(client.clone())
        .unwrap();

    let before = transport.codec().unwrap();
    transport.send(&sample_event("1")).await.unwrap();
    transport.send(&sample_event("2")).await.unwrap();
    let after = transport.codec().unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    for (_, body) in client.sent() {
        assert!(body.contains(r#""specversion":"0.3""#));
    }
}

#[tokio::test]
async fn test_unsupported_encoding_fails_before_backend() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()));
    let mut transport = SqsTransport::builder(QUEUE_URL)
        .encoding(Encoding::BinaryV1)
        .build_with_client(client.clone())
        .unwrap();
    transport.set_receiver(Arc::new(RecordingReceiver::default()));

    let err = transport.send(&sample_event("1")).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncoding(Encoding::BinaryV1)));
    assert_eq!(err.to_string(), "unknown encoding set on transport: binary-v1");

    let err = run(&transport, cancel).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncoding(_)));

    assert!(client.sent().is_empty());
    assert_eq!(client.receive_calls(), 0);
}

#[tokio::test]
async fn test_start_receiver_requires_receiver() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()));
    let transport = SqsTransport::builder(QUEUE_URL)
        .build_with_client(client.clone())
        .unwrap();

    assert!(!transport.has_receiver());
    let err = run(&transport, cancel).await.unwrap_err();
    assert!(matches!(err, Error::NoReceiver("AWS SQS")));
    assert_eq!(client.receive_calls(), 0);
}

#[tokio::test]
async fn test_notification_envelope_is_unwrapped_and_deleted_once() {
    let cancel = CancellationToken::new();
    let event = sample_event("from-topic");
    let client = Arc::new(
        MockSqs::new(cancel.clone()).with_batches(vec![Ok(vec![queue_message(
            "receipt-1",
            &sns_envelope(&encoded(&event)),
        )])]),
    );
    let receiver = Arc::new(RecordingReceiver::default());
    let transport = transport(client.clone(), receiver.clone());

    run(&transport, cancel).await.unwrap();

    assert_eq!(receiver.events.lock().unwrap().as_slice(), &[event]);
    assert_eq!(client.deleted(), vec!["receipt-1".to_string()]);
}

#[tokio::test]
async fn test_bare_message_is_decoded_directly() {
    let cancel = CancellationToken::new();
    let event = sample_event("bare");
    let client = Arc::new(
        MockSqs::new(cancel.clone())
            .with_batches(vec![Ok(vec![queue_message("receipt-2", &encoded(&event))])]),
    );
    let receiver = Arc::new(RecordingReceiver::default());
    let transport = transport(client.clone(), receiver.clone());

    run(&transport, cancel).await.unwrap();

    assert_eq!(receiver.ids(), vec!["bare".to_string()]);
    assert_eq!(client.deleted(), vec!["receipt-2".to_string()]);
}

#[tokio::test]
async fn test_rejected_event_is_not_deleted() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()).with_batches(vec![Ok(vec![
        queue_message("receipt-1", &encoded(&sample_event("1"))),
        queue_message("receipt-2", &encoded(&sample_event("2"))),
    ])]));
    let receiver = Arc::new(RecordingReceiver::rejecting());
    let transport = transport(client.clone(), receiver.clone());

    run(&transport, cancel).await.unwrap();

    assert_eq!(receiver.ids(), vec!["1".to_string(), "2".to_string()]);
    assert!(client.deleted().is_empty());
}

#[tokio::test]
async fn test_undecodable_message_is_skipped_and_loop_continues() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()).with_batches(vec![
        Ok(vec![
            queue_message("bad-json", "not an event"),
            queue_message("no-id", r#"{"specversion":"1.0","type":"t","source":"s"}"#),
        ]),
        Ok(vec![QueueMessage {
            body: None,
            ..queue_message("empty", "")
        }]),
        Ok(vec![queue_message("good", &encoded(&sample_event("good")))]),
    ]));
    let receiver = Arc::new(RecordingReceiver::default());
    let transport = transport(client.clone(), receiver.clone());

    run(&transport, cancel).await.unwrap();

    assert_eq!(receiver.ids(), vec!["good".to_string()]);
    assert_eq!(client.deleted(), vec!["good".to_string()]);
    assert_eq!(client.receive_calls(), 4);
}

#[tokio::test]
async fn test_receive_error_stops_the_loop() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()).with_batches(vec![
        Ok(vec![queue_message("receipt-1", &encoded(&sample_event("1")))]),
        Err(Error::Backend {
            transport: "AWS SQS",
            operation: "ReceiveMessage",
            message: "AWS.SimpleQueueService.NonExistentQueue".to_string(),
        }),
        Ok(vec![queue_message("receipt-2", &encoded(&sample_event("2")))]),
    ]));
    let receiver = Arc::new(RecordingReceiver::default());
    let transport = transport(client.clone(), receiver.clone());

    let err = run(&transport, cancel.clone()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "AWS SQS ReceiveMessage failed: AWS.SimpleQueueService.NonExistentQueue"
    );
    assert_eq!(receiver.ids(), vec!["1".to_string()]);
    assert_eq!(client.receive_calls(), 2);
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_failed_delete_does_not_stop_the_loop() {
    let cancel = CancellationToken::new();
    let mut mock = MockSqs::new(cancel.clone()).with_batches(vec![
        Ok(vec![queue_message("receipt-1", &encoded(&sample_event("1")))]),
        Ok(vec![queue_message("receipt-2", &encoded(&sample_event("2")))]),
    ]);
    mock.fail_deletes = true;
    let client = Arc::new(mock);
    let receiver = Arc::new(RecordingReceiver::default());
    let transport = transport(client.clone(), receiver.clone());

    run(&transport, cancel).await.unwrap();

    assert_eq!(receiver.ids(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(client.deleted().len(), 2);
}

#[tokio::test]
async fn test_receive_uses_long_poll_parameters() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()));
    let transport = transport(client.clone(), Arc::new(RecordingReceiver::default()));

    run(&transport, cancel).await.unwrap();

    let params = client.receive_params.lock().unwrap().clone();
    assert_eq!(
        params,
        vec![ReceiveParams {
            max_messages: 1,
            wait_time_seconds: 20,
            visibility_timeout_seconds: 20,
        }]
    );
}

#[tokio::test]
async fn test_cancel_interrupts_long_poll() {
    let mut transport = SqsTransport::builder(QUEUE_URL)
        .build_with_client(Arc::new(HangingSqs))
        .unwrap();
    transport.set_receiver(Arc::new(RecordingReceiver::default()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    run(&transport, cancel).await.unwrap();
}

#[tokio::test]
async fn test_cancel_waits_for_in_flight_message() {
    let cancel = CancellationToken::new();
    let client = Arc::new(MockSqs::new(cancel.clone()).with_batches(vec![Ok(vec![
        queue_message("receipt-1", &encoded(&sample_event("1"))),
    ])]));
    let receiver = Arc::new(SlowReceiver::new(Duration::from_millis(300)));
    let mut transport = SqsTransport::builder(QUEUE_URL)
        .build_with_client(client.clone())
        .unwrap();
    transport.set_receiver(receiver.clone());

    let trigger = cancel.clone();
    let started = receiver.clone();
    tokio::spawn(async move {
        started.started.notified().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    run(&transport, cancel).await.unwrap();

    assert!(receiver.finished());
    assert_eq!(receiver.events.lock().unwrap().len(), 1);
    assert_eq!(client.deleted(), vec!["receipt-1".to_string()]);
    // The token is honoured before the next receive call.
    assert_eq!(client.receive_calls(), 1);
}

#[tokio::test]
async fn test_poll_once_reports_batch_size() {
    let client = Arc::new(MockSqs::new(CancellationToken::new()).with_batches(vec![Ok(vec![
        queue_message("receipt-1", &encoded(&sample_event("1"))),
        queue_message("receipt-2", "garbage"),
    ])]));
    let receiver = RecordingReceiver::default();
    let transport = SqsTransport::builder(QUEUE_URL)
        .build_with_client(client.clone())
        .unwrap();
    let codec = transport.codec().unwrap();

    let count = transport.poll_once(codec.as_ref(), &receiver).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(client.deleted(), vec!["receipt-1".to_string()]);
    // The decoded body matches what a structured codec would produce.
    let decoded = codec
        .decode(&Message::from(encoded(&sample_event("1"))))
        .unwrap();
    assert_eq!(receiver.events.lock().unwrap()[0], decoded);
}
