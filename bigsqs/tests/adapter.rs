//! End-to-end tests of the oversize-payload client against in-memory SQS and S3

use async_trait::async_trait;
use bigsqs::{
    AdapterConfig, BigSqsClient, BigSqsError, BlobClient, BlobError, MessageAttributeValue,
    OrphanPolicy, OutgoingMessage, QueueClient, QueueError, S3Pointer, POINTER_TYPE_TAG,
};
use bigsqs_core::{
    DeleteMessageOutput, ReceiveMessageOutput, ReceiveMessageRequest, SendMessageOutput,
    SendMessageRequest,
};
use bigsqs_s3::MemoryBlobStore;
use bigsqs_sqs::{md5_hex, MemoryQueue};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const QUEUE: &str = "reports.fifo";
const BUCKET: &str = "report-payloads";

// =============================================================================
// TEST DOUBLES
// =============================================================================

/// Queue wrapper recording sends and failing the nth one on request
#[derive(Default)]
struct RecordingQueue {
    inner: MemoryQueue,
    sent: Mutex<Vec<SendMessageRequest>>,
    deletes: AtomicUsize,
    fail_send_at: Mutex<Option<usize>>,
    fail_deletes: AtomicBool,
}

impl RecordingQueue {
    fn sent(&self) -> Vec<SendMessageRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueClient for RecordingQueue {
    async fn send_message(
        &self,
        queue_url: &str,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError> {
        let attempt = self.sent.lock().unwrap().len();
        if *self.fail_send_at.lock().unwrap() == Some(attempt) {
            return Err(QueueError::service("ServiceUnavailable", "try again later"));
        }
        self.sent.lock().unwrap().push(request.clone());
        self.inner.send_message(queue_url, request).await
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        self.inner.receive_message(queue_url, request).await
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<DeleteMessageOutput, QueueError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(QueueError::service("ServiceUnavailable", "try again later"));
        }
        self.inner.delete_message(queue_url, receipt_handle).await
    }
}

/// Blob wrapper counting calls and failing deletes on request
#[derive(Default)]
struct RecordingBlobs {
    inner: MemoryBlobStore,
    puts: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl RecordingBlobs {
    fn calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
            + self.gets.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobClient for RecordingBlobs {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BlobError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_object(bucket, key, data, content_type).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BlobError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_object(bucket, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BlobError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::service("AccessDenied", "Access Denied"));
        }
        self.inner.delete_object(bucket, key).await
    }
}

struct Harness {
    client: BigSqsClient,
    queue: Arc<RecordingQueue>,
    blobs: Arc<RecordingBlobs>,
    queue_url: String,
}

fn harness(configure: impl FnOnce(AdapterConfig) -> AdapterConfig) -> Harness {
    let queue = Arc::new(RecordingQueue::default());
    let blobs = Arc::new(RecordingBlobs::default());
    let queue_url = queue.inner.create_queue(QUEUE).unwrap().url;
    blobs.inner.create_bucket(BUCKET).unwrap();

    let config = configure(AdapterConfig::new(queue_url.as_str(), BUCKET));
    let client = BigSqsClient::new(queue.clone(), blobs.clone(), config).unwrap();
    Harness {
        client,
        queue,
        blobs,
        queue_url,
    }
}

fn small_threshold(config: AdapterConfig) -> AdapterConfig {
    config.with_size_threshold(10)
}

fn expected_pointer_body(key: &str) -> String {
    format!(
        r#"["{}", {{"s3BucketName": "{}", "s3Key": "{}"}}]"#,
        POINTER_TYPE_TAG, BUCKET, key
    )
}

// =============================================================================
// SEND
// =============================================================================

mod send_tests {
    use super::*;

    #[tokio::test]
    async fn test_small_payload_sent_verbatim() {
        let h = harness(small_threshold);
        h.client.send_message("hello").await.unwrap();

        let sent = h.queue.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hello");
        assert_eq!(h.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn test_payload_at_threshold_stays_inline() {
        let h = harness(small_threshold);
        h.client.send_message("0123456789").await.unwrap();

        assert_eq!(h.queue.sent()[0].body, "0123456789");
        assert_eq!(h.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn test_oversize_payload_externalized() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();

        let sent = h.queue.sent();
        let key = sent[0].deduplication_id.clone().unwrap();
        assert_eq!(sent[0].body, expected_pointer_body(&key));
        assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 1);

        let stored = h.blobs.inner.head_object(BUCKET, &key).unwrap();
        assert_eq!(&stored.data[..], b"hello world!");
        assert_eq!(stored.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_threshold_counts_utf8_bytes() {
        // Five characters, fifteen bytes
        let h = harness(small_threshold);
        h.client.send_message("日本語です").await.unwrap();

        assert!(bigsqs::is_pointer_body(&h.queue.sent()[0].body));
        assert_eq!(h.blobs.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_multibyte_payload_at_threshold_stays_inline() {
        // Four characters, ten bytes
        let h = harness(small_threshold);
        assert_eq!(bigsqs::utf8_len("日本語!"), 10);
        h.client.send_message("日本語!").await.unwrap();

        assert_eq!(h.queue.sent()[0].body, "日本語!");
        assert_eq!(h.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn test_default_threshold_is_sqs_limit() {
        let h = harness(|c| c);
        let at_limit = "a".repeat(bigsqs::MAX_SQS_MESSAGE_SIZE);
        let over_limit = "a".repeat(bigsqs::MAX_SQS_MESSAGE_SIZE + 1);

        h.client.send_message(at_limit.as_str()).await.unwrap();
        h.client.send_message(over_limit.as_str()).await.unwrap();

        let sent = h.queue.sent();
        assert_eq!(sent[0].body.len(), bigsqs::MAX_SQS_MESSAGE_SIZE);
        assert!(bigsqs::is_pointer_body(&sent[1].body));
        assert_eq!(h.blobs.inner.object_count(BUCKET), 1);
    }

    #[tokio::test]
    async fn test_ids_are_fresh_per_send() {
        let h = harness(|c| c);
        h.client.send_message("one").await.unwrap();
        h.client.send_message("two").await.unwrap();

        let sent = h.queue.sent();
        assert_ne!(sent[0].deduplication_id, sent[1].deduplication_id);
        assert_ne!(sent[0].group_id, sent[1].group_id);
        assert!(sent.iter().all(|r| r.group_id.is_some()));
    }

    #[tokio::test]
    async fn test_group_id_and_attributes_forwarded() {
        let h = harness(|c| c);
        let message = OutgoingMessage::new("payload")
            .with_group_id("tenant-42")
            .with_attribute("kind", MessageAttributeValue::string("report"));
        h.client.send_message(message).await.unwrap();

        let sent = h.queue.sent();
        assert_eq!(sent[0].group_id.as_deref(), Some("tenant-42"));
        assert_eq!(
            sent[0].message_attributes.get("kind"),
            Some(&MessageAttributeValue::string("report"))
        );
    }

    #[tokio::test]
    async fn test_blob_failure_propagates_without_enqueue() {
        let h = harness(|c| c.with_size_threshold(1));
        let client = BigSqsClient::new(
            h.queue.clone(),
            Arc::new(MemoryBlobStore::new()), // no bucket
            AdapterConfig::new(h.queue_url.as_str(), BUCKET).with_size_threshold(1),
        )
        .unwrap();

        let result = client.send_message("too big").await;
        assert!(matches!(result, Err(BigSqsError::Blob(BlobError::BucketNotFound(_)))));
        assert!(h.queue.sent().is_empty());
    }
}

// =============================================================================
// BATCH
// =============================================================================

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let h = harness(small_threshold);
        let results = h
            .client
            .send_messages(["a", "b", "an oversize one", "d"])
            .await
            .unwrap();
        assert_eq!(results.len(), 4);

        let received = h.client.receive_messages(10, None).await.unwrap();
        let ids: Vec<_> = received.messages.iter().map(|m| m.message_id.clone()).collect();
        let sent_ids: Vec<_> = results.iter().map(|r| r.message_id.clone()).collect();
        assert_eq!(ids, sent_ids);

        let bodies: Vec<_> = received.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["a", "b", "an oversize one", "d"]);
    }

    #[tokio::test]
    async fn test_batch_stops_at_failure() {
        let h = harness(|c| c);
        *h.queue.fail_send_at.lock().unwrap() = Some(2);

        let result = h
            .client
            .send_messages(vec![
                OutgoingMessage::new("first"),
                OutgoingMessage::new("second"),
                OutgoingMessage::new("third"),
                OutgoingMessage::new("fourth"),
            ])
            .await;

        let Err(BigSqsError::Batch { index, sent, source }) = result else {
            panic!("expected batch error");
        };
        assert_eq!(index, 2);
        assert_eq!(sent.len(), 2);
        assert!(matches!(*source, BigSqsError::Queue(QueueError::Service { .. })));

        // Nothing after the failure was attempted
        let bodies: Vec<_> = h.queue.sent().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let h = harness(|c| c);
        let results = h.client.send_messages(Vec::<OutgoingMessage>::new()).await.unwrap();
        assert!(results.is_empty());
    }
}

// =============================================================================
// RECEIVE
// =============================================================================

mod receive_tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_oversize_payload() {
        let h = harness(|c| c);
        let payload = "é".repeat(200_000); // 400 000 bytes
        h.client.send_message(payload.as_str()).await.unwrap();

        let received = h.client.receive_messages(1, None).await.unwrap();
        assert_eq!(received.messages.len(), 1);
        assert_eq!(received.messages[0].body, payload);
        assert_eq!(h.client.tracked_handles(), 1);
    }

    #[tokio::test]
    async fn test_resolved_md5_matches_payload() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();

        let received = h.client.receive_messages(1, None).await.unwrap();
        assert_eq!(received.messages[0].md5_of_body, md5_hex(b"hello world!"));
    }

    #[tokio::test]
    async fn test_content_length_tracks_resolved_response() {
        let h = harness(small_threshold);
        h.client.send_message("x".repeat(4096)).await.unwrap();

        let received = h.client.receive_messages(1, None).await.unwrap();
        let length = received.response_metadata.content_length().unwrap();
        assert!(length > 4096);
        assert_eq!(length, received.serialized_len());
    }

    #[tokio::test]
    async fn test_plain_messages_untouched() {
        let h = harness(|c| c);
        let body = r#"["com.example.Other", {"s3BucketName": "b", "s3Key": "k"}]"#;
        h.client.send_message(body).await.unwrap();

        let received = h.client.receive_messages(1, None).await.unwrap();
        assert_eq!(received.messages[0].body, body);
        assert_eq!(received.messages[0].md5_of_body, md5_hex(body.as_bytes()));
        assert_eq!(h.blobs.calls(), 0);
        assert_eq!(h.client.tracked_handles(), 0);
    }

    #[tokio::test]
    async fn test_resolves_pointer_from_other_producer() {
        let h = harness(|c| c);
        h.blobs
            .inner
            .put_object(BUCKET, "from-java", Bytes::from("java payload"), "text/plain")
            .await
            .unwrap();
        // Compact form, as the Java extended client writes it
        let body = format!(
            r#"["{}",{{"s3BucketName":"{}","s3Key":"from-java"}}]"#,
            POINTER_TYPE_TAG, BUCKET
        );
        h.queue
            .inner
            .send_message(&h.queue_url, SendMessageRequest { body, ..Default::default() })
            .await
            .unwrap();

        let received = h.client.receive_messages(1, None).await.unwrap();
        assert_eq!(received.messages[0].body, "java payload");
    }

    #[tokio::test]
    async fn test_attribute_selection_forwarded() {
        let h = harness(|c| c);
        let message = OutgoingMessage::new("x")
            .with_attribute("keep", MessageAttributeValue::string("1"))
            .with_attribute("drop", MessageAttributeValue::string("2"));
        h.client.send_message(message).await.unwrap();

        let received = h
            .client
            .receive_messages(1, Some(vec!["keep".to_string()]))
            .await
            .unwrap();
        let attrs = &received.messages[0].message_attributes;
        assert!(attrs.contains_key("keep"));
        assert!(!attrs.contains_key("drop"));
    }

    #[tokio::test]
    async fn test_zero_max_rejected() {
        let h = harness(|c| c);
        let result = h.client.receive_messages(0, None).await;
        assert!(matches!(result, Err(BigSqsError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_missing_payload_surfaces_blob_error() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();
        let key = h.queue.sent()[0].deduplication_id.clone().unwrap();
        h.blobs.inner.delete_object(BUCKET, &key).await.unwrap();

        let result = h.client.receive_messages(1, None).await;
        assert!(matches!(
            result,
            Err(BigSqsError::Blob(BlobError::ObjectNotFound { .. }))
        ));
        assert_eq!(h.client.tracked_handles(), 0);
    }

    #[tokio::test]
    async fn test_failed_receive_leaves_no_bindings() {
        let h = harness(small_threshold);
        h.client
            .send_messages(["first oversize payload", "second oversize payload"])
            .await
            .unwrap();
        let missing = h.queue.sent()[1].deduplication_id.clone().unwrap();
        h.blobs.inner.delete_object(BUCKET, &missing).await.unwrap();

        let result = h.client.receive_messages(10, None).await;
        assert!(matches!(
            result,
            Err(BigSqsError::Blob(BlobError::ObjectNotFound { .. }))
        ));
        // The first payload was fetched, but its handle was never returned
        assert_eq!(h.blobs.gets.load(Ordering::SeqCst), 2);
        assert_eq!(h.client.tracked_handles(), 0);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_rejected() {
        let h = harness(|c| c);
        h.blobs
            .inner
            .put_object(BUCKET, "binary", Bytes::from_static(&[0xff, 0xfe, 0x00]), "application/octet-stream")
            .await
            .unwrap();
        h.queue
            .inner
            .send_message(
                &h.queue_url,
                SendMessageRequest {
                    body: S3Pointer::new(BUCKET, "binary").to_body(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = h.client.receive_messages(1, None).await;
        assert!(matches!(result, Err(BigSqsError::InvalidUtf8 { .. })));
    }

    #[tokio::test]
    async fn test_malformed_pointer_rejected() {
        let h = harness(|c| c);
        let body = format!(r#"["{}", {{"s3BucketName": "b", "s3Key": null}}]"#, POINTER_TYPE_TAG);
        h.queue
            .inner
            .send_message(&h.queue_url, SendMessageRequest { body, ..Default::default() })
            .await
            .unwrap();

        let result = h.client.receive_messages(1, None).await;
        assert!(matches!(result, Err(BigSqsError::MalformedPointer { .. })));
        assert_eq!(h.blobs.calls(), 0);
    }
}

// =============================================================================
// DELETE
// =============================================================================

mod delete_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_removes_message_and_payload() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();
        let received = h.client.receive_messages(1, None).await.unwrap();

        h.client
            .delete_message(&received.messages[0].receipt_handle)
            .await
            .unwrap();

        assert_eq!(h.queue.inner.approximate_number_of_messages(QUEUE), 0);
        assert_eq!(h.blobs.inner.object_count(BUCKET), 0);
        assert_eq!(h.client.tracked_handles(), 0);
    }

    #[tokio::test]
    async fn test_delete_plain_message_skips_blob_store() {
        let h = harness(|c| c);
        h.client.send_message("hello").await.unwrap();
        let received = h.client.receive_messages(1, None).await.unwrap();

        h.client
            .delete_message(&received.messages[0].receipt_handle)
            .await
            .unwrap();

        assert_eq!(h.queue.inner.approximate_number_of_messages(QUEUE), 0);
        assert_eq!(h.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_from_other_instance_leaves_payload() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();
        let received = h.client.receive_messages(1, None).await.unwrap();

        // A second client never saw the delivery, so only the queue entry goes
        let other = BigSqsClient::new(
            h.queue.clone(),
            h.blobs.clone(),
            AdapterConfig::new(h.queue_url.as_str(), BUCKET),
        )
        .unwrap();
        other
            .delete_message(&received.messages[0].receipt_handle)
            .await
            .unwrap();

        assert_eq!(h.blobs.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(h.blobs.inner.object_count(BUCKET), 1);
    }

    #[tokio::test]
    async fn test_failed_queue_delete_keeps_payload() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();
        let received = h.client.receive_messages(1, None).await.unwrap();
        h.queue.fail_deletes.store(true, Ordering::SeqCst);

        let result = h
            .client
            .delete_message(&received.messages[0].receipt_handle)
            .await;

        assert!(matches!(result, Err(BigSqsError::Queue(_))));
        assert_eq!(h.blobs.deletes.load(Ordering::SeqCst), 0);
        assert_eq!(h.client.tracked_handles(), 1);

        // The binding survives for a retry
        h.queue.fail_deletes.store(false, Ordering::SeqCst);
        h.client
            .delete_message(&received.messages[0].receipt_handle)
            .await
            .unwrap();
        assert_eq!(h.blobs.inner.object_count(BUCKET), 0);
    }

    #[tokio::test]
    async fn test_orphaned_payload_fails_by_default() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();
        let key = h.queue.sent()[0].deduplication_id.clone().unwrap();
        let received = h.client.receive_messages(1, None).await.unwrap();
        h.blobs.fail_deletes.store(true, Ordering::SeqCst);

        let result = h
            .client
            .delete_message(&received.messages[0].receipt_handle)
            .await;

        let Err(BigSqsError::OrphanedBlob { pointer, .. }) = result else {
            panic!("expected orphaned blob error");
        };
        assert_eq!(pointer, S3Pointer::new(BUCKET, key.as_str()));
        assert_eq!(h.queue.inner.approximate_number_of_messages(QUEUE), 0);
        assert!(h.blobs.inner.object_exists(BUCKET, &key));
        assert_eq!(h.client.tracked_handles(), 0);
    }

    #[tokio::test]
    async fn test_orphaned_payload_warn_policy() {
        let h = harness(|c| small_threshold(c).with_orphan_policy(OrphanPolicy::Warn));
        h.client.send_message("hello world!").await.unwrap();
        let received = h.client.receive_messages(1, None).await.unwrap();
        h.blobs.fail_deletes.store(true, Ordering::SeqCst);

        h.client
            .delete_message(&received.messages[0].receipt_handle)
            .await
            .unwrap();
        assert_eq!(h.blobs.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(h.client.tracked_handles(), 0);
    }

    #[tokio::test]
    async fn test_redelivery_binds_latest_handle() {
        let h = harness(small_threshold);
        h.client.send_message("hello world!").await.unwrap();
        let first = h.client.receive_messages(1, None).await.unwrap();
        h.queue.inner.expire_visibility(QUEUE);
        let second = h.client.receive_messages(1, None).await.unwrap();
        assert_eq!(h.client.tracked_handles(), 2);

        // The stale handle is rejected by the queue, the payload stays
        let stale = h
            .client
            .delete_message(&first.messages[0].receipt_handle)
            .await;
        assert!(matches!(
            stale,
            Err(BigSqsError::Queue(QueueError::ReceiptHandleIsInvalid(_)))
        ));
        assert_eq!(h.blobs.inner.object_count(BUCKET), 1);

        h.client
            .delete_message(&second.messages[0].receipt_handle)
            .await
            .unwrap();
        assert_eq!(h.blobs.inner.object_count(BUCKET), 0);
    }
}

// =============================================================================
// CONCURRENCY
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_client_across_tasks() {
        let h = harness(small_threshold);
        let client = Arc::new(h.client);

        for i in 0..20 {
            client
                .send_message(format!("oversize payload number {i}"))
                .await
                .unwrap();
        }

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let client = Arc::clone(&client);
            tasks.push(tokio::spawn(async move {
                let mut handled = 0;
                loop {
                    let received = client.receive_messages(3, None).await.unwrap();
                    if received.messages.is_empty() {
                        return handled;
                    }
                    for message in &received.messages {
                        assert!(message.body.starts_with("oversize payload number"));
                        client.delete_message(&message.receipt_handle).await.unwrap();
                        handled += 1;
                    }
                }
            }));
        }

        let mut total = 0;
        for task in tasks {
            total += task.await.unwrap();
        }

        assert_eq!(total, 20);
        assert_eq!(client.tracked_handles(), 0);
        assert_eq!(h.blobs.inner.object_count(BUCKET), 0);
    }
}
