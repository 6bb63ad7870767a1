//! End-to-end batch delivery: processor, Solr sink and a mock Solr

mod support;

use std::sync::Arc;

use serde_json::json;
use solrfeed_core::{BatchProcessor, FailureResolution, FlushOutcome};
use solrfeed_domain::{BatchConfig, FailurePolicy, Record};
use solrfeed_infra::SolrBatchSink;
use support::{
    basic_auth, client_for, client_with_security, processor_config, UPDATE_OK, UPDATE_PATH,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sink(server: &MockServer, batch: &BatchConfig) -> Arc<SolrBatchSink> {
    Arc::new(SolrBatchSink::new(client_for(server), batch))
}

#[tokio::test]
async fn test_second_append_delivers_exact_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .and(body_json(json!([{"id": 1}, {"id": 2}])))
        .respond_with(ResponseTemplate::new(200).set_body_string(support::UPDATE_OK))
        .expect(1)
        .mount(&server)
        .await;

    let processor =
        BatchProcessor::new(sink(&server, &BatchConfig::default()), processor_config(2, 3));

    assert!(processor.append(Record::new().with("id", 1)).await.unwrap().is_none());
    let outcome = processor.append(Record::new().with("id", 2)).await.unwrap();
    assert_eq!(outcome, Some(FlushOutcome::Delivered { records: 2, attempts: 1 }));
    assert_eq!(processor.pending(), 0);

    assert!(processor.append(Record::new().with("id", 3)).await.unwrap().is_none());
    assert_eq!(processor.pending(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // Leave nothing behind for the Drop warning
    let requests_before = server.received_requests().await.unwrap().len();
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .and(body_json(json!([{"id": 3}])))
        .respond_with(ResponseTemplate::new(200).set_body_string(UPDATE_OK))
        .expect(1)
        .mount(&server)
        .await;
    processor.drain(&CancellationToken::new()).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), requests_before + 1);
}

#[tokio::test]
async fn test_decode_error_retried_then_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(3)
        .mount(&server)
        .await;

    let processor =
        BatchProcessor::new(sink(&server, &BatchConfig::default()), processor_config(2, 2));

    processor.append(Record::new().with("id", 1)).await.unwrap();
    let outcome = processor.append(Record::new().with("id", 2)).await.unwrap();

    assert_eq!(
        outcome,
        Some(FlushOutcome::Failed {
            records: 2,
            attempts: 3,
            resolution: FailureResolution::Discarded
        })
    );
    let stats = processor.stats();
    assert_eq!(stats.records_delivered, 0);
    assert_eq!(stats.records_discarded, 2);
    assert_eq!(processor.pending(), 0);
}

#[tokio::test]
async fn test_client_error_is_not_retried_and_requeued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("document is missing mandatory uniqueKey"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let batch = BatchConfig { on_failure: FailurePolicy::Requeue, ..BatchConfig::default() };
    let processor = BatchProcessor::new(sink(&server, &batch), processor_config(2, 5));

    processor.append(Record::new().with("id", 1)).await.unwrap();
    let outcome = processor.append(Record::new().with("id", 2)).await.unwrap();

    assert_eq!(
        outcome,
        Some(FlushOutcome::Failed {
            records: 2,
            attempts: 1,
            resolution: FailureResolution::Requeued
        })
    );
    assert_eq!(processor.pending(), 2);

    // Drained with a cancelled token, the records stay buffered
    server.reset().await;
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(processor.drain(&cancelled).await.is_err());
    assert_eq!(processor.pending(), 2);
}

#[tokio::test]
async fn test_exhausted_batch_dead_lettered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dead_letter_path = dir.path().join("dead.jsonl");
    let batch = BatchConfig {
        on_failure: FailurePolicy::DeadLetter,
        dead_letter_path: dead_letter_path.clone(),
        ..BatchConfig::default()
    };
    let processor = BatchProcessor::new(sink(&server, &batch), processor_config(2, 1));

    processor.append(Record::new().with("id", "a")).await.unwrap();
    let outcome = processor.append(Record::new().with("id", "b")).await.unwrap();

    assert!(matches!(
        outcome,
        Some(FlushOutcome::Failed { resolution: FailureResolution::DeadLettered, attempts: 2, .. })
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let content = std::fs::read_to_string(&dead_letter_path).unwrap();
    assert_eq!(content, "{\"id\":\"a\"}\n{\"id\":\"b\"}\n");
    assert_eq!(processor.stats().records_dead_lettered, 2);
}

#[tokio::test]
async fn test_auth_rejection_fails_batch_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("user solr lacks update role"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(SolrBatchSink::new(
        client_with_security(&server, &basic_auth()),
        &BatchConfig::default(),
    ));
    let processor = BatchProcessor::new(sink, processor_config(1, 3));

    let outcome = processor.append(Record::new().with("id", 1)).await.unwrap();

    assert_eq!(
        outcome,
        Some(FlushOutcome::Failed {
            records: 1,
            attempts: 1,
            resolution: FailureResolution::Discarded
        })
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
