mod common;

use common::{document, eventually, MemoryStore};
use docstore_core::{spawn_pipeline, PipelineConfig, WritePipeline};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn submitted_documents_are_persisted() {
    let store = Arc::new(MemoryStore::new());
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());

    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for (offset, id) in ids.iter().enumerate() {
        queue.submit(document(*id, 1_700_000_000 + offset as i64));
    }
    queue.shutdown();
    let report = handle.await.unwrap();

    assert_eq!(report.submitted, 3);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.failed, 0);
    for id in ids {
        assert!(store.stored(id).is_some());
    }
}

#[tokio::test]
async fn first_failure_is_retried_once_and_persisted() {
    let store = Arc::new(MemoryStore::failing_inserts(1));
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());
    let id = Uuid::new_v4();

    queue.submit(document(id, 42));
    eventually(|| store.stored(id).is_some()).await;
    queue.shutdown();
    let report = handle.await.unwrap();

    assert_eq!(store.insert_attempts(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(report.retried, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn second_failure_drops_document_without_reaching_producer() {
    let store = Arc::new(MemoryStore::failing_inserts(2));
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());
    let id = Uuid::new_v4();

    queue.submit(document(id, 42));
    eventually(|| queue.report().failed == 1).await;
    queue.shutdown();
    let report = handle.await.unwrap();

    assert_eq!(store.insert_attempts(), 2);
    assert!(store.stored(id).is_none());
    assert_eq!(report.retried, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.persisted, 0);
}

#[tokio::test]
async fn duplicate_id_is_not_retried() {
    let store = Arc::new(MemoryStore::new());
    let id = Uuid::new_v4();
    let original = document(id, 1);
    store.seed(original.clone());
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());

    queue.submit(document(id, 2));
    eventually(|| queue.report().failed == 1).await;
    queue.shutdown();
    let report = handle.await.unwrap();

    assert_eq!(store.insert_attempts(), 1);
    assert_eq!(report.retried, 0);
    assert_eq!(store.stored(id), Some(original));
}

#[tokio::test]
async fn shutdown_drains_every_queued_document_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let (pipeline, queue) = WritePipeline::new(Arc::clone(&store), PipelineConfig::default());

    let k = 5;
    for offset in 0..k {
        queue.submit(document(Uuid::new_v4(), offset));
    }
    queue.shutdown();
    let report = pipeline.run().await;

    assert_eq!(report.drained, k as u64);
    assert_eq!(store.insert_attempts(), k as usize);
    assert_eq!(store.len(), k as usize);
    assert_eq!(report.persisted, k as u64);
}

#[tokio::test]
async fn drain_failures_are_logged_not_retried() {
    let store = Arc::new(MemoryStore::failing_inserts(2));
    let (pipeline, queue) = WritePipeline::new(Arc::clone(&store), PipelineConfig::default());

    for offset in 0..3 {
        queue.submit(document(Uuid::new_v4(), offset));
    }
    queue.shutdown();
    let report = pipeline.run().await;

    assert_eq!(report.drained, 3);
    assert_eq!(store.insert_attempts(), 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.retried, 0);
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let (pipeline, queue) = WritePipeline::new(Arc::clone(&store), PipelineConfig::default());

    queue.shutdown();
    queue.shutdown();
    assert!(queue.is_shutting_down());
    queue.submit(document(Uuid::new_v4(), 1));
    let report = pipeline.run().await;

    assert_eq!(report.rejected, 1);
    assert_eq!(report.submitted, 0);
    assert_eq!(store.insert_attempts(), 0);
}

#[tokio::test]
async fn dropping_every_queue_stops_the_pipeline_after_persisting() {
    let store = Arc::new(MemoryStore::new());
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());
    let id = Uuid::new_v4();

    queue.submit(document(id, 7));
    drop(queue);
    let report = handle.await.unwrap();

    assert_eq!(report.persisted, 1);
    assert!(store.stored(id).is_some());
}

#[tokio::test]
async fn timed_out_inserts_count_as_failed_attempts() {
    let store = Arc::new(MemoryStore::slow_inserts(Duration::from_millis(500)));
    let config = PipelineConfig {
        insert_timeout: Some(Duration::from_millis(10)),
    };
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), config);
    let id = Uuid::new_v4();

    queue.submit(document(id, 7));
    eventually(|| queue.report().failed == 1).await;
    queue.shutdown();
    let report = handle.await.unwrap();

    assert_eq!(store.insert_attempts(), 2);
    assert_eq!(report.retried, 1);
    assert!(store.stored(id).is_none());
}

#[tokio::test]
async fn document_waiting_for_retry_gets_its_last_attempt_during_drain() {
    let store = Arc::new(MemoryStore::failing_inserts(1).with_insert_delay(Duration::from_millis(100)));
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());
    let id = Uuid::new_v4();

    assert!(queue.reserve(id));
    queue.submit(document(id, 42));
    eventually(|| store.insert_attempts() == 1).await;
    queue.shutdown();
    let report = handle.await.unwrap();

    assert_eq!(store.insert_attempts(), 2);
    assert_eq!(report.retried, 1);
    assert_eq!(report.drained, 0);
    assert_eq!(report.persisted, 1);
    assert!(store.stored(id).is_some());
    assert!(!queue.is_in_flight(id));
}

#[tokio::test]
async fn failed_document_releases_its_reservation() {
    let store = Arc::new(MemoryStore::failing_inserts(2));
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());
    let id = Uuid::new_v4();

    assert!(queue.reserve(id));
    queue.submit(document(id, 1));
    eventually(|| queue.report().failed == 1).await;
    assert!(!queue.is_in_flight(id));
    assert!(queue.reserve(id));

    queue.shutdown();
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn producers_racing_shutdown_never_lose_an_accepted_document() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 50;
    let store = Arc::new(MemoryStore::new());
    let (queue, handle) = spawn_pipeline(Arc::clone(&store), PipelineConfig::default());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move {
                for offset in 0..PER_PRODUCER {
                    queue.submit(document(Uuid::new_v4(), offset as i64));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    eventually(|| queue.report().submitted >= 20).await;
    queue.shutdown();
    for producer in producers {
        producer.await.unwrap();
    }
    drop(queue);
    let report = handle.await.unwrap();

    let total = (PRODUCERS * PER_PRODUCER) as u64;
    assert_eq!(report.submitted + report.rejected, total);
    assert_eq!(report.persisted + report.failed, report.submitted);
    assert_eq!(report.failed, 0);
    assert_eq!(store.len() as u64, report.persisted);
}
