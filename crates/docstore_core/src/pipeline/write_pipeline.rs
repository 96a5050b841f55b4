//! Single-consumer write loop with one retry and a shutdown drain.

use super::in_flight::InFlightIds;
use super::metrics::{PipelineMetrics, PipelineReport};
use crate::model::document::{Document, DocumentId};
use crate::store::{DocumentStore, StoreError, StoreResult};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Tunables for the write loop.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Deadline for one insert attempt. `None` waits indefinitely.
    pub insert_timeout: Option<Duration>,
}

/// Producer-side handle: enqueue documents and signal shutdown.
///
/// Cheap to clone; every request handler can own one.
#[derive(Clone)]
pub struct WriteQueue {
    ingest_tx: mpsc::UnboundedSender<Document>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    metrics: Arc<PipelineMetrics>,
    in_flight: Arc<InFlightIds>,
}

impl WriteQueue {
    /// Reserves `id` for a document about to be submitted.
    ///
    /// Returns `false` while another accepted document with the same id has
    /// not had its final insert attempt yet.
    pub fn reserve(&self, id: DocumentId) -> bool {
        self.in_flight.reserve(id)
    }

    /// Drops a reservation that will not be followed by `submit`.
    pub fn release(&self, id: DocumentId) {
        self.in_flight.release(id);
    }

    pub fn is_in_flight(&self, id: DocumentId) -> bool {
        self.in_flight.contains(id)
    }

    /// Enqueues `document` for persistence and returns immediately.
    ///
    /// The outcome is not reported to the caller. Documents submitted after
    /// `shutdown()` are rejected and logged, and their reservation is dropped.
    pub fn submit(&self, document: Document) {
        let document_id = document.id;
        if self.is_shutting_down() {
            self.reject(document_id, "shutting_down");
            return;
        }
        match self.ingest_tx.send(document) {
            Ok(()) => {
                PipelineMetrics::incr(&self.metrics.submitted);
                debug!("event=document_submit module=pipeline status=ok document_id={document_id}");
            }
            Err(_) => self.reject(document_id, "pipeline_closed"),
        }
    }

    /// Asks the pipeline to stop taking traffic and drain. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("event=pipeline_shutdown module=pipeline status=start");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Current counter values.
    pub fn report(&self) -> PipelineReport {
        self.metrics.snapshot()
    }

    fn reject(&self, document_id: DocumentId, reason: &str) {
        self.in_flight.release(document_id);
        PipelineMetrics::incr(&self.metrics.rejected);
        warn!(
            "event=document_submit module=pipeline status=rejected document_id={document_id} reason={reason}"
        );
    }
}

/// Consumer side of the pipeline. Drive it with [`WritePipeline::run`].
pub struct WritePipeline<S: DocumentStore> {
    store: Arc<S>,
    config: PipelineConfig,
    ingest_rx: mpsc::UnboundedReceiver<Document>,
    retry_tx: mpsc::UnboundedSender<Document>,
    retry_rx: mpsc::UnboundedReceiver<Document>,
    shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<PipelineMetrics>,
    in_flight: Arc<InFlightIds>,
}

/// Builds a pipeline and runs it on a dedicated tokio task.
pub fn spawn_pipeline<S: DocumentStore>(
    store: Arc<S>,
    config: PipelineConfig,
) -> (WriteQueue, JoinHandle<PipelineReport>) {
    let (pipeline, queue) = WritePipeline::new(store, config);
    (queue, tokio::spawn(pipeline.run()))
}

impl<S: DocumentStore> WritePipeline<S> {
    pub fn new(store: Arc<S>, config: PipelineConfig) -> (Self, WriteQueue) {
        let (ingest_tx, ingest_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(PipelineMetrics::new());
        let in_flight = Arc::new(InFlightIds::default());

        let queue = WriteQueue {
            ingest_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            metrics: Arc::clone(&metrics),
            in_flight: Arc::clone(&in_flight),
        };
        let pipeline = Self {
            store,
            config,
            ingest_rx,
            retry_tx,
            retry_rx,
            shutdown_rx,
            metrics,
            in_flight,
        };
        (pipeline, queue)
    }

    /// Runs the event loop until shutdown, then drains and returns counters.
    ///
    /// Shutdown is checked first, then retries, then new documents; the loop
    /// also ends once every `WriteQueue` has been dropped.
    pub async fn run(mut self) -> PipelineReport {
        info!(
            "event=pipeline_start module=pipeline status=ok insert_timeout_ms={}",
            self.config
                .insert_timeout
                .map_or_else(|| "none".to_string(), |limit| limit.as_millis().to_string())
        );

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                Some(document) = self.retry_rx.recv() => {
                    self.persist_last(&document, "retry").await;
                }
                received = self.ingest_rx.recv() => match received {
                    Some(document) => self.persist_first(document).await,
                    None => {
                        info!("event=pipeline_closed module=pipeline status=ok reason=no_producers");
                        break;
                    }
                },
            }
        }

        self.drain().await;

        let report = self.metrics.snapshot();
        info!(
            "event=pipeline_stop module=pipeline status=ok persisted={} retried={} failed={} drained={} rejected={}",
            report.persisted, report.retried, report.failed, report.drained, report.rejected
        );
        report
    }

    async fn attempt(&self, document: &Document) -> StoreResult<()> {
        match self.config.insert_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.insert(document))
                .await
                .unwrap_or_else(|_| Err(StoreError::Timeout(limit))),
            None => self.store.insert(document).await,
        }
    }

    /// First attempt for a newly received document.
    ///
    /// Permanent errors such as a duplicate id are deliberately not retried;
    /// only transient failures go to the retry queue.
    async fn persist_first(&self, document: Document) {
        match self.attempt(&document).await {
            Ok(()) => self.record_persisted(&document, "first"),
            Err(err) if err.is_permanent() => self.record_failed(&document, "first", &err),
            Err(err) => {
                PipelineMetrics::incr(&self.metrics.retried);
                warn!(
                    "event=document_persist module=pipeline status=retry stage=first document_id={} error={}",
                    document.id, err
                );
                if let Err(returned) = self.retry_tx.send(document) {
                    self.record_failed(&returned.0, "first", &err);
                }
            }
        }
    }

    async fn persist_last(&self, document: &Document, stage: &str) {
        match self.attempt(document).await {
            Ok(()) => self.record_persisted(document, stage),
            Err(err) => self.record_failed(document, stage, &err),
        }
    }

    async fn drain(&mut self) {
        self.ingest_rx.close();
        info!("event=pipeline_drain module=pipeline status=start");

        while let Ok(document) = self.retry_rx.try_recv() {
            self.persist_last(&document, "retry").await;
        }
        while let Some(document) = self.ingest_rx.recv().await {
            PipelineMetrics::incr(&self.metrics.drained);
            self.persist_last(&document, "drain").await;
        }

        info!(
            "event=pipeline_drain module=pipeline status=ok drained={}",
            self.metrics.snapshot().drained
        );
    }

    fn record_persisted(&self, document: &Document, stage: &str) {
        self.in_flight.release(document.id);
        PipelineMetrics::incr(&self.metrics.persisted);
        debug!(
            "event=document_persist module=pipeline status=ok stage={stage} document_id={}",
            document.id
        );
    }

    fn record_failed(&self, document: &Document, stage: &str, err: &StoreError) {
        self.in_flight.release(document.id);
        PipelineMetrics::incr(&self.metrics.failed);
        error!(
            "event=document_persist module=pipeline status=error stage={stage} document_id={} error={}",
            document.id, err
        );
    }
}
