use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::store::EvaluationStore;
use crate::models::evaluation::{EvaluationReport, EvaluationStatus};
use crate::services::queue::{EvaluationQueue, EvaluationTask, QueueEvent, QueueStatus};
use crate::services::scoring::{extract_scores, normalize_scores};
use crate::services::storage::{ImageStore, StorageError};
use crate::services::summary::build_summary;
use crate::services::vision::{VisionClient, VisionError, VisionRequest};

/// Attempts at writing a finished report before the task is failed.
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Drives evaluations from submission to a terminal status.
///
/// The service is the queue's only subscriber. Every `Processing` event runs
/// in its own tokio task; the analysis for that task runs detached and is
/// raced against the queue's timeout, and the result write must finish
/// before the same deadline. When the timer wins, the task is failed and
/// the analysis result, if it ever arrives, is dropped.
pub struct EvaluationService {
    queue: Arc<EvaluationQueue>,
    vision: Arc<VisionClient>,
    store: Arc<dyn EvaluationStore>,
    images: ImageStore,
}

impl EvaluationService {
    pub fn new(
        queue: Arc<EvaluationQueue>,
        vision: Arc<VisionClient>,
        store: Arc<dyn EvaluationStore>,
        images: ImageStore,
    ) -> Self {
        Self {
            queue,
            vision,
            store,
            images,
        }
    }

    /// Subscribe to the queue and start reacting to its events.
    pub fn spawn(self: &Arc<Self>) -> Result<JoinHandle<()>, ServiceError> {
        let mut events = self.queue.subscribe().ok_or(ServiceError::AlreadySubscribed)?;
        let service = Arc::clone(self);

        Ok(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                service.handle_event(event);
            }
            tracing::info!("Queue event stream closed, evaluation service stopping");
        }))
    }

    /// Mark the evaluation `processing` and queue it.
    ///
    /// Returns once the task is queued, not once it has been processed. A
    /// failed evaluation is retried by submitting it again; one that is still
    /// pending or in flight is rejected with `AlreadyQueued`.
    pub async fn submit_evaluation(&self, evaluation_id: Uuid) -> Result<(), ServiceError> {
        let evaluation = self
            .store
            .find_by_id(evaluation_id)
            .await?
            .ok_or(ServiceError::NotFound(evaluation_id))?;

        // Still pending or in flight: leave the record alone.
        if self.queue.get_task(evaluation_id).is_some() {
            return Err(ServiceError::AlreadyQueued(evaluation_id));
        }

        self.store
            .update_status(evaluation_id, EvaluationStatus::Processing)
            .await?;

        if !self.queue.enqueue(EvaluationTask::for_evaluation(&evaluation)) {
            return Err(ServiceError::AlreadyQueued(evaluation_id));
        }
        metrics::counter!("evaluations_submitted_total").increment(1);

        tracing::info!(evaluation_id = %evaluation_id, "Evaluation submitted to queue");
        Ok(())
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    fn handle_event(self: &Arc<Self>, event: QueueEvent) {
        match event {
            QueueEvent::Processing(task) => {
                let service = Arc::clone(self);
                tokio::spawn(async move { service.process_task(task).await });
            }
            QueueEvent::Completed(_) => {
                metrics::counter!("evaluations_completed_total").increment(1);
            }
            QueueEvent::Failed { .. } => {
                metrics::counter!("evaluations_failed_total").increment(1);
            }
            QueueEvent::Enqueued(_) => {}
        }

        let status = self.queue.status();
        metrics::gauge!("evaluation_queue_pending").set(status.pending as f64);
        metrics::gauge!("evaluation_queue_processing").set(status.processing as f64);
    }

    async fn process_task(self: Arc<Self>, task: EvaluationTask) {
        let timeout = self.queue.timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        let started = Instant::now();

        // Dropping the handle on timeout detaches the analysis; it is not
        // cancelled, only ignored.
        let analysis = {
            let service = Arc::clone(&self);
            let task = task.clone();
            tokio::spawn(async move { service.analyze(&task).await })
        };

        let outcome = tokio::select! {
            joined = analysis => joined.unwrap_or_else(|e| Err(ServiceError::Worker(e.to_string()))),
            _ = tokio::time::sleep_until(deadline) => Err(ServiceError::Timeout(timeout)),
        };

        // The write shares the task's budget, so a stuck statement cannot
        // hold the slot past the deadline.
        let outcome = match outcome {
            Ok(report) => tokio::time::timeout_at(deadline, self.persist_report(task.evaluation_id, &report))
                .await
                .unwrap_or_else(|_| Err(ServiceError::Timeout(timeout))),
            Err(e) => Err(e),
        };

        metrics::histogram!("evaluation_processing_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                self.queue.complete(task.id);
                tracing::info!(
                    evaluation_id = %task.evaluation_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Evaluation completed"
                );
            }
            Err(e) => {
                tracing::error!(evaluation_id = %task.evaluation_id, error = %e, "Evaluation failed");
                self.queue.fail(task.id, Some(e.to_string()));
                self.mark_failed(task.evaluation_id).await;
            }
        }
    }

    /// Image reference, AI critique, scores and summary for one task.
    async fn analyze(&self, task: &EvaluationTask) -> Result<EvaluationReport, ServiceError> {
        let image_url = self
            .images
            .backend(task.storage_kind)?
            .get_url(&task.image_path)
            .await?;

        let response = self
            .vision
            .analyze_image(&VisionRequest {
                image_url,
                image_path: task.image_path.clone(),
                storage_kind: task.storage_kind,
            })
            .await?;

        let scores = normalize_scores(&extract_scores(&response.analysis));
        let summary = build_summary(&response.analysis, &response.insights);

        Ok(EvaluationReport { scores, summary })
    }

    /// The report is kept in memory across attempts so a transient store
    /// failure does not throw away a finished critique.
    async fn persist_report(&self, evaluation_id: Uuid, report: &EvaluationReport) -> Result<(), ServiceError> {
        let mut attempt = 1;
        loop {
            match self.store.update_result(evaluation_id, report).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < PERSIST_ATTEMPTS => {
                    tracing::warn!(
                        evaluation_id = %evaluation_id,
                        attempt,
                        error = %e,
                        "Failed to persist evaluation result, retrying"
                    );
                    tokio::time::sleep(PERSIST_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(ServiceError::Persistence(e)),
            }
        }
    }

    async fn mark_failed(&self, evaluation_id: Uuid) {
        if let Err(e) = self
            .store
            .update_status(evaluation_id, EvaluationStatus::Failed)
            .await
        {
            tracing::error!(
                evaluation_id = %evaluation_id,
                error = %e,
                "Failed to mark evaluation as failed"
            );
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Evaluation {0} not found")]
    NotFound(Uuid),

    #[error("Evaluation {0} is already queued")]
    AlreadyQueued(Uuid),

    #[error("Vision analysis failed: {0}")]
    Vision(#[from] VisionError),

    #[error("Image storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Evaluation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Evaluation worker crashed: {0}")]
    Worker(String),

    #[error("Queue events already have a subscriber")]
    AlreadySubscribed,
}
