use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::evaluation::{Evaluation, StorageKind};

pub const DEFAULT_MAX_CONCURRENT: usize = 20;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(120);

/// A unit of scheduled evaluation work.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTask {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub image_path: String,
    pub storage_kind: StorageKind,
    /// Higher runs first. `None` counts as 0.
    pub priority: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl EvaluationTask {
    pub fn for_evaluation(evaluation: &Evaluation) -> Self {
        Self {
            id: evaluation.id,
            evaluation_id: evaluation.id,
            image_path: evaluation.image_path.clone(),
            storage_kind: evaluation.image_storage_type,
            priority: None,
            created_at: Utc::now(),
        }
    }

    fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(0)
    }
}

/// Lifecycle transitions broadcast to the queue's subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Enqueued(EvaluationTask),
    Processing(EvaluationTask),
    Completed(EvaluationTask),
    Failed {
        task: EvaluationTask,
        error: Option<String>,
    },
}

/// Point-in-time counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub max_concurrent: usize,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<EvaluationTask>,
    processing: HashMap<Uuid, EvaluationTask>,
    completed: HashSet<Uuid>,
    failed: HashSet<Uuid>,
}

/// In-memory evaluation queue with a concurrency ceiling.
///
/// Capacity is enforced at dispatch, not at enqueue: `enqueue` always
/// accepts, and a task moves to the in-flight set only while fewer than
/// `max_concurrent` tasks are in flight. Slots are freed by `complete` and
/// `fail` only. Both are no-ops for ids that are not in flight, so a timeout
/// racing a late completion cannot corrupt state.
///
/// Completed and failed id sets grow for the life of the process.
pub struct EvaluationQueue {
    state: Mutex<QueueState>,
    events: mpsc::UnboundedSender<QueueEvent>,
    subscriber: Mutex<Option<mpsc::UnboundedReceiver<QueueEvent>>>,
    max_concurrent: usize,
    timeout: Duration,
}

impl Default for EvaluationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT, DEFAULT_TASK_TIMEOUT)
    }
}

impl EvaluationQueue {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(QueueState::default()),
            events,
            subscriber: Mutex::new(Some(receiver)),
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Take the event stream. There is exactly one subscriber; later calls
    /// return `None`.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<QueueEvent>> {
        self.subscriber
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Add a task and dispatch as many pending tasks as capacity allows.
    ///
    /// A task whose id is already pending or in flight is ignored and `false`
    /// is returned. Re-queuing an id that previously completed or failed
    /// drops it from that set.
    pub fn enqueue(&self, task: EvaluationTask) -> bool {
        let mut state = self.lock();

        if state.processing.contains_key(&task.id) || state.pending.iter().any(|t| t.id == task.id)
        {
            tracing::warn!(
                task_id = %task.id,
                evaluation_id = %task.evaluation_id,
                "Task already queued, ignoring duplicate"
            );
            return false;
        }

        state.completed.remove(&task.id);
        state.failed.remove(&task.id);

        tracing::info!(
            task_id = %task.id,
            evaluation_id = %task.evaluation_id,
            "Task enqueued"
        );
        state.pending.push(task.clone());
        self.emit(QueueEvent::Enqueued(task));

        self.dispatch(&mut state);
        true
    }

    /// Move an in-flight task to the completed set and advance the queue.
    pub fn complete(&self, task_id: Uuid) {
        let mut state = self.lock();
        let Some(task) = state.processing.remove(&task_id) else {
            return;
        };

        state.completed.insert(task_id);
        tracing::info!(
            task_id = %task.id,
            evaluation_id = %task.evaluation_id,
            "Task completed"
        );
        self.emit(QueueEvent::Completed(task));

        self.dispatch(&mut state);
    }

    /// Move an in-flight task to the failed set and advance the queue.
    pub fn fail(&self, task_id: Uuid, error: Option<String>) {
        let mut state = self.lock();
        let Some(task) = state.processing.remove(&task_id) else {
            return;
        };

        state.failed.insert(task_id);
        tracing::error!(
            task_id = %task.id,
            evaluation_id = %task.evaluation_id,
            error = error.as_deref().unwrap_or("unknown"),
            "Task failed"
        );
        self.emit(QueueEvent::Failed { task, error });

        self.dispatch(&mut state);
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            pending: state.pending.len(),
            processing: state.processing.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            max_concurrent: self.max_concurrent,
        }
    }

    /// Look up a task that is still pending or in flight.
    pub fn get_task(&self, task_id: Uuid) -> Option<EvaluationTask> {
        let state = self.lock();
        state
            .pending
            .iter()
            .find(|t| t.id == task_id)
            .or_else(|| state.processing.get(&task_id))
            .cloned()
    }

    pub fn is_processing(&self, task_id: Uuid) -> bool {
        self.lock().processing.contains_key(&task_id)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Processing budget for a single task.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, state: &mut QueueState) {
        while state.processing.len() < self.max_concurrent {
            let Some(index) = next_index(&state.pending) else {
                return;
            };
            let task = state.pending.remove(index);
            state.processing.insert(task.id, task.clone());

            tracing::info!(
                task_id = %task.id,
                evaluation_id = %task.evaluation_id,
                processing = state.processing.len(),
                pending = state.pending.len(),
                "Task started processing"
            );
            self.emit(QueueEvent::Processing(task));
        }
    }

    fn emit(&self, event: QueueEvent) {
        // Send only fails once the subscriber is gone, at which point nobody
        // is left to react.
        let _ = self.events.send(event);
    }
}

/// Highest priority wins; the earliest inserted wins a tie.
fn next_index(pending: &[EvaluationTask]) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (index, task) in pending.iter().enumerate() {
        let priority = task.effective_priority();
        if best.map_or(true, |(_, top)| priority > top) {
            best = Some((index, priority));
        }
    }
    best.map(|(index, _)| index)
}
