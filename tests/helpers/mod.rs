//! In-memory collaborators for exercising the evaluation pipeline

use async_trait::async_trait;
use chrono::Utc;
use photo_critique::{
    db::store::EvaluationStore,
    models::evaluation::{Evaluation, EvaluationReport, EvaluationStatus, StorageKind},
    services::{
        evaluation::EvaluationService,
        queue::EvaluationQueue,
        storage::{ImageStorage, ImageStore, StorageError},
        vision::{ChatChoice, ChatRequest, ChatResponse, ChatTransport, ChoiceMessage, VisionClient, VisionError},
    },
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::fixtures::PNG_BYTES;

/// Evaluation records kept in a map.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, Evaluation>>,
    status_writes: Mutex<Vec<(Uuid, EvaluationStatus)>>,
    failing_result_writes: AtomicU32,
    hanging_result_writes: AtomicU32,
    result_writes: AtomicU32,
}

impl MemoryStore {
    /// Insert a pending evaluation and return its id.
    pub fn insert(&self, image_path: &str, storage: StorageKind) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.records.lock().unwrap().insert(
            id,
            Evaluation {
                id,
                user_id: Uuid::new_v4(),
                image_path: image_path.to_string(),
                image_storage_type: storage,
                scores: None,
                text_summary: None,
                status: EvaluationStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: Uuid) -> Option<Evaluation> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn status_writes(&self) -> Vec<(Uuid, EvaluationStatus)> {
        self.status_writes.lock().unwrap().clone()
    }

    /// Make the next `n` result writes fail.
    pub fn fail_result_writes(&self, n: u32) {
        self.failing_result_writes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` result writes never return, like an UPDATE stuck
    /// behind a row lock.
    pub fn hang_result_writes(&self, n: u32) {
        self.hanging_result_writes.store(n, Ordering::SeqCst);
    }

    pub fn result_write_attempts(&self) -> u32 {
        self.result_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Evaluation>, sqlx::Error> {
        Ok(self.get(id))
    }

    async fn update_status(&self, id: Uuid, status: EvaluationStatus) -> Result<(), sqlx::Error> {
        self.status_writes.lock().unwrap().push((id, status));
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = status;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_result(&self, id: Uuid, report: &EvaluationReport) -> Result<(), sqlx::Error> {
        self.result_writes.fetch_add(1, Ordering::SeqCst);
        let hanging = self.hanging_result_writes.load(Ordering::SeqCst);
        if hanging > 0 {
            self.hanging_result_writes.store(hanging - 1, Ordering::SeqCst);
            return std::future::pending().await;
        }
        let failing = self.failing_result_writes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_result_writes.store(failing - 1, Ordering::SeqCst);
            return Err(sqlx::Error::PoolTimedOut);
        }

        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.scores = Some(report.scores);
            record.text_summary = Some(report.summary.clone());
            record.status = EvaluationStatus::Completed;
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Images held in memory, keyed by path.
#[derive(Default)]
pub struct MemoryImages {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImages {
    pub fn with_png(path: &str) -> Self {
        let images = Self::default();
        images
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), PNG_BYTES.to_vec());
        images
    }
}

#[async_trait]
impl ImageStorage for MemoryImages {
    async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!("memory://{path}"))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

/// How the fake provider answers.
pub enum Script {
    /// Answer immediately.
    Reply(&'static str),
    /// Fail the first `n` calls, then answer.
    FailFirst(u32, &'static str),
    /// Answer after a delay.
    Delayed(Duration, &'static str),
    /// Never answer.
    Hang,
}

pub struct ScriptedTransport {
    script: Script,
    calls: AtomicU32,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn reply(content: &str) -> ChatResponse {
    ChatResponse {
        choices: vec![ChatChoice {
            message: Some(ChoiceMessage {
                content: Some(content.to_string()),
            }),
        }],
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn chat_completions(&self, _request: &ChatRequest) -> Result<ChatResponse, VisionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.script {
            Script::Reply(content) => Ok(reply(content)),
            Script::FailFirst(n, _) if call <= *n => Err(VisionError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Script::FailFirst(_, content) => Ok(reply(content)),
            Script::Delayed(delay, content) => {
                tokio::time::sleep(*delay).await;
                Ok(reply(content))
            }
            Script::Hang => std::future::pending().await,
        }
    }
}

/// A wired pipeline with handles on every fake.
pub struct Pipeline {
    pub service: Arc<EvaluationService>,
    pub queue: Arc<EvaluationQueue>,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
}

pub const IMAGE_PATH: &str = "2024/06/01/fog_1717200000.png";

/// Build a pipeline and start the service's event loop.
pub fn start_pipeline(max_concurrent: usize, timeout: Duration, script: Script) -> Pipeline {
    let queue = Arc::new(EvaluationQueue::new(max_concurrent, timeout));
    let store = Arc::new(MemoryStore::default());
    let transport = Arc::new(ScriptedTransport::new(script));
    let images = ImageStore::new(Arc::new(MemoryImages::with_png(IMAGE_PATH)), None);
    let vision = VisionClient::new(transport.clone(), images.clone(), "hunyuan-vision");

    let service = Arc::new(EvaluationService::new(
        queue.clone(),
        Arc::new(vision),
        store.clone(),
        images,
    ));
    service.spawn().expect("fresh queue has no subscriber");

    Pipeline {
        service,
        queue,
        store,
        transport,
    }
}

/// Poll until the record reaches `status`, panicking after `within`.
pub async fn wait_for_status(
    store: &MemoryStore,
    id: Uuid,
    status: EvaluationStatus,
    within: Duration,
) -> Evaluation {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Some(record) = store.get(id) {
            if record.status == status {
                return record;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "evaluation {id} did not reach {status} within {within:?}: {:?}",
            store.get(id).map(|r| r.status)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
