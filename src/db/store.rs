use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::evaluation::{Evaluation, EvaluationReport, EvaluationStatus};

/// Evaluation record access needed by the pipeline.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Evaluation>, sqlx::Error>;

    async fn update_status(&self, id: Uuid, status: EvaluationStatus) -> Result<(), sqlx::Error>;

    /// Seven scores, summary and `completed` status in a single write.
    async fn update_result(&self, id: Uuid, report: &EvaluationReport) -> Result<(), sqlx::Error>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgEvaluationStore {
    pool: PgPool,
}

impl PgEvaluationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationStore for PgEvaluationStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Evaluation>, sqlx::Error> {
        queries::get_evaluation(&self.pool, id).await
    }

    async fn update_status(&self, id: Uuid, status: EvaluationStatus) -> Result<(), sqlx::Error> {
        queries::update_evaluation_status(&self.pool, id, status).await
    }

    async fn update_result(&self, id: Uuid, report: &EvaluationReport) -> Result<(), sqlx::Error> {
        queries::update_evaluation_result(&self.pool, id, report).await
    }
}
