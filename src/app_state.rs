use sqlx::PgPool;
use std::sync::Arc;

use crate::services::evaluation::EvaluationService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub evaluations: Arc<EvaluationService>,
}

impl AppState {
    pub fn new(db: PgPool, evaluations: Arc<EvaluationService>) -> Self {
        Self { db, evaluations }
    }
}
