use serde::Serialize;
use uuid::Uuid;

use crate::models::evaluation::{Evaluation, EvaluationScores, EvaluationStatus};

/// Response after handing an evaluation to the queue.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub evaluation_id: Uuid,
    pub status: EvaluationStatus,
    pub message: String,
}

/// Response for polling a single evaluation.
#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub id: Uuid,
    pub status: EvaluationStatus,
    pub scores: Option<EvaluationScores>,
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Evaluation> for EvaluationResponse {
    fn from(evaluation: Evaluation) -> Self {
        Self {
            id: evaluation.id,
            status: evaluation.status,
            scores: evaluation.scores,
            summary: evaluation.text_summary,
            created_at: evaluation.created_at.to_rfc3339(),
            updated_at: evaluation.updated_at.to_rfc3339(),
        }
    }
}
