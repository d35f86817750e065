use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::evaluation::EvaluationStatus;
use crate::models::submission::{EvaluationResponse, SubmitResponse};
use crate::services::evaluation::ServiceError;
use crate::services::queue::QueueStatus;

/// POST /api/v1/evaluations/{id}/submit — queue an uploaded photo for critique.
pub async fn submit_evaluation(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SubmitResponse>), StatusCode> {
    match state.evaluations.submit_evaluation(evaluation_id).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                evaluation_id,
                status: EvaluationStatus::Processing,
                message: "Evaluation queued for processing".to_string(),
            }),
        )),
        Err(ServiceError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(ServiceError::AlreadyQueued(_)) => Err(StatusCode::CONFLICT),
        Err(e) => {
            tracing::error!(evaluation_id = %evaluation_id, error = %e, "Failed to submit evaluation");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/v1/evaluations/{id} — poll an evaluation's status and result.
pub async fn get_evaluation(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
) -> Result<Json<EvaluationResponse>, StatusCode> {
    let evaluation = queries::get_evaluation(&state.db, evaluation_id)
        .await
        .map_err(|e| {
            tracing::error!(evaluation_id = %evaluation_id, error = %e, "Failed to load evaluation");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(evaluation.into()))
}

/// GET /api/v1/queue/status — evaluation queue counts.
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.evaluations.queue_status())
}
