use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the pipeline metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "evaluations_submitted_total",
        "Evaluations handed to the queue"
    );
    metrics::describe_counter!(
        "evaluations_completed_total",
        "Evaluations that finished with a stored critique"
    );
    metrics::describe_counter!(
        "evaluations_failed_total",
        "Evaluations that failed or timed out"
    );
    metrics::describe_histogram!(
        "evaluation_processing_seconds",
        "Time from dispatch to terminal status"
    );
    metrics::describe_gauge!("evaluation_queue_pending", "Evaluations waiting for a slot");
    metrics::describe_gauge!("evaluation_queue_processing", "Evaluations in flight");

    Ok(handle)
}

/// GET /metrics — Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
