use axum::routing::{get, post};
use axum::Router;
use photo_critique::{
    app_state::AppState,
    config::AppConfig,
    db::{self, store::PgEvaluationStore},
    routes,
    services::{
        evaluation::EvaluationService,
        queue::EvaluationQueue,
        storage::{ImageStorage, ImageStore, LocalStorage, ObjectStorage},
        vision::{HttpChatTransport, VisionClient},
    },
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing photo-critique server");

    let prometheus_handle =
        Arc::new(routes::metrics::install_recorder().expect("Failed to install Prometheus recorder"));

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Image storage: local uploads always, object storage when configured
    let object_storage: Option<Arc<dyn ImageStorage>> = match config.object_storage() {
        Some(cos) => {
            tracing::info!(bucket = cos.bucket, "Initializing object storage client");
            let storage = ObjectStorage::new(
                cos.bucket,
                cos.region,
                cos.endpoint,
                cos.access_key,
                cos.secret_key,
            )
            .expect("Failed to initialize object storage client");
            Some(Arc::new(storage) as Arc<dyn ImageStorage>)
        }
        None => {
            tracing::warn!("Object storage not configured, only local images can be evaluated");
            None
        }
    };
    let images = ImageStore::new(Arc::new(LocalStorage::new(&config.upload_dir)), object_storage);

    tracing::info!(model = %config.ai_model, "Initializing vision AI client");
    let transport = HttpChatTransport::new(
        &config.ai_base_url,
        &config.ai_api_key,
        config.ai_request_timeout(),
    )
    .expect("Failed to initialize vision AI transport");
    let vision = VisionClient::new(Arc::new(transport), images.clone(), config.ai_model.clone());

    let queue = Arc::new(EvaluationQueue::new(
        config.queue_max_concurrent,
        config.queue_timeout(),
    ));
    tracing::info!(
        max_concurrent = queue.max_concurrent(),
        timeout_secs = config.queue_timeout_secs,
        "Evaluation queue ready"
    );

    let evaluations = Arc::new(EvaluationService::new(
        queue,
        Arc::new(vision),
        Arc::new(PgEvaluationStore::new(db_pool.clone())),
        images,
    ));
    evaluations
        .spawn()
        .expect("Evaluation queue already has a subscriber");

    let state = AppState::new(db_pool, evaluations);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/evaluations/{id}",
            get(routes::evaluations::get_evaluation),
        )
        .route(
            "/api/v1/evaluations/{id}/submit",
            post(routes::evaluations::submit_evaluation),
        )
        .route("/api/v1/queue/status", get(routes::evaluations::queue_status))
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
