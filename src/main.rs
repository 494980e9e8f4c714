// Main entry point for the pest detection and recommendation backend

use harvesthub::{
    core::{Config, LanguageCode},
    services::{
        classifier::ClassifierService,
        recommendation::{supported_languages, GenerationClient, JsonFileStore, RecommendationResolver},
    },
    middleware::{BackendHealth, BackendHealthConfig},
    utils::Metrics,
};

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

type AppResolver = RecommendationResolver<GenerationClient, JsonFileStore>;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    classifier: Arc<ClassifierService>,
    resolver: Arc<AppResolver>,
    backend_health: BackendHealth,
    metrics: Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().expect("Failed to load configuration"));

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "harvesthub={},ort=off",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== HARVESTHUB PEST DETECTION BACKEND ===");

    // Initialize metrics
    let metrics = Metrics::new();

    // Model gateway: load once, share for the process lifetime
    let classifier = Arc::new(ClassifierService::new(&config, Some(metrics.clone())));
    if !classifier.is_ready() {
        warn!("Classifier gateway is not ready; /predict will fail fast");
    }

    // Remedy store with debounced persistence
    let store = Arc::new(
        JsonFileStore::open(
            &config.cache.cache_dir,
            config.cache.max_entries,
            Some(Duration::from_secs(config.cache.save_interval_seconds)),
            Some(metrics.clone()),
        )
        .await
        .context("Failed to open remedy cache store")?,
    );

    // Generation backend client behind a failure gate
    let backend_health = BackendHealth::new(BackendHealthConfig {
        failure_threshold: config.generation.failure_threshold,
        cooldown: Duration::from_secs(config.generation.cooldown_seconds),
    });
    if config.generation.api_key.is_none() {
        warn!("GEMINI_API_KEY not set; remedies will come from cache and canned fallbacks only");
    }
    let generator = Arc::new(
        GenerationClient::new(&config, backend_health.clone(), Some(metrics.clone()))
            .context("Failed to create generation client")?,
    );

    let resolver = Arc::new(RecommendationResolver::new(
        &config,
        generator,
        store,
        Some(metrics.clone()),
    ));

    let state = AppState {
        config: config.clone(),
        classifier,
        resolver,
        backend_health,
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create router with monitoring endpoints
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/languages", get(languages))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/predict", post(predict_default))
        .route("/predict/:lang", post(predict_with_language))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.upload.max_file_size))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /               - Root endpoint");
    info!("  GET  /health         - Detailed health check");
    info!("  GET  /status         - Quick status");
    info!("  GET  /languages      - Supported languages");
    info!("  GET  /metrics        - Prometheus metrics");
    info!("  GET  /stats          - Detailed statistics");
    info!("  POST /predict        - Classify image, English remedy");
    info!("  POST /predict/:lang  - Classify image, localized remedy");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/");
    Json(serde_json::json!({
        "status": "success",
        "message": "HarvestHub Pest Detection API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "Multi-language pest detection",
            "AI-powered recommendations",
            "Remedy caching",
            format!("{} Indian languages supported", LanguageCode::ALL.len()),
        ],
    }))
}

/// Detailed health check: model readiness plus generation gate state
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    let model = state.classifier.status();
    Json(serde_json::json!({
        "status": "success",
        "health": {
            "model_loaded": model.ready,
            "model_backend": model.backend,
            "total_classes": model.total_classes,
            "generation_backend": state.backend_health.snapshot(),
            "supported_languages": LanguageCode::ALL.len(),
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/status");
    Json(serde_json::json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

/// Supported language listing: code → display name
async fn languages(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/languages");
    let langs: serde_json::Map<String, serde_json::Value> = supported_languages()
        .into_iter()
        .map(|(code, name)| (code.to_string(), serde_json::Value::from(name)))
        .collect();
    Json(serde_json::json!({
        "status": "success",
        "languages": langs,
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

async fn predict_default(
    state: State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    predict(state, "en".to_string(), multipart).await
}

async fn predict_with_language(
    state: State<AppState>,
    Path(lang): Path<String>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    predict(state, lang, multipart).await
}

/// Classify an uploaded image and resolve a localized remedy
///
/// # Request Format:
/// - multipart/form-data
/// - Field "file": image file (PNG/JPEG/GIF/BMP)
///
/// # Response:
/// Combined prediction + recommendation JSON
async fn predict(
    State(state): State<AppState>,
    lang: String,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.metrics.record_endpoint_request("/predict");

    // Reject unsupported languages before any work happens
    let code = LanguageCode::parse(&lang).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!(
                "Unsupported language code: {}. Supported: {}",
                lang,
                LanguageCode::ALL
                    .iter()
                    .map(|l| l.code())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )
    })?;

    // Pull the image out of the multipart form
    let mut image_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name().unwrap_or("") != "file" {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        validate_extension(&filename, &state.config.upload.allowed_extensions)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;

        if data.len() > state.config.upload.max_file_size {
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "File exceeds {} byte limit",
                    state.config.upload.max_file_size
                ),
            ));
        }

        image_bytes = Some(data.to_vec());
        break;
    }

    let image_bytes = image_bytes
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "No image file provided".to_string()))?;

    // Stage one: classification
    let prediction = state
        .classifier
        .classify_bytes(&image_bytes)
        .await
        .map_err(|e| classify_error_response(&state, e))?;

    // Stage two: remedy resolution (never fails for a supported language)
    let resolved = state
        .resolver
        .resolve(&prediction.label, code.code())
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "prediction": prediction,
        "recommendation": resolved.record,
        "language": {
            "code": code.code(),
            "name": code.display_name(),
        },
        "source": resolved.source,
        "timestamp": Utc::now(),
    })))
}

fn validate_extension(
    filename: &str,
    allowed: &[String],
) -> Result<(), (StatusCode, String)> {
    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    if filename.contains('.') && allowed.iter().any(|a| a == &extension) {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Invalid file type. Supported: {}",
                allowed.join(", ").to_uppercase()
            ),
        ))
    }
}

fn classify_error_response(
    state: &AppState,
    error: harvesthub::ClassifierError,
) -> (StatusCode, String) {
    use harvesthub::ClassifierError;

    match error {
        ClassifierError::DecodeFailed(_) => {
            state.metrics.record_decode_failure();
            (
                StatusCode::BAD_REQUEST,
                "Uploaded file is not a decodable image".to_string(),
            )
        }
        ClassifierError::NotReady => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Classification model is not available".to_string(),
        ),
        e => {
            error!("Classification failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Classification failed".to_string(),
            )
        }
    }
}
