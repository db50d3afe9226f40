pub mod config;
pub mod error;
pub mod generation;
pub mod metrics;
pub mod validation;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use story_core::{OutputFormat, StoryOrchestrator, StoryRequest};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::generation::GenerationTracker;
use crate::metrics::{AppMetrics, DetailedMetricsResponse, EndpointMetricsResponse, SystemMetrics};
use crate::validation::{validate_illustration_request, validate_story_request};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<StoryOrchestrator>,
    pub generations: Arc<GenerationTracker>,
    pub metrics: AppMetrics,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(orchestrator: StoryOrchestrator, config: ServerConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            generations: Arc::new(GenerationTracker::new()),
            metrics: AppMetrics::new(),
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
            config,
        }
    }
}

#[derive(Deserialize)]
pub struct StoryBody {
    #[serde(flatten)]
    story: StoryRequest,
    #[serde(default)]
    format: OutputFormat,
}

#[derive(Serialize)]
pub struct AudioPayload {
    sample_rate: u32,
    channels: usize,
    frames: usize,
    duration_ms: u64,
    wav_base64: String,
}

#[derive(Serialize)]
pub struct StoryResponse {
    story_id: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<AudioPayload>,
}

#[derive(Deserialize)]
pub struct IllustrationBody {
    story_id: String,
    story_text: String,
}

#[derive(Serialize)]
pub struct IllustrationResponse {
    story_id: String,
    image_url: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    cancelled: bool,
}

/// Build the application router with all middleware attached.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    let cors = match config.cors_allowed_origins.as_deref() {
        Some(allowed) if !allowed.is_empty() => {
            let origins: Vec<axum::http::HeaderValue> = allowed
                .iter()
                .filter_map(|origin| origin.parse::<axum::http::HeaderValue>().ok())
                .collect();
            info!("CORS configured for {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(tower_http::cors::AllowOrigin::list(origins))
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::OPTIONS])
                .allow_headers(tower_http::cors::Any)
        }
        _ => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::OPTIONS])
                .allow_headers(tower_http::cors::Any)
        }
    };

    // One global bucket: every generation spends the same API key.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit_period_ms())
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(GovernorLayer::new(governor_conf))
        .layer(cors)
        .into_inner();

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/story", post(story_endpoint))
        .route("/story/cancel", post(cancel_story_endpoint))
        .route("/illustration", post(illustration_endpoint))
        .route("/illustration/cancel", post(cancel_illustration_endpoint))
        .route("/metrics", get(metrics_endpoint));

    Ok(Router::new()
        .merge(api.clone())   // root paths
        .nest("/api", api)    // /api prefix
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state))
}

async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn story_endpoint(
    State(state): State<AppState>,
    Json(req): Json<StoryBody>,
) -> Result<Json<StoryResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start_time = Instant::now();
    validate_story_request(&req.story)?;

    let attempt = state.generations.begin_story();
    info!(story_id = %attempt.id, format = ?req.format, "story requested");

    // dropped without disarming when the client disconnects
    let guard = attempt.token.drop_guard();
    let outcome = state
        .orchestrator
        .generate(&req.story, req.format, &attempt.token)
        .await;
    guard.disarm();

    let still_current = state.generations.finish_story(&attempt);
    let metrics = &state.metrics.story;
    metrics.record_request(start_time.elapsed().as_millis() as u64);

    let result = match outcome {
        Ok(result) if still_current => result,
        Ok(_) => {
            metrics.record_cancelled();
            return Err(ApiError::Cancelled);
        }
        Err(e) => {
            if e.is_cancelled() {
                metrics.record_cancelled();
            } else {
                metrics.record_error();
            }
            return Err(match ApiError::from(e) {
                ApiError::Synthesis { message, text, .. } => ApiError::Synthesis {
                    message,
                    text,
                    story_id: Some(attempt.id.to_string()),
                },
                other => other,
            });
        }
    };

    let audio = match result.audio.as_deref() {
        Some(buffer) => {
            let wav_base64 = audio_core::encode_wav_base64(buffer)
                .map_err(|e| ApiError::InternalError(format!("WAV encoding error: {e}")))?;
            Some(AudioPayload {
                sample_rate: buffer.sample_rate(),
                channels: buffer.channel_count(),
                frames: buffer.frames(),
                duration_ms: buffer.duration().as_millis() as u64,
                wav_base64,
            })
        }
        None => None,
    };
    state
        .metrics
        .generation
        .record_story(audio.as_ref().map(|a| a.frames));

    info!(
        story_id = %attempt.id,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "story delivered"
    );
    Ok(Json(StoryResponse {
        story_id: attempt.id.to_string(),
        text: result.text,
        audio,
    }))
}

pub async fn cancel_story_endpoint(State(state): State<AppState>) -> Json<CancelResponse> {
    let cancelled = state.generations.cancel_story();
    info!(cancelled, "story cancel requested");
    Json(CancelResponse { cancelled })
}

pub async fn illustration_endpoint(
    State(state): State<AppState>,
    Json(req): Json<IllustrationBody>,
) -> Result<Json<IllustrationResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start_time = Instant::now();
    validate_illustration_request(&req.story_id, &req.story_text)?;
    let story_id = uuid::Uuid::parse_str(&req.story_id)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid story ID: {e}")))?;

    let Some(attempt) = state.generations.begin_illustration(story_id) else {
        return Err(ApiError::Superseded(format!(
            "Story {story_id} is no longer the current story"
        )));
    };

    let guard = attempt.token.drop_guard();
    let outcome = state
        .orchestrator
        .generate_illustration(&req.story_text, &attempt.token)
        .await;
    guard.disarm();

    let still_current = state.generations.finish_illustration(&attempt, story_id);
    let metrics = &state.metrics.illustration;
    metrics.record_request(start_time.elapsed().as_millis() as u64);

    let image = match outcome {
        Ok(image) if still_current => image,
        Ok(_) if attempt.token.is_cancelled() => {
            metrics.record_cancelled();
            return Err(ApiError::Cancelled);
        }
        Ok(_) => {
            metrics.record_cancelled();
            return Err(ApiError::Superseded(format!(
                "Story {story_id} was replaced while drawing"
            )));
        }
        Err(e) => {
            if e.is_cancelled() {
                metrics.record_cancelled();
            } else {
                metrics.record_error();
            }
            return Err(e.into());
        }
    };

    state.metrics.generation.record_illustration();
    Ok(Json(IllustrationResponse {
        story_id: story_id.to_string(),
        image_url: image.0,
    }))
}

pub async fn cancel_illustration_endpoint(State(state): State<AppState>) -> Json<CancelResponse> {
    let cancelled = state.generations.cancel_illustration();
    info!(cancelled, "illustration cancel requested");
    Json(CancelResponse { cancelled })
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    Json(DetailedMetricsResponse {
        timestamp: chrono::Utc::now(),
        system: SystemMetrics {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: system.used_memory() / 1024 / 1024,
            memory_total_mb: system.total_memory() / 1024 / 1024,
            request_count: state.request_count.load(Ordering::Relaxed),
            uptime_seconds: state.started_at.elapsed().as_secs(),
        },
        endpoints: EndpointMetricsResponse {
            story: state.metrics.story.stats(),
            illustration: state.metrics.illustration.stats(),
        },
        generation: state
            .metrics
            .generation
            .snapshot(audio_core::SPEECH_SAMPLE_RATE),
    })
}
