//! Proctoring Agent API Server
//!
//! HTTP surface for the exam UI shell: session control, live status,
//! the end-of-session summary and Prometheus metrics.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fraud_sync::FraudSink;
use media_capture::{AudioTap, CaptureConfig, CaptureError, ImageSequenceSource, MediaDevice, MediaSource};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use proctor::{ProctorConfig, ProctorError, ProctorSession, SessionSnapshot, SessionSummary};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod rate_limit;
mod routes;

use rate_limit::{create_governor_config, RateLimitConfig};

/// State shared by all handlers
pub type SharedState = Arc<RwLock<AppState>>;

/// Application state shared across handlers
pub struct AppState {
    /// Session configuration
    pub config: ProctorConfig,
    /// Camera and microphone provider, opened once per session
    pub source: Arc<Mutex<Box<dyn MediaSource>>>,
    /// Serializes start and stop without holding the state lock
    pub control: Arc<Mutex<()>>,
    /// Backend receiving fraud reports
    pub sink: Option<Arc<dyn FraudSink>>,
    /// Current session, if any
    pub session: Option<ProctorSession>,
    /// Summary of the last stopped session
    pub last_summary: Option<SessionSummary>,
    /// Status left by a start that failed on the camera or microphone
    pub unavailable: Option<SessionSnapshot>,
    /// Prometheus exposition
    pub metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: ProctorConfig,
        source: Box<dyn MediaSource>,
        sink: Option<Arc<dyn FraudSink>>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            source: Arc::new(Mutex::new(source)),
            control: Arc::new(Mutex::new(())),
            sink,
            session: None,
            last_summary: None,
            unavailable: None,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Source used when no camera is configured; every open fails
pub struct UnavailableSource;

impl MediaSource for UnavailableSource {
    fn open(&mut self) -> Result<Box<dyn MediaDevice>, CaptureError> {
        Err(CaptureError::DeviceUnavailable("no camera configured".into()))
    }
}

/// Build the media source described by the capture settings
pub fn media_source(config: &CaptureConfig) -> Box<dyn MediaSource> {
    match &config.image_dir {
        Some(dir) => Box::new(
            ImageSequenceSource::new(dir, config.width, config.height)
                .with_audio(AudioTap::new(config.analyser.clone())),
        ),
        None => {
            warn!("No capture source configured, sessions cannot start");
            Box::new(UnavailableSource)
        }
    }
}

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No monitoring session")]
    NoSession,

    #[error("A monitoring session is still running")]
    SessionActive,

    #[error(transparent)]
    Session(#[from] ProctorError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoSession => StatusCode::NOT_FOUND,
            ApiError::SessionActive => StatusCode::CONFLICT,
            ApiError::Session(ProctorError::SensorUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session_active: bool,
}

fn base_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session/status", get(routes::session::status))
        .route("/api/v1/session/summary", get(routes::session::summary))
        .route("/metrics", get(routes::metrics::render))
}

fn control_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/session/start", post(routes::session::start))
        .route("/api/v1/session/stop", post(routes::session::stop))
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    base_routes()
        .merge(control_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router with per-IP limits on session start and stop.
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router_with_rate_limit(state: SharedState, limits: &RateLimitConfig) -> Router {
    let control = match create_governor_config(limits) {
        Some(config) => control_routes().layer(GovernorLayer { config }),
        None => {
            warn!("Invalid rate limit {:?}, control routes unlimited", limits);
            control_routes()
        }
    };

    base_routes()
        .merge(control)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session_active: state.session.as_ref().is_some_and(|s| s.is_active()),
    })
}

/// Initialize logging; later calls are no-ops
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Run the server
pub async fn run_server(
    addr: &str,
    config: ProctorConfig,
    sink: Option<Arc<dyn FraudSink>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = PrometheusBuilder::new().install_recorder()?;
    let source = media_source(&config.capture);

    let state = Arc::new(RwLock::new(AppState::new(config, source, sink, metrics)));
    let app = create_router_with_rate_limit(state, &RateLimitConfig::default());

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
