//! HTTP API gateway for the Deep Researcher service.
//!
//! Exposes health checks, loader status, research, query suggestion and the
//! upload stub. Only `/research` needs the research capability; every other
//! route answers without touching the loader, so the process stays healthy
//! even when the capability cannot be built.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::{
    Router,
    routing::{get, post},
};
use deepresearch_config::AppConfig;
use deepresearch_loader::ResourceLoader;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

pub use error::{ApiError, ErrorResponse};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub loader: Arc<ResourceLoader>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(loader: Arc<ResourceLoader>) -> SharedState {
        Arc::new(Self { loader })
    }
}

/// Build the Axum router with all routes.
///
/// Layers applied:
/// - Request body size limit (`body_limit` bytes)
/// - Handler panics turned into a 500 `{detail}` response
/// - CORS open to any origin, method and header
/// - HTTP trace logging
pub fn build_router(state: SharedState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/status", get(api::status_handler))
        .route("/research", post(api::research_handler))
        .route("/suggest", post(api::suggest_handler))
        .route("/upload", post(api::upload_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into());
    error!(panic = %message, "Handler panicked");
    ApiError::Internal(format!("handler panicked: {message}")).into_response()
}

/// Loader for the configured research mode. Nothing is constructed yet.
pub fn loader_from_config(config: &AppConfig) -> ResourceLoader {
    let factory = deepresearch_providers::build_from_config(config);
    ResourceLoader::new(factory)
        .with_init_timeout(Duration::from_secs(config.research.init_timeout_secs))
}

/// Start the gateway HTTP server.
///
/// Serves until Ctrl-C, then releases the research capability if it was
/// ever loaded.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.listen_addr();
    let loader = Arc::new(loader_from_config(&config));
    let app = build_router(
        GatewayState::new(Arc::clone(&loader)),
        config.server.body_limit_bytes,
    );

    info!(
        addr = %addr,
        mode = %config.research.mode,
        "Deep Researcher API starting (capability loads on first research request)"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    loader.shutdown();
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl-C; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
