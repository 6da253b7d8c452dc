use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::handlers::{complete_upload, health_check, init_upload, upload_chunk};
use crate::media::serve_media;
use crate::middleware::add_response_headers;
use crate::state::AppState;
use crate::utils::shutdown_signal;

// headroom for multipart framing and the text fields around a chunk
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

fn upload_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload/init", post(init_upload))
        .route("/upload/chunk", post(upload_chunk))
        .route("/upload/complete", post(complete_upload))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// build the application router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    let body_limit = state
        .limits
        .max_chunk_size_bytes()
        .saturating_add(MULTIPART_OVERHEAD);
    tracing::debug!("Building router with request body limit: {} bytes", body_limit);

    // the original browser client posts under /api
    Router::new()
        .merge(upload_routes())
        .nest("/api", upload_routes())
        .route("/media/:file_id", get(serve_media))
        .route("/health", get(health_check))
        .fallback_service(ServeDir::new(&config.static_dir).append_index_html_on_directories(true))
        .layer(axum::middleware::from_fn(add_response_headers))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// serve until a shutdown signal arrives
pub async fn start_server(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!("Listener bound to {}", addr);

    tracing::info!("Server running and ready to accept connections");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true)
    .await
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config, state: &AppState) {
    let limits = &state.limits;
    tracing::info!("chunk-relay starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 LISTENING: http://{}:{}", config.host, config.port);
    tracing::info!("📁 Finished files: {:?}", state.layout.files_root());
    tracing::info!("🧩 Chunk staging: {:?}", state.layout.staging_root());
    tracing::info!(
        "📏 Max file {} MB, chunks {}/{}/{} MB (min/default/max), concurrency {}",
        limits.max_file_size_mb,
        limits.min_chunk_size_mb,
        limits.default_chunk_size_mb,
        limits.max_chunk_size_mb,
        limits.max_concurrency
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
