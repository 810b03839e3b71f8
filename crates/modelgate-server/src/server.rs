//! HTTP server implementation using Axum.

use crate::auth::require_api_key;
use crate::handler::handle_health;
use crate::handlers::{
    handle_add_gallery, handle_apply, handle_available, handle_delete, handle_galleries,
    handle_job_status, handle_jobs, handle_remove_gallery,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use modelgate_core::GalleryService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub service: Arc<GalleryService>,
    /// Accepted bearer keys; empty means the API is open.
    pub api_keys: Vec<String>,
}

/// Build the gallery API router. `/health` is never behind the key check.
pub fn router(service: Arc<GalleryService>) -> Router {
    let api_keys = service.config().api_keys.clone();
    let state = Arc::new(AppState { service, api_keys });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gallery_api = Router::new()
        .route("/models/apply", post(handle_apply))
        .route("/models/delete/:name", post(handle_delete))
        .route("/models/available", get(handle_available))
        .route(
            "/models/galleries",
            get(handle_galleries)
                .post(handle_add_gallery)
                .delete(handle_remove_gallery),
        )
        .route("/models/jobs", get(handle_jobs))
        .route("/models/jobs/:uuid", get(handle_job_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .merge(gallery_api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    service: Arc<GalleryService>,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    let app = router(service);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
