//! HTTP service assembly.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{assets::FormAssets, extract::VisionExtractor, handlers, prelude::*};

/// Cap on multipart bodies. Five phone photos fit comfortably.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared, read-only state for all requests.
#[derive(Clone)]
pub struct AppState {
    /// The template, field list and optional font on disk.
    pub assets: FormAssets,

    /// The vision extraction client.
    pub extractor: Arc<VisionExtractor>,
}

/// Build the API router. The frontend is served separately, so CORS is
/// permissive.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/list-pdf-fields", get(handlers::list_pdf_fields))
        .route("/api/fill-pdf", post(handlers::fill_pdf))
        .route("/api/gemini-autofill", post(handlers::gemini_autofill))
        .route(
            "/api/gemini-autofill-pdf",
            post(handlers::gemini_autofill_pdf),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Error binding port {port}"))?;
    info!("Server running on http://localhost:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Error waiting for shutdown signal: {err}");
    }
}
