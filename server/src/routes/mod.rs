//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the control WebSocket, the catalog API, the clock
//! endpoint and the static media tree. Every route is CORS-open: players run
//! on arbitrary devices and origins.

pub mod media;
pub mod timesync;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let media_dir = ServeDir::new(&state.config.media_dir);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/timesync", post(timesync::timesync))
        .route("/api/media", get(media::catalog))
        .route("/api/media/projects", get(media::list_projects))
        .route("/api/media/projects/{project}", get(media::get_project))
        .route("/api/media/thumbnails", get(media::thumbnails))
        .route("/api/media/projects/{project}/{media_type}", get(media::get_media))
        .route(
            "/api/media/projects/{project}/{media_type}/{subfolder}",
            get(media::get_media_subfolder),
        )
        .route("/healthz", get(healthz))
        .nest_service("/media", media_dir)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
