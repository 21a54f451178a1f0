mod config;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::ServerConfig::from_env();

    // Scan failures are not fatal: the server still coordinates playback.
    let catalog = match services::catalog::Catalog::scan(&config.media_dir) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, path = %config.media_dir.display(), "media scan failed; catalog empty");
            services::catalog::Catalog::default()
        }
    };
    catalog.log_summary();

    let port = config.port;
    let state = state::AppState::new(config, catalog);
    tracing::info!(source = %state.coordinator.lock().await.current_source(), "default source set");

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "lockstep server listening");
    axum::serve(listener, app).await.expect("server failed");
}
