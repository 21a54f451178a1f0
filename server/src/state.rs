//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! coordinator sits behind one mutex: every connection event and command
//! locks it for the duration of its mutation and broadcast, which serializes
//! them. The catalog is scanned once at startup and never mutated.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::services::catalog::Catalog;
use crate::services::coordinator::Coordinator;

/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Mutex<Coordinator>>,
    pub catalog: Arc<Catalog>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build state around a scanned catalog. The initial source is the
    /// catalog's default.
    #[must_use]
    pub fn new(config: ServerConfig, catalog: Catalog) -> Self {
        let coordinator = Coordinator::new(catalog.default_source(), config.play_lead_ms, config.default_video.clone());
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            catalog: Arc::new(catalog),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
