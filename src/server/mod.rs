//! HTTP surface of the request logger.

use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::store::RecordStore;

pub mod client_ip;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod routes;

pub use client_ip::{normalize_ip, resolve_client_ip, ClientIp};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
}

impl AppState {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Build the router with every logger endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::dashboard))
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .route("/export.json", get(routes::export))
        .route("/clear", get(routes::clear_redirect))
        .route("/_clear", post(routes::clear_json))
        .route("/page", post(routes::capture_page))
        .route("/all", post(routes::capture_all))
        .route("/page/{id}", delete(routes::delete_page))
        .route("/all/{id}", delete(routes::delete_all))
        .route("/{segment}", get(routes::capture_hit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Request logger server.
pub struct LoggerServer {
    config: ServerConfig,
}

impl LoggerServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Load the store and start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let store_config = self.config.store.clone();
        let store = tokio::task::spawn_blocking(move || RecordStore::load(store_config)).await?;
        let app = build_router(AppState::new(store));

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("Request logger listening on {}", self.config.bind_addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
