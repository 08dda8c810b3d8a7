//! Web server module.

mod handlers;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::scheduler::CommandHandle;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub commands: CommandHandle,
}

/// JSON API server for CarbonTrail.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, commands: CommandHandle) -> Self {
        Self {
            state: AppState {
                config,
                store,
                commands,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            .route("/api/command", post(handlers::handle_command))
            // Observers
            .route("/api/intervals", post(handlers::handle_record_interval))
            .route("/api/signals", post(handlers::handle_live_signal))
            .route("/api/focus", post(handlers::handle_focus))
            .route("/api/tick", post(handlers::handle_tick))
            .route("/api/suspend", post(handlers::handle_suspend))
            // Dashboard
            .route("/api/today", get(handlers::handle_get_today))
            .route("/api/history", get(handlers::handle_get_history))
            .route("/api/rewards", get(handlers::handle_get_rewards))
            .route("/api/streak", get(handlers::handle_get_streak))
            .route("/api/predict", get(handlers::handle_predict))
            // Settings
            .route(
                "/api/region",
                get(handlers::handle_get_region).put(handlers::handle_set_region),
            )
            .route("/api/gamification/advance", post(handlers::handle_advance))
            .route("/api/gamification/rebuild", post(handlers::handle_rebuild))
            .route("/api/gamification/toggle", post(handlers::handle_toggle))
            .route("/api/maintenance", post(handlers::handle_maintenance))
            .route("/status", get(handlers::handle_status))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(64 * 1024)) // 64KB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
