use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use stackr_core::config::AppConfig;
use stackr_core::traits::LlmClient;
use stackr_llm::selection::ModelSelector;

use crate::routes;
use crate::state::AppState;

/// HTTP server built on axum.
pub struct GatewayServer {
    config: AppConfig,
    selector: Arc<ModelSelector>,
    client: Arc<dyn LlmClient>,
}

impl GatewayServer {
    pub fn new(config: AppConfig, selector: Arc<ModelSelector>, client: Arc<dyn LlmClient>) -> Self {
        Self {
            config,
            selector,
            client,
        }
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            selector: self.selector.clone(),
            client: self.client.clone(),
        });

        Router::new()
            .route("/", get(routes::index))
            .route("/health", get(routes::health))
            .route("/api", get(routes::api_info))
            .route("/api/select", get(routes::select_model))
            .route("/api/workflows/bitcoin-news", post(routes::run_bitcoin_news))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(&self.config.server.bind).await?;
        info!(bind = %self.config.server.bind, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Server shut down");
        Ok(())
    }
}
