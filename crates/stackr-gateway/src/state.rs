use std::sync::Arc;

use stackr_core::config::AppConfig;
use stackr_core::traits::LlmClient;
use stackr_llm::selection::ModelSelector;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: AppConfig,
    pub selector: Arc<ModelSelector>,
    pub client: Arc<dyn LlmClient>,
}
