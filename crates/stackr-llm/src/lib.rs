pub mod catalog;
pub mod providers;
pub mod retry;
pub mod selection;

use stackr_core::traits::LlmClient;
use stackr_core::types::Provider;

pub use catalog::{Capabilities, ModelCatalog, ModelDescriptor, Speed, ToolSupport};
pub use providers::openai::OpenAiCompatibleClient;
pub use retry::RetryingClient;
pub use selection::{select_optimal_model, Fallback, ModelSelector, Selection};

/// Create an LLM client for the given provider.
pub fn create_client(provider: Provider) -> Box<dyn LlmClient> {
    match provider {
        // Every supported provider speaks the OpenAI chat completions dialect
        Provider::OpenAi | Provider::Grok | Provider::Venice => {
            Box::new(OpenAiCompatibleClient::new())
        }
    }
}
