use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use stackr_agent::BitcoinNewsWorkflow;
use stackr_core::types::{BudgetTier, Priority, Provider, TaskType};

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "stackr",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Stackr workflow service",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api",
            "select": "/api/select",
            "bitcoin_news": "/api/workflows/bitcoin-news",
        }
    }))
}

// GET /api
pub async fn api_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let providers: Vec<&str> = state
        .config
        .available_providers()
        .iter()
        .map(|p| p.as_str())
        .collect();
    Json(json!({
        "message": "Stackr API",
        "features": [
            "Model selection by task, budget, and priority",
            "Bitcoin news analysis workflow",
        ],
        "providers": providers,
        "catalog_version": state.selector.catalog().version,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SelectQuery {
    pub task: String,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Comma-separated provider names. Omit to use detected providers.
    #[serde(default)]
    pub provider: Option<String>,
}

// GET /api/select?task=..&budget=..&priority=..&provider=..
pub async fn select_model(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SelectQuery>,
) -> Result<Json<Value>, ApiError> {
    let bad_request = |e: stackr_core::StackrError| api_error(StatusCode::BAD_REQUEST, e);

    let task: TaskType = q.task.parse().map_err(bad_request)?;
    let budget = match q.budget.as_deref() {
        Some(b) => b.parse::<BudgetTier>().map_err(bad_request)?,
        None => state.config.selection.budget,
    };
    let priority = match q.priority.as_deref() {
        Some(p) => p.parse::<Priority>().map_err(bad_request)?,
        None => state.config.selection.priority,
    };
    let providers = match q.provider.as_deref() {
        Some(list) => Some(
            list.split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse::<Provider>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(bad_request)?,
        ),
        None => None,
    };

    let selection = state
        .selector
        .select(task, providers.as_deref(), budget, priority);
    Ok(Json(json!(selection)))
}

// POST /api/workflows/bitcoin-news
pub async fn run_bitcoin_news(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let workflow = BitcoinNewsWorkflow::new(
        &state.config,
        state.client.clone(),
        state.selector.clone(),
    )
    .map_err(|e| {
        error!(error = %e, "Cannot start Bitcoin news workflow");
        api_error(StatusCode::BAD_GATEWAY, e)
    })?;

    match workflow.run().await {
        Ok(report) => {
            info!(run_id = %report.run_id, "Bitcoin news workflow finished");
            Ok(Json(json!(report)))
        }
        Err(e) => {
            error!(error = %e, "Bitcoin news workflow failed");
            Err(api_error(StatusCode::BAD_GATEWAY, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackr_llm::catalog::ModelCatalog;
    use stackr_llm::selection::ModelSelector;
    use stackr_test_utils::{config_with_providers, MockLlmClient};

    fn state(mock: MockLlmClient, providers: &[Provider]) -> Arc<AppState> {
        let config = config_with_providers(providers);
        let selector = ModelSelector::new(Arc::new(ModelCatalog::builtin().clone()))
            .with_detected_providers(config.available_providers());
        Arc::new(AppState {
            config,
            selector: Arc::new(selector),
            client: Arc::new(mock),
        })
    }

    fn query(task: &str, budget: Option<&str>, priority: Option<&str>, provider: Option<&str>) -> SelectQuery {
        SelectQuery {
            task: task.to_string(),
            budget: budget.map(String::from),
            priority: priority.map(String::from),
            provider: provider.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "stackr");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_api_lists_detected_providers() {
        let st = state(MockLlmClient::new(), &[Provider::Grok]);
        let Json(body) = api_info(State(st)).await;
        assert_eq!(body["providers"], json!(["grok"]));
        assert!(body["catalog_version"].is_string());
    }

    #[tokio::test]
    async fn test_select_with_explicit_provider() {
        let st = state(MockLlmClient::new(), &[Provider::OpenAi]);
        let Json(body) = select_model(
            State(st),
            Query(query("code_generation", Some("budget"), Some("cost"), Some("openai"))),
        )
        .await
        .unwrap();
        assert_eq!(body["model"]["model_id"], "gpt-4o-mini");
        assert!(body["fallback"].is_null());
    }

    #[tokio::test]
    async fn test_select_uses_detected_providers() {
        let st = state(MockLlmClient::new(), &[Provider::Venice]);
        let Json(body) = select_model(State(st), Query(query("reasoning", None, Some("speed"), None)))
            .await
            .unwrap();
        assert_eq!(body["model"]["provider"], "venice");
    }

    #[tokio::test]
    async fn test_select_rejects_bad_values() {
        let st = state(MockLlmClient::new(), &[Provider::OpenAi]);
        let (status, Json(body)) =
            select_model(State(st.clone()), Query(query("poetry", None, None, None)))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("poetry"));

        let (status, _) = select_model(
            State(st),
            Query(query("analytics", None, None, Some("openai,anthropic"))),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bitcoin_news_success() {
        let mock = MockLlmClient::new()
            .with_response(Provider::OpenAi, "Bitcoin breaks record")
            .with_response(
                Provider::OpenAi,
                "```json\n{\"analysis\":\"neutral\",\"reasoning\":\"Mixed signals\"}\n```",
            )
            .with_response(Provider::Grok, "Price hit a new high.");
        let st = state(mock, &[Provider::OpenAi, Provider::Grok]);

        let Json(body) = run_bitcoin_news(State(st)).await.unwrap();
        assert_eq!(body["headline"], "Bitcoin breaks record");
        assert_eq!(body["sentiment"]["analysis"], "neutral");
        assert_eq!(body["steps"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bitcoin_news_failure_is_bad_gateway() {
        let mock = MockLlmClient::new()
            .with_error(Provider::OpenAi, stackr_core::StackrError::http(500, "down"));
        let st = state(mock, &[Provider::OpenAi, Provider::Grok]);

        let (status, Json(body)) = run_bitcoin_news(State(st)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_bitcoin_news_needs_credentials() {
        let st = state(MockLlmClient::new(), &[Provider::OpenAi]);
        let (status, Json(body)) = run_bitcoin_news(State(st)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Provider grok is not configured");
    }
}
