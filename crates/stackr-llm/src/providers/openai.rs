use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stackr_core::config::ProviderConfig;
use stackr_core::error::{Result, StackrError};
use stackr_core::traits::LlmClient;

use super::presets::{endpoint_for, responses_endpoint_for};
use crate::catalog::{ModelCatalog, ModelDescriptor};

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// OpenAI-compatible client. Works with OpenAI, xAI Grok, and Venice.
///
/// Web search goes through chat completions for `*-search-preview` models
/// and through the OpenAI Responses API with the `web_search_preview` tool
/// for everything else.
pub struct OpenAiCompatibleClient {
    http: Client,
}

impl OpenAiCompatibleClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    /// POST `body` and return the raw response text of a 2xx reply.
    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        config: &ProviderConfig,
    ) -> Result<String> {
        let mut req = self
            .http
            .post(url)
            .timeout(Duration::from_millis(config.timeout_ms))
            .json(body);

        if let Some(api_key) = &config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| StackrError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown");
            let text = response.text().await.unwrap_or_default();
            let message = if text.is_empty() {
                reason.to_string()
            } else {
                format!("{} {}", reason, text)
            };
            return Err(StackrError::http(status.as_u16(), message));
        }

        response
            .text()
            .await
            .map_err(|e| StackrError::transport(e.to_string()))
    }
}

impl Default for OpenAiCompatibleClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<WebSearchOptions>,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct WebSearchOptions {}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    tools: Vec<ResponsesTool>,
}

#[derive(Serialize)]
struct ResponsesTool {
    #[serde(rename = "type")]
    kind: &'static str,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize, Debug)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize, Debug)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Whether the configured model is a search chat model. Unknown models are
/// matched on the `-search-preview` suffix.
fn is_search_model(config: &ProviderConfig) -> bool {
    ModelCatalog::builtin()
        .find(config.provider, &config.model_id)
        .map_or_else(
            || config.model_id.ends_with("-search-preview"),
            ModelDescriptor::is_search_model,
        )
}

fn build_request<'a>(
    prompt: &'a str,
    config: &'a ProviderConfig,
    web_search: bool,
) -> ChatRequest<'a> {
    ChatRequest {
        model: &config.model_id,
        messages: vec![OaiMessage {
            role: "user",
            content: prompt,
        }],
        max_tokens: MAX_TOKENS,
        // Search models reject sampling parameters
        temperature: (!is_search_model(config)).then_some(TEMPERATURE),
        web_search_options: web_search.then_some(WebSearchOptions {}),
        stream: false,
    }
}

fn build_responses_request<'a>(prompt: &'a str, config: &'a ProviderConfig) -> ResponsesRequest<'a> {
    ResponsesRequest {
        model: &config.model_id,
        input: prompt,
        tools: vec![ResponsesTool {
            kind: "web_search_preview",
        }],
    }
}

/// Pull the first choice's text out of a chat completions body.
pub(crate) fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| StackrError::transport(format!("Invalid response format from API: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| StackrError::transport("Invalid response format from API"))
}

/// Concatenate the `output_text` parts of every message item in a Responses
/// API body. Search-call items are skipped.
pub(crate) fn parse_response_output(body: &str) -> Result<String> {
    let parsed: ResponsesResponse = serde_json::from_str(body)
        .map_err(|e| StackrError::transport(format!("Invalid response format from API: {}", e)))?;

    let mut found = false;
    let mut text = String::new();
    for item in parsed.output.iter().filter(|i| i.kind == "message") {
        for part in item.content.iter().filter(|c| c.kind == "output_text") {
            found = true;
            text.push_str(part.text.as_deref().unwrap_or_default());
        }
    }
    if found {
        Ok(text)
    } else {
        Err(StackrError::transport("Invalid response format from API"))
    }
}

impl LlmClient for OpenAiCompatibleClient {
    fn query<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let url = endpoint_for(config.provider, config.base_url.as_deref());
            let body = build_request(prompt, config, false);

            debug!(provider = %config.provider, model = %config.model_id, "Sending chat completion");
            let text = self.post_json(&url, &body, config).await?;
            parse_completion(&text)
        })
    }

    fn query_with_web_search<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if is_search_model(config) {
                let url = endpoint_for(config.provider, config.base_url.as_deref());
                let body = build_request(prompt, config, true);

                debug!(provider = %config.provider, model = %config.model_id, "Sending search chat completion");
                let text = self.post_json(&url, &body, config).await?;
                return parse_completion(&text);
            }

            let url = responses_endpoint_for(config.provider, config.base_url.as_deref())
                .ok_or_else(|| {
                    StackrError::UnsupportedProvider(format!("{} (web search)", config.provider))
                })?;
            let body = build_responses_request(prompt, config);

            debug!(provider = %config.provider, model = %config.model_id, "Sending web search response request");
            let text = self.post_json(&url, &body, config).await?;
            parse_response_output(&text)
        })
    }
}
