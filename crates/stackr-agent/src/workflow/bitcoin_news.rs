//! Bitcoin news pipeline: find the latest headline (OpenAI), summarize it
//! (Grok), then classify the summary's market sentiment (OpenAI).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stackr_core::config::{AppConfig, ProviderConfig};
use stackr_core::error::{Result, StackrError};
use stackr_core::traits::LlmClient;
use stackr_core::types::{BudgetTier, Priority, Provider, TaskType};
use stackr_llm::selection::ModelSelector;

use super::runner::{NodeHandler, StepRecord, WorkflowRunner};
use crate::graph::Graph;

pub const WEB_SEARCH: &str = "web_search";
pub const SUMMARIZE: &str = "summarize";
pub const SENTIMENT: &str = "sentiment";

/// Node ids in execution order.
pub const STEPS: [&str; 3] = [WEB_SEARCH, SUMMARIZE, SENTIMENT];

pub const WEB_SEARCH_PROMPT: &str =
    "Find the latest Bitcoin news headline. Return only the headline text.";

pub fn summarize_prompt(headline: &str) -> String {
    format!("Summarize this Bitcoin news headline: \"{}\"", headline)
}

pub fn sentiment_prompt(summary: &str) -> String {
    format!(
        "Analyze the sentiment of this Bitcoin news summary: \"{}\". \
         Respond in JSON: {{ \"analysis\": \"bullish\" | \"bearish\" | \"neutral\", \
         \"reasoning\": \"string\" }}",
        summary
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub analysis: SentimentLabel,
    pub reasoning: String,
}

impl Sentiment {
    /// Parse a model reply, tolerating a surrounding Markdown code fence.
    pub fn parse(response: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Raw {
            analysis: String,
            reasoning: String,
        }

        let invalid = || StackrError::InvalidOutput("Invalid sentiment analysis format".to_string());

        let body = strip_code_fence(response);
        let raw: Raw = serde_json::from_str(body).map_err(|_| invalid())?;
        let analysis = match raw.analysis.trim().to_lowercase().as_str() {
            "bullish" => SentimentLabel::Bullish,
            "bearish" => SentimentLabel::Bearish,
            "neutral" => SentimentLabel::Neutral,
            _ => return Err(invalid()),
        };
        Ok(Self {
            analysis,
            reasoning: raw.reasoning,
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"));
    match inner {
        Some(rest) => rest.trim().trim_end_matches("```").trim(),
        None => trimmed,
    }
}

/// State threaded through the three steps.
#[derive(Debug, Clone, Serialize)]
pub struct BitcoinNewsState {
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Steps that reached their model, in order.
    pub executed: Vec<String>,
}

impl BitcoinNewsState {
    pub fn new() -> Self {
        Self {
            headline: None,
            summary: None,
            sentiment: None,
            started_at: Utc::now(),
            finished_at: None,
            executed: Vec::new(),
        }
    }

    fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.headline.is_none() {
            missing.push("headline".to_string());
        }
        if self.summary.is_none() {
            missing.push("summary".to_string());
        }
        if self.sentiment.is_none() {
            missing.push("sentiment".to_string());
        }
        missing
    }
}

impl Default for BitcoinNewsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Final result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct BitcoinNewsReport {
    pub run_id: String,
    pub headline: String,
    pub summary: String,
    pub sentiment: Sentiment,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub steps: Vec<StepRecord>,
}

/// What a step needs to reach its model.
struct StepModel {
    client: Arc<dyn LlmClient>,
    selector: Arc<ModelSelector>,
    provider: ProviderConfig,
    task: TaskType,
    budget: BudgetTier,
    priority: Priority,
    /// Route the prompt through the provider's live web search.
    web_search: bool,
}

impl StepModel {
    async fn ask(&self, step: &str, prompt: &str) -> Result<String> {
        let selection = self.selector.select(
            self.task,
            Some(&[self.provider.provider]),
            self.budget,
            self.priority,
        );
        if selection.is_fallback() {
            warn!(
                step,
                model = %selection.model.model_id,
                fallback = ?selection.fallback,
                "No model met every constraint, using fallback"
            );
        }
        let config = self.provider.with_model(selection.model.model_id);
        info!(
            step,
            provider = %config.provider,
            model = %config.model_id,
            web_search = self.web_search,
            "Querying model"
        );
        if self.web_search {
            self.client.query_with_web_search(prompt, &config).await
        } else {
            self.client.query(prompt, &config).await
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

struct WebSearchStep(StepModel);

impl NodeHandler<BitcoinNewsState> for WebSearchStep {
    fn handle<'a>(&'a self, state: &'a mut BitcoinNewsState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let response = self.0.ask(WEB_SEARCH, WEB_SEARCH_PROMPT).await?;
            state.executed.push(WEB_SEARCH.to_string());
            state.headline = non_empty(response);
            if state.headline.is_none() {
                warn!(step = WEB_SEARCH, "Model returned an empty headline");
            }
            Ok(())
        })
    }
}

struct SummarizeStep(StepModel);

impl NodeHandler<BitcoinNewsState> for SummarizeStep {
    fn handle<'a>(&'a self, state: &'a mut BitcoinNewsState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(headline) = state.headline.as_deref() else {
                warn!(step = SUMMARIZE, "Skipping: headline is missing");
                return Ok(());
            };
            let response = self.0.ask(SUMMARIZE, &summarize_prompt(headline)).await?;
            state.executed.push(SUMMARIZE.to_string());
            state.summary = non_empty(response);
            if state.summary.is_none() {
                warn!(step = SUMMARIZE, "Model returned an empty summary");
            }
            Ok(())
        })
    }
}

struct SentimentStep(StepModel);

impl NodeHandler<BitcoinNewsState> for SentimentStep {
    fn handle<'a>(&'a self, state: &'a mut BitcoinNewsState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(summary) = state.summary.as_deref() else {
                warn!(step = SENTIMENT, "Skipping: summary is missing");
                return Ok(());
            };
            let response = self.0.ask(SENTIMENT, &sentiment_prompt(summary)).await?;
            state.executed.push(SENTIMENT.to_string());
            match non_empty(response) {
                Some(text) => {
                    state.sentiment = Some(Sentiment::parse(&text)?);
                    state.finished_at = Some(Utc::now());
                }
                None => warn!(step = SENTIMENT, "Model returned an empty sentiment"),
            }
            Ok(())
        })
    }
}

/// The three-step pipeline wired onto a linear graph.
pub struct BitcoinNewsWorkflow {
    runner: WorkflowRunner<BitcoinNewsState>,
}

impl BitcoinNewsWorkflow {
    /// Wire the pipeline. OpenAI and Grok must both have API keys.
    pub fn new(
        config: &AppConfig,
        client: Arc<dyn LlmClient>,
        selector: Arc<ModelSelector>,
    ) -> Result<Self> {
        let step = |provider: Provider, task: TaskType, web_search: bool| -> Result<StepModel> {
            let provider_config = config
                .provider(provider)
                .filter(|p| p.has_api_key())
                .cloned()
                .ok_or_else(|| StackrError::ProviderNotConfigured(provider.to_string()))?;
            Ok(StepModel {
                client: client.clone(),
                selector: selector.clone(),
                provider: provider_config,
                task,
                budget: config.selection.budget,
                priority: config.selection.priority,
                web_search,
            })
        };

        let runner = WorkflowRunner::new(Graph::linear(&STEPS))
            .with_max_steps(config.workflow.max_steps)
            .with_handler(
                WEB_SEARCH,
                WebSearchStep(step(Provider::OpenAi, TaskType::Analytics, true)?),
            )
            .with_handler(
                SUMMARIZE,
                SummarizeStep(step(Provider::Grok, TaskType::FastProcessing, false)?),
            )
            .with_handler(
                SENTIMENT,
                SentimentStep(step(Provider::OpenAi, TaskType::Analytics, false)?),
            );

        Ok(Self { runner })
    }

    pub fn runner(&self) -> &WorkflowRunner<BitcoinNewsState> {
        &self.runner
    }

    pub async fn run(&self) -> Result<BitcoinNewsReport> {
        let mut state = BitcoinNewsState::new();
        let run = self.runner.run(&mut state).await?;
        let finished_at = state.finished_at.unwrap_or_else(Utc::now);

        let missing = state.missing_fields();
        let (Some(headline), Some(summary), Some(sentiment)) =
            (state.headline, state.summary, state.sentiment)
        else {
            let not_executed = STEPS
                .iter()
                .filter(|s| !state.executed.iter().any(|e| e == *s))
                .map(|s| s.to_string())
                .collect();
            return Err(StackrError::WorkflowIncomplete {
                missing,
                executed: state.executed,
                not_executed,
            });
        };

        info!(
            run_id = %run.run_id,
            sentiment = ?sentiment.analysis,
            "Bitcoin news analysis complete"
        );

        Ok(BitcoinNewsReport {
            run_id: run.run_id,
            headline,
            summary,
            sentiment,
            started_at: state.started_at,
            finished_at,
            duration_ms: (finished_at - state.started_at).num_milliseconds(),
            steps: run.steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackr_llm::catalog::ModelCatalog;
    use stackr_test_utils::{config_with_providers, MockLlmClient};

    fn workflow(mock: Arc<MockLlmClient>) -> BitcoinNewsWorkflow {
        let config = config_with_providers(&[Provider::OpenAi, Provider::Grok]);
        let selector = Arc::new(
            ModelSelector::new(Arc::new(ModelCatalog::builtin().clone()))
                .with_detected_providers(config.available_providers()),
        );
        BitcoinNewsWorkflow::new(&config, mock, selector).unwrap()
    }

    #[test]
    fn test_parse_sentiment_variants() {
        let plain = Sentiment::parse(r#"{"analysis":"bullish","reasoning":"ETF inflows"}"#).unwrap();
        assert_eq!(plain.analysis, SentimentLabel::Bullish);
        assert_eq!(plain.reasoning, "ETF inflows");

        let fenced =
            Sentiment::parse("```json\n{\"analysis\": \"Bearish\", \"reasoning\": \"hack\"}\n```")
                .unwrap();
        assert_eq!(fenced.analysis, SentimentLabel::Bearish);

        let bare_fence =
            Sentiment::parse("```\n{\"analysis\": \"neutral\", \"reasoning\": \"flat\"}\n```")
                .unwrap();
        assert_eq!(bare_fence.analysis, SentimentLabel::Neutral);
    }

    #[test]
    fn test_parse_sentiment_rejects_bad_output() {
        for bad in [
            "not json",
            r#"{"analysis":"bullish"}"#,
            r#"{"analysis":"moon","reasoning":"x"}"#,
            "[]",
        ] {
            let err = Sentiment::parse(bad).unwrap_err();
            assert_eq!(err.to_string(), "Invalid sentiment analysis format");
        }
    }

    #[test]
    fn test_prompts() {
        assert_eq!(
            summarize_prompt("BTC tops $100k"),
            "Summarize this Bitcoin news headline: \"BTC tops $100k\""
        );
        assert_eq!(
            sentiment_prompt("Price rose."),
            "Analyze the sentiment of this Bitcoin news summary: \"Price rose.\". Respond in JSON: { \"analysis\": \"bullish\" | \"bearish\" | \"neutral\", \"reasoning\": \"string\" }"
        );
    }

    #[tokio::test]
    async fn test_happy_path() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_response(Provider::OpenAi, "Bitcoin ETF sees record inflows")
                .with_response(
                    Provider::OpenAi,
                    r#"{"analysis":"bullish","reasoning":"Institutional demand"}"#,
                )
                .with_response(Provider::Grok, "Investors poured money into Bitcoin ETFs."),
        );
        let report = workflow(mock.clone()).run().await.unwrap();

        assert_eq!(report.headline, "Bitcoin ETF sees record inflows");
        assert_eq!(report.summary, "Investors poured money into Bitcoin ETFs.");
        assert_eq!(report.sentiment.analysis, SentimentLabel::Bullish);
        assert!(report.duration_ms >= 0);
        let path: Vec<&str> = report.steps.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(path, STEPS.to_vec());

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].prompt, WEB_SEARCH_PROMPT);
        assert_eq!(calls[0].model_id, "gpt-4.1");
        assert!(calls[0].web_search);
        assert_eq!(calls[1].provider, Provider::Grok);
        assert!(!calls[1].web_search);
        assert!(!calls[2].web_search);
        assert_eq!(calls[1].model_id, "grok-3-mini");
        assert_eq!(calls[1].prompt, summarize_prompt("Bitcoin ETF sees record inflows"));
        assert_eq!(
            calls[2].prompt,
            sentiment_prompt("Investors poured money into Bitcoin ETFs.")
        );
    }

    #[tokio::test]
    async fn test_provider_error_aborts_run() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_response(Provider::OpenAi, "Headline")
                .with_error(Provider::Grok, StackrError::http(401, "bad key")),
        );
        let err = workflow(mock.clone()).run().await.unwrap_err();

        assert!(matches!(err, StackrError::Provider { status: Some(401), .. }));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_sentiment_fails() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_response(Provider::OpenAi, "Headline")
                .with_response(Provider::OpenAi, "I think it is good")
                .with_response(Provider::Grok, "Summary"),
        );
        let err = workflow(mock).run().await.unwrap_err();
        assert!(matches!(err, StackrError::InvalidOutput(_)));
    }

    #[tokio::test]
    async fn test_empty_headline_reports_incomplete() {
        let mock = Arc::new(MockLlmClient::new().with_response(Provider::OpenAi, "   "));
        let err = workflow(mock.clone()).run().await.unwrap_err();

        match err {
            StackrError::WorkflowIncomplete {
                missing,
                executed,
                not_executed,
            } => {
                assert_eq!(missing, vec!["headline", "summary", "sentiment"]);
                assert_eq!(executed, vec![WEB_SEARCH]);
                assert_eq!(not_executed, vec![SUMMARIZE, SENTIMENT]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_requires_grok_credentials() {
        let config = config_with_providers(&[Provider::OpenAi]);
        let selector = Arc::new(ModelSelector::new(Arc::new(ModelCatalog::builtin().clone())));
        let result = BitcoinNewsWorkflow::new(&config, Arc::new(MockLlmClient::new()), selector);
        assert!(matches!(
            result,
            Err(StackrError::ProviderNotConfigured(ref p)) if p == "grok"
        ));
    }
}
