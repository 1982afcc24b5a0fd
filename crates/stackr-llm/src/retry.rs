use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use stackr_core::config::{ProviderConfig, RetryConfig};
use stackr_core::error::{Result, StackrError};
use stackr_core::traits::LlmClient;

/// An LLM client that retries failed requests with exponential backoff.
///
/// The attempt cap comes from each call's `ProviderConfig::max_retries`;
/// delay timing comes from the shared `RetryConfig`.
pub struct RetryingClient {
    inner: Box<dyn LlmClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Box<dyn LlmClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }

    async fn with_retries<'a, F>(&'a self, config: &'a ProviderConfig, call: F) -> Result<String>
    where
        F: Fn() -> BoxFuture<'a, Result<String>>,
    {
        let max_retries = config.max_retries;

        let mut attempt = 0;
        loop {
            match call().await {
                Ok(text) => return Ok(text),
                Err(e) if is_retryable(&e) && attempt < max_retries => {
                    let backoff = calculate_backoff(attempt, &self.retry_config);
                    warn!(
                        provider = %config.provider,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying LLM request"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Rate limits, server errors, and status-less faults are retried; every
/// other 4xx fails immediately.
pub fn is_retryable(e: &StackrError) -> bool {
    match e {
        StackrError::Provider { status: None, .. } => true,
        StackrError::Provider {
            status: Some(code), ..
        } => *code == 429 || *code >= 500,
        _ => false,
    }
}

pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn query<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.with_retries(config, move || self.inner.query(prompt, config)))
    }

    fn query_with_web_search<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.with_retries(config, move || {
            self.inner.query_with_web_search(prompt, config)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackr_core::types::Provider;
    use stackr_test_utils::MockLlmClient;
    use std::sync::Arc;

    fn config(max_retries: u32) -> ProviderConfig {
        let mut c = ProviderConfig::new(Provider::OpenAi, "sk-test");
        c.max_retries = max_retries;
        c
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable(&StackrError::http(429, "rate limited")));
        assert!(is_retryable(&StackrError::http(500, "boom")));
        assert!(is_retryable(&StackrError::http(503, "unavailable")));
        assert!(is_retryable(&StackrError::transport("connection reset")));
        assert!(!is_retryable(&StackrError::http(400, "bad request")));
        assert!(!is_retryable(&StackrError::http(401, "unauthorized")));
        assert!(!is_retryable(&StackrError::Config("nope".into())));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let rc = RetryConfig {
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        let first = calculate_backoff(0, &rc).as_millis() as u64;
        assert!((800..=1200).contains(&first));
        let third = calculate_backoff(2, &rc).as_millis() as u64;
        assert!((3200..=4800).contains(&third));
        let capped = calculate_backoff(10, &rc).as_millis() as u64;
        assert!((4000..=6000).contains(&capped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_error(Provider::OpenAi, StackrError::http(503, "unavailable"))
                .with_error(Provider::OpenAi, StackrError::http(429, "slow down"))
                .with_response(Provider::OpenAi, "ok"),
        );
        let client = RetryingClient::new(Box::new(mock.clone()), RetryConfig::default());

        let out = client.query("ping", &config(3)).await.unwrap();
        assert_eq!(out, "ok");
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_error(Provider::OpenAi, StackrError::http(401, "unauthorized"))
                .with_response(Provider::OpenAi, "never reached"),
        );
        let client = RetryingClient::new(Box::new(mock.clone()), RetryConfig::default());

        let err = client.query("ping", &config(3)).await.unwrap_err();
        assert!(matches!(
            err,
            StackrError::Provider {
                status: Some(401),
                ..
            }
        ));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_error(Provider::OpenAi, StackrError::transport("timeout"))
                .with_error(Provider::OpenAi, StackrError::transport("timeout"))
                .with_error(Provider::OpenAi, StackrError::transport("timeout"))
                .with_response(Provider::OpenAi, "too late"),
        );
        let client = RetryingClient::new(Box::new(mock.clone()), RetryConfig::default());

        let err = client.query("ping", &config(2)).await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_web_search_is_retried() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_error(Provider::OpenAi, StackrError::http(502, "bad gateway"))
                .with_response(Provider::OpenAi, "Bitcoin tops $120k"),
        );
        let client = RetryingClient::new(Box::new(mock.clone()), RetryConfig::default());

        let out = client
            .query_with_web_search("latest?", &config(1))
            .await
            .unwrap();
        assert_eq!(out, "Bitcoin tops $120k");
        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.web_search));
    }
}
