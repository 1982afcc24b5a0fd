//! Test doubles for Stackr crates.
//!
//! `MockLlmClient` replays scripted responses per provider and records every
//! call it receives, so workflow and retry tests run without a network.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Mutex;

use futures::future::BoxFuture;

use stackr_core::config::{AppConfig, ProviderConfig};
use stackr_core::error::{Result, StackrError};
use stackr_core::traits::LlmClient;
use stackr_core::types::Provider;

/// One call observed by [`MockLlmClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub provider: Provider,
    pub model_id: String,
    pub prompt: String,
    /// Whether the call went through `query_with_web_search`.
    pub web_search: bool,
}

/// Scripted LLM client. Each provider has its own FIFO of outcomes; an
/// exhausted queue yields a transport error.
#[derive(Default)]
pub struct MockLlmClient {
    scripted: Mutex<HashMap<Provider, VecDeque<Result<String>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `provider`.
    pub fn with_response(self, provider: Provider, text: impl Into<String>) -> Self {
        self.push(provider, Ok(text.into()));
        self
    }

    /// Queue a failure for `provider`.
    pub fn with_error(self, provider: Provider, error: StackrError) -> Self {
        self.push(provider, Err(error));
        self
    }

    pub fn push(&self, provider: Provider, outcome: Result<String>) {
        let mut scripted = self.scripted.lock().unwrap();
        scripted.entry(provider).or_default().push_back(outcome);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, provider: Provider) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.provider == provider)
            .collect()
    }
}

impl MockLlmClient {
    fn respond(
        &self,
        prompt: &str,
        config: &ProviderConfig,
        web_search: bool,
    ) -> BoxFuture<'static, Result<String>> {
        self.calls.lock().unwrap().push(RecordedCall {
            provider: config.provider,
            model_id: config.model_id.clone(),
            prompt: prompt.to_string(),
            web_search,
        });

        let outcome = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&config.provider)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| {
                Err(StackrError::transport(format!(
                    "no scripted response for {}",
                    config.provider
                )))
            });

        Box::pin(async move { outcome })
    }
}

impl LlmClient for MockLlmClient {
    fn query<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        self.respond(prompt, config, false)
    }

    fn query_with_web_search<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        self.respond(prompt, config, true)
    }
}

/// Config with fake keys for the given providers.
pub fn config_with_providers(providers: &[Provider]) -> AppConfig {
    let mut config = AppConfig::default();
    for p in providers {
        let mut pc = ProviderConfig::new(*p, format!("test-key-{}", p));
        pc.max_retries = 0;
        config.providers.push(pc);
    }
    config
}

/// Write `content` to a temp file and return the handle (deleted on drop).
pub fn temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write temp file");
    tmp
}
