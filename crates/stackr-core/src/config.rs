use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackrError};
use crate::types::{BudgetTier, Priority, Provider};

/// Top-level Stackr configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "0.0.0.0:3000".to_string() }

/// Per-provider credential and call settings handed to the LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Empty means "use the provider's default model".
    #[serde(default)]
    pub model_id: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Override for the chat completions endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_max_retries() -> u32 { 3 }
fn default_timeout_ms() -> u64 { 30_000 }

impl ProviderConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: Some(api_key.into()),
            model_id: provider.default_model().to_string(),
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            base_url: None,
        }
    }

    /// Copy of this config targeting a different model.
    pub fn with_model(&self, model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..self.clone()
        }
    }

    /// True when the key is set, non-empty, and not an unexpanded `${VAR}`.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty() && !k.starts_with("${"))
    }
}

/// Backoff settings shared by every provider's retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Model selection defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub budget: BudgetTier,
    #[serde(default)]
    pub priority: Priority,
    /// Optional model catalog file replacing the built-in table.
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub thresholds: BudgetThresholds,
}

/// Input-token cost ceilings (USD per million tokens) for each budget tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetThresholds {
    pub budget: f64,
    pub standard: f64,
    pub premium: f64,
    /// `None` means no ceiling.
    #[serde(default)]
    pub ultra: Option<f64>,
}

impl BudgetThresholds {
    /// Canonical ceilings.
    pub const CANONICAL: Self = Self {
        budget: 0.5,
        standard: 2.0,
        premium: 10.0,
        ultra: None,
    };

    /// Older, tighter ceilings kept for operators who depended on them.
    pub const LEGACY: Self = Self {
        budget: 0.2,
        standard: 1.0,
        premium: 5.0,
        ultra: None,
    };

    pub fn ceiling(&self, tier: BudgetTier) -> Option<f64> {
        match tier {
            BudgetTier::Budget => Some(self.budget),
            BudgetTier::Standard => Some(self.standard),
            BudgetTier::Premium => Some(self.premium),
            BudgetTier::Ultra => self.ultra,
        }
    }

    pub fn allows(&self, tier: BudgetTier, input_cost: f64) -> bool {
        self.ceiling(tier).map_or(true, |max| input_cost <= max)
    }
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self::CANONICAL
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Upper bound on agent steps per workflow run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize { 64 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| StackrError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse TOML text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let mut config: AppConfig =
            toml::from_str(&expanded).map_err(|e| StackrError::Config(e.to_string()))?;
        config.fill_default_models();
        Ok(config)
    }

    /// Build a config from process environment variables.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Reads `<PROVIDER>_API_KEY` / `<PROVIDER>_MODEL` for each provider,
    /// plus `LLM_MAX_RETRIES`, `LLM_TIMEOUT_MS`, and `PORT`.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_retries = lookup("LLM_MAX_RETRIES")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(default_max_retries);
        let timeout_ms = lookup("LLM_TIMEOUT_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(default_timeout_ms);

        let providers = Provider::ALL
            .iter()
            .filter_map(|p| {
                let key = lookup(p.api_key_env()).filter(|k| !k.trim().is_empty())?;
                let model_id = lookup(p.model_env())
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| p.default_model().to_string());
                Some(ProviderConfig {
                    provider: *p,
                    api_key: Some(key),
                    model_id,
                    max_retries,
                    timeout_ms,
                    base_url: None,
                })
            })
            .collect();

        let server = match lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            Some(port) => ServerConfig {
                bind: format!("0.0.0.0:{}", port),
            },
            None => ServerConfig::default(),
        };

        Self {
            server,
            providers,
            ..Self::default()
        }
    }

    /// Settings for one provider, if configured.
    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider == provider)
    }

    /// Providers with a usable API key, in detection order.
    pub fn available_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .iter()
            .copied()
            .filter(|p| self.provider(*p).is_some_and(|c| c.has_api_key()))
            .collect()
    }

    /// Copy with every API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for p in &mut copy.providers {
            if let Some(key) = p.api_key.as_mut() {
                *key = redact(key);
            }
        }
        copy
    }

    fn fill_default_models(&mut self) {
        for p in &mut self.providers {
            if p.model_id.trim().is_empty() {
                p.model_id = p.provider.default_model().to_string();
            }
        }
    }
}

fn redact(key: &str) -> String {
    if key.starts_with("${") {
        return key.to_string();
    }
    let visible: String = key.chars().take(4).collect();
    format!("{}…", visible)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// `~/.stackr`, when a home directory is known.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".stackr"))
}
