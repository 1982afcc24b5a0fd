use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StackrError;

/// An external LLM vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// xAI Grok (OpenAI-compatible).
    Grok,
    /// Venice AI (OpenAI-compatible).
    Venice,
}

impl Provider {
    /// Every supported provider, in auto-detection order.
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Grok, Provider::Venice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Grok => "grok",
            Self::Venice => "venice",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Grok => "GROK_API_KEY",
            Self::Venice => "VENICE_API_KEY",
        }
    }

    /// Environment variable overriding this provider's default model.
    pub fn model_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_MODEL",
            Self::Grok => "GROK_MODEL",
            Self::Venice => "VENICE_MODEL",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4.1-mini",
            Self::Grok => "grok-4-0709",
            Self::Venice => "qwen3-4b",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = StackrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "grok" | "xai" => Ok(Self::Grok),
            "venice" => Ok(Self::Venice),
            other => Err(StackrError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// The kind of work a model is being chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Analytics,
    CodeGeneration,
    Reasoning,
    FastProcessing,
    Vision,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analytics => "analytics",
            Self::CodeGeneration => "code_generation",
            Self::Reasoning => "reasoning",
            Self::FastProcessing => "fast_processing",
            Self::Vision => "vision",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = StackrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "analytics" => Ok(Self::Analytics),
            "code_generation" | "code" => Ok(Self::CodeGeneration),
            "reasoning" => Ok(Self::Reasoning),
            "fast_processing" | "fast" => Ok(Self::FastProcessing),
            "vision" => Ok(Self::Vision),
            other => Err(StackrError::Config(format!("unknown task type '{}'", other))),
        }
    }
}

/// Named cost ceiling bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Budget,
    #[default]
    Standard,
    Premium,
    Ultra,
}

impl BudgetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Ultra => "ultra",
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetTier {
    type Err = StackrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "budget" => Ok(Self::Budget),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "ultra" => Ok(Self::Ultra),
            other => Err(StackrError::Config(format!("unknown budget tier '{}'", other))),
        }
    }
}

/// Sort criterion among budget-eligible models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Cost,
    Speed,
    #[default]
    Quality,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Speed => "speed",
            Self::Quality => "quality",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = StackrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cost" => Ok(Self::Cost),
            "speed" => Ok(Self::Speed),
            "quality" => Ok(Self::Quality),
            other => Err(StackrError::Config(format!("unknown priority '{}'", other))),
        }
    }
}
