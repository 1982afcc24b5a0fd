use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::error;

use stackr_core::error::{Result, StackrError};
use stackr_core::types::Provider;

const BUILTIN_CATALOG: &str = include_str!("../catalog/models.toml");

/// Relative latency class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Fast,
    Medium,
    Slow,
}

impl Speed {
    /// Sort key: lower is faster.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Fast => 1,
            Self::Medium => 2,
            Self::Slow => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub reasoning: bool,
    pub code: bool,
    pub vision: bool,
    /// Context window in tokens.
    pub context_size: u32,
    #[serde(default)]
    pub functions: bool,
    #[serde(default)]
    pub structured_output: bool,
    #[serde(default)]
    pub streaming: bool,
}

/// Built-in tools a provider exposes alongside the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSupport {
    #[serde(default)]
    pub web_search: bool,
    #[serde(default)]
    pub file_search: bool,
    #[serde(default)]
    pub image_generation: bool,
    #[serde(default)]
    pub code_interpreter: bool,
    #[serde(default)]
    pub mcp: bool,
}

/// One catalog record: a model's pricing, latency, and capability profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub provider: Provider,
    pub model_id: String,
    /// USD per million input tokens. Budget tiers filter on this.
    pub cost_per_million_input_tokens: f64,
    pub cost_per_million_output_tokens: f64,
    pub speed: Speed,
    pub capabilities: Capabilities,
    #[serde(default)]
    pub tools: ToolSupport,
}

impl ModelDescriptor {
    /// Last-resort descriptor returned when nothing else can be chosen.
    pub fn fallback_default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model_id: "gpt-4.1-mini".to_string(),
            cost_per_million_input_tokens: 0.4,
            cost_per_million_output_tokens: 1.6,
            speed: Speed::Fast,
            capabilities: Capabilities {
                reasoning: false,
                code: true,
                vision: false,
                context_size: 16385,
                functions: true,
                structured_output: true,
                streaming: true,
            },
            tools: ToolSupport {
                web_search: true,
                file_search: true,
                image_generation: false,
                code_interpreter: true,
                mcp: true,
            },
        }
    }

    /// Composite quality score: 10 for reasoning plus context size in thousands.
    pub fn quality_score(&self) -> f64 {
        let reasoning = if self.capabilities.reasoning { 10.0 } else { 0.0 };
        reasoning + f64::from(self.capabilities.context_size) / 1000.0
    }

    /// Chat models with built-in browsing and no tool calling, such as the
    /// `*-search-preview` family. They reject sampling parameters.
    pub fn is_search_model(&self) -> bool {
        self.tools.web_search && !self.capabilities.functions
    }
}

/// A versioned, ordered table of model descriptors.
///
/// Order matters: fallback stages return the first entry of their set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub version: String,
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    pub fn new(version: impl Into<String>, models: Vec<ModelDescriptor>) -> Self {
        Self {
            version: version.into(),
            models,
        }
    }

    /// The catalog compiled into the binary, parsed on first use.
    pub fn builtin() -> &'static ModelCatalog {
        static CATALOG: OnceLock<ModelCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            Self::parse(BUILTIN_CATALOG).unwrap_or_else(|e| {
                error!(error = %e, "Embedded model catalog is invalid, using default model only");
                Self::new("fallback", vec![ModelDescriptor::fallback_default()])
            })
        })
    }

    /// Load an operator-supplied catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let catalog: ModelCatalog = toml::from_str(content)
            .map_err(|e| StackrError::Config(format!("invalid model catalog: {}", e)))?;
        if catalog.version.trim().is_empty() {
            return Err(StackrError::Config(
                "model catalog is missing a version".to_string(),
            ));
        }
        Ok(catalog)
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn find(&self, provider: Provider, model_id: &str) -> Option<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.provider == provider && m.model_id == model_id)
    }

    pub fn for_provider(&self, provider: Provider) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter().filter(move |m| m.provider == provider)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
