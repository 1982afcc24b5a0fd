//! Model selection: pick the best catalog entry for a task under provider,
//! budget, and priority constraints.
//!
//! Selection never fails. When the constraints rule out every model, a
//! fallback chain still yields a descriptor, and [`Selection::fallback`]
//! records which stage produced it.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use stackr_core::config::{AppConfig, BudgetThresholds};
use stackr_core::error::Result;
use stackr_core::types::{BudgetTier, Priority, Provider, TaskType};

use crate::catalog::{ModelCatalog, ModelDescriptor};

/// Capabilities a task insists on. Anything not required is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub reasoning: bool,
    pub code: bool,
    pub vision: bool,
}

impl Requirements {
    pub fn for_task(task: TaskType) -> Self {
        let (reasoning, code, vision) = match task {
            TaskType::Analytics => (true, false, false),
            TaskType::CodeGeneration => (false, true, false),
            TaskType::Reasoning => (true, false, false),
            TaskType::FastProcessing => (false, false, false),
            TaskType::Vision => (false, false, true),
        };
        Self {
            reasoning,
            code,
            vision,
        }
    }

    pub fn satisfied_by(&self, model: &ModelDescriptor) -> bool {
        let caps = &model.capabilities;
        (!self.reasoning || caps.reasoning)
            && (!self.code || caps.code)
            && (!self.vision || caps.vision)
    }
}

/// Which fallback stage answered when no model fit the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// First model meeting the task requirements, ignoring budget.
    TaskMatch,
    /// First model from an allowed provider, ignoring the task.
    ProviderMatch,
    /// First model in the catalog.
    Catalog,
    /// The hard-coded default descriptor.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub model: ModelDescriptor,
    /// `None` when the model satisfies task, provider, and budget.
    pub fallback: Option<Fallback>,
}

impl Selection {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Selects models from a catalog using configured budget ceilings.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    catalog: Arc<ModelCatalog>,
    thresholds: BudgetThresholds,
    detected: Vec<Provider>,
}

impl ModelSelector {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self {
            catalog,
            thresholds: BudgetThresholds::CANONICAL,
            detected: Vec::new(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: BudgetThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Providers used when a caller does not name any.
    pub fn with_detected_providers(mut self, providers: Vec<Provider>) -> Self {
        self.detected = providers;
        self
    }

    /// Build a selector from config: catalog file (or the embedded one),
    /// thresholds, and the providers that have credentials.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog = match &config.selection.catalog_path {
            Some(path) => ModelCatalog::load(Path::new(path))?,
            None => ModelCatalog::builtin().clone(),
        };
        Ok(Self::new(Arc::new(catalog))
            .with_thresholds(config.selection.thresholds)
            .with_detected_providers(config.available_providers()))
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn thresholds(&self) -> &BudgetThresholds {
        &self.thresholds
    }

    pub fn detected_providers(&self) -> &[Provider] {
        &self.detected
    }

    pub fn select(
        &self,
        task: TaskType,
        providers: Option<&[Provider]>,
        budget: BudgetTier,
        priority: Priority,
    ) -> Selection {
        let providers = providers.unwrap_or(self.detected.as_slice());
        let selection = choose(
            self.catalog.models(),
            &self.thresholds,
            task,
            providers,
            budget,
            priority,
        );
        debug!(
            task = %task,
            budget = %budget,
            priority = %priority,
            model = %selection.model.model_id,
            provider = %selection.model.provider,
            fallback = ?selection.fallback,
            "Selected model"
        );
        selection
    }
}

/// Select against the embedded catalog with canonical thresholds.
///
/// With `providers` unset, every provider whose API key is present in the
/// environment is eligible.
pub fn select_optimal_model(
    task: TaskType,
    providers: Option<&[Provider]>,
    budget: BudgetTier,
    priority: Priority,
) -> ModelDescriptor {
    let detected;
    let providers = match providers {
        Some(p) => p,
        None => {
            detected = AppConfig::from_env().available_providers();
            detected.as_slice()
        }
    };
    choose(
        ModelCatalog::builtin().models(),
        &BudgetThresholds::CANONICAL,
        task,
        providers,
        budget,
        priority,
    )
    .model
}

/// The selection algorithm itself. Pure over its inputs.
pub fn choose(
    catalog: &[ModelDescriptor],
    thresholds: &BudgetThresholds,
    task: TaskType,
    providers: &[Provider],
    budget: BudgetTier,
    priority: Priority,
) -> Selection {
    let requirements = Requirements::for_task(task);

    let available: Vec<&ModelDescriptor> = catalog
        .iter()
        .filter(|m| providers.contains(&m.provider))
        .collect();
    let suitable: Vec<&ModelDescriptor> = available
        .iter()
        .copied()
        .filter(|m| requirements.satisfied_by(m))
        .collect();
    let mut affordable: Vec<&ModelDescriptor> = suitable
        .iter()
        .copied()
        .filter(|m| thresholds.allows(budget, m.cost_per_million_input_tokens))
        .collect();

    // Vec::sort_by is stable: ties keep catalog order
    match priority {
        Priority::Cost => affordable.sort_by(|a, b| {
            a.cost_per_million_input_tokens
                .total_cmp(&b.cost_per_million_input_tokens)
        }),
        Priority::Speed => affordable.sort_by_key(|m| m.speed.ordinal()),
        Priority::Quality => {
            affordable.sort_by(|a, b| b.quality_score().total_cmp(&a.quality_score()))
        }
    }

    if let Some(best) = affordable.first() {
        return Selection {
            model: (*best).clone(),
            fallback: None,
        };
    }

    let (model, fallback) = if let Some(m) = suitable.first() {
        ((*m).clone(), Fallback::TaskMatch)
    } else if let Some(m) = available.first() {
        ((*m).clone(), Fallback::ProviderMatch)
    } else if let Some(m) = catalog.first() {
        (m.clone(), Fallback::Catalog)
    } else {
        (ModelDescriptor::fallback_default(), Fallback::Default)
    };

    Selection {
        model,
        fallback: Some(fallback),
    }
}
