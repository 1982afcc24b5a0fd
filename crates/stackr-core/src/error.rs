use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackrError {
    // Graph errors
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Node not found in graph: {0}")]
    UnknownNode(String),

    #[error("Traversal exceeded step limit ({limit})")]
    StepLimitExceeded { limit: usize },

    // Provider errors
    #[error("{}", provider_message(.status, .message))]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Provider {0} is not configured")]
    ProviderNotConfigured(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    // Workflow errors
    #[error("No handler registered for node: {0}")]
    MissingHandler(String),

    #[error("{0}")]
    InvalidOutput(String),

    #[error(
        "Workflow incomplete: missing [{}]; executed [{}]; not executed [{}]",
        .missing.join(", "),
        .executed.join(", "),
        .not_executed.join(", ")
    )]
    WorkflowIncomplete {
        missing: Vec<String>,
        executed: Vec<String>,
        not_executed: Vec<String>,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn provider_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Provider request failed: HTTP {}: {}", code, message),
        None => format!("Provider request failed: {}", message),
    }
}

impl StackrError {
    /// Shorthand for a provider failure with an HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Shorthand for a provider failure without a status (network fault,
    /// timeout, malformed body).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StackrError>;
