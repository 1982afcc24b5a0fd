pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{AppConfig, ProviderConfig};
pub use error::{Result, StackrError};
pub use traits::LlmClient;
pub use types::*;
