use futures::future::BoxFuture;

use crate::config::ProviderConfig;
use crate::error::Result;

/// LLM client: one prompt in, one completion out.
///
/// Implementations report every network or API failure as
/// [`StackrError::Provider`](crate::error::StackrError::Provider).
pub trait LlmClient: Send + Sync + 'static {
    /// Send `prompt` to the provider described by `config` and return the
    /// response text.
    fn query<'a>(&'a self, prompt: &'a str, config: &'a ProviderConfig)
        -> BoxFuture<'a, Result<String>>;

    /// Like [`LlmClient::query`], but the model may search the live web
    /// before answering. Providers without a search tool return
    /// [`StackrError::UnsupportedProvider`](crate::error::StackrError::UnsupportedProvider).
    fn query_with_web_search<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>>;
}

impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    fn query<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        (**self).query(prompt, config)
    }

    fn query_with_web_search<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a ProviderConfig,
    ) -> BoxFuture<'a, Result<String>> {
        (**self).query_with_web_search(prompt, config)
    }
}
