use stackr_core::types::Provider;

/// Default chat completions endpoint for each provider.
pub fn default_endpoint(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
        Provider::Grok => "https://api.x.ai/v1/chat/completions",
        Provider::Venice => "https://api.venice.ai/api/v1/chat/completions",
    }
}

/// Resolve the endpoint: explicit override first, then the preset.
pub fn endpoint_for(provider: Provider, base_url: Option<&str>) -> String {
    match base_url {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => default_endpoint(provider).to_string(),
    }
}

/// Responses API endpoint, used for hosted web search. Only OpenAI offers it.
///
/// An override pointing at `.../chat/completions` is rewritten to the
/// sibling `.../responses` path.
pub fn responses_endpoint_for(provider: Provider, base_url: Option<&str>) -> Option<String> {
    if provider != Provider::OpenAi {
        return None;
    }
    let url = match base_url {
        Some(url) if !url.trim().is_empty() => {
            let root = url.trim_end_matches('/');
            let root = root.strip_suffix("/chat/completions").unwrap_or(root);
            format!("{}/responses", root)
        }
        _ => "https://api.openai.com/v1/responses".to_string(),
    };
    Some(url)
}
