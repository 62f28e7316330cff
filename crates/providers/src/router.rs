//! Provider selection from configuration.

use iiot_assistant_config::AppConfig;
use iiot_assistant_core::error::ProviderError;
use iiot_assistant_core::provider::Provider;
use std::sync::Arc;

use crate::openai_compat::OpenAiCompatProvider;

/// Providers that run locally and need no API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

/// Whether `provider_name` runs without an API key.
pub fn is_keyless(provider_name: &str) -> bool {
    KEYLESS_PROVIDERS.contains(&provider_name)
}

/// Build the configured default provider.
///
/// A `[providers.<name>]` entry overrides the key and URL; otherwise the
/// top-level `api_key` and the provider's well-known URL are used.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());

    let base_url = match provider_config.and_then(|p| p.api_url.clone()) {
        Some(url) => url,
        None => default_base_url(name).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}', set providers.{name}.api_url"
            ))
        })?,
    };

    let api_key = match api_key {
        Some(key) => key,
        None if is_keyless(name) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for '{name}', set api_key or OPENAI_API_KEY"
            )));
        }
    };

    tracing::debug!(provider = name, url = %base_url, "Building provider");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiot_assistant_config::ProviderConfig;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").unwrap().contains("openrouter.ai"));
        assert!(default_base_url("openai").unwrap().contains("api.openai.com"));
        assert!(default_base_url("ollama").unwrap().contains("localhost:11434"));
        assert!(default_base_url("mystery").is_none());
    }

    #[test]
    fn default_config_with_key_builds_openai() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = build_from_config(&AppConfig::default()).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn local_servers_are_keyless() {
        for name in ["ollama", "vllm", "llamacpp", "llama.cpp"] {
            assert!(is_keyless(name));
        }
        assert!(!is_keyless("openai"));
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        assert_eq!(build_from_config(&config).unwrap().name(), "ollama");
    }

    #[test]
    fn custom_provider_uses_configured_url() {
        let mut config = AppConfig {
            default_provider: "azure-proxy".into(),
            ..AppConfig::default()
        };
        assert!(build_from_config(&config).is_err());

        config.providers.insert(
            "azure-proxy".into(),
            ProviderConfig {
                api_key: Some("k".into()),
                api_url: Some("http://proxy.local/v1".into()),
            },
        );
        assert_eq!(build_from_config(&config).unwrap().name(), "azure-proxy");
    }
}
