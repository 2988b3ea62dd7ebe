pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use anyhow::Result;
use log::{info, warn};

use crate::config::Config;
use crate::logutil::escape_log;
use crate::provider::Provider;

/// Any of the supported text generation backends
#[derive(Clone)]
pub enum AiClient {
    Gemini(GeminiClient),
    Claude(ClaudeClient),
    OpenAI(OpenAIClient),
    Ollama(OllamaClient),
}

impl AiClient {
    /// Build the client for `provider`, or `None` when it needs a key nobody supplied.
    pub fn from_config(provider: Provider, config: &Config) -> Option<Self> {
        match provider {
            Provider::Ollama => Some(AiClient::Ollama(OllamaClient::new(&config.ollama_url))),
            Provider::Gemini => config
                .api_key(provider)
                .map(|k| AiClient::Gemini(GeminiClient::new(&k))),
            Provider::Claude => config
                .api_key(provider)
                .map(|k| AiClient::Claude(ClaudeClient::new(&k))),
            Provider::OpenAI => config
                .api_key(provider)
                .map(|k| AiClient::OpenAI(OpenAIClient::new(&k))),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            AiClient::Gemini(_) => Provider::Gemini,
            AiClient::Claude(_) => Provider::Claude,
            AiClient::OpenAI(_) => Provider::OpenAI,
            AiClient::Ollama(_) => Provider::Ollama,
        }
    }

    pub async fn query(&self, model: &str, prompt: &str) -> Result<String> {
        match self {
            AiClient::Gemini(client) => client.query(model, prompt).await,
            AiClient::Claude(client) => client.query(model, prompt).await,
            AiClient::OpenAI(client) => client.query(model, prompt).await,
            AiClient::Ollama(client) => client.query(model, prompt).await,
        }
    }

    /// Send a minimal prompt to check the key, model and network path.
    pub async fn test_connection(&self, model: &str) -> bool {
        match self.query(model, "hi").await {
            Ok(_) => {
                info!("connection test to {} ({}) succeeded", self.provider().as_str(), model);
                true
            }
            Err(e) => {
                warn!(
                    "connection test to {} ({}) failed: {}",
                    self.provider().as_str(),
                    model,
                    escape_log(&format!("{:#}", e))
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{serve_once, unused_base_url};

    #[test]
    fn local_provider_needs_no_key() {
        let config = Config::new();
        let client = AiClient::from_config(Provider::Ollama, &config).unwrap();
        assert_eq!(client.provider(), Provider::Ollama);
    }

    #[test]
    fn configured_key_builds_cloud_client() {
        let mut config = Config::new();
        config.set_api_key(Provider::Claude, "sk-ant");
        let client = AiClient::from_config(Provider::Claude, &config).unwrap();
        assert_eq!(client.provider(), Provider::Claude);

        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(AiClient::from_config(Provider::OpenAI, &config).is_none());
        }
    }

    #[tokio::test]
    async fn connection_test_reports_success_and_failure() {
        let (base_url, _request) = serve_once("200 OK", r#"{"response":"hello","done":true}"#).await;
        let up = AiClient::Ollama(OllamaClient::new(&base_url));
        assert!(up.test_connection("llama3.2:latest").await);

        let down = AiClient::Ollama(OllamaClient::new(&unused_base_url().await));
        assert!(!down.test_connection("llama3.2:latest").await);
    }
}
