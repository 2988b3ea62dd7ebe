use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::provider::Provider;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_COMMENT_TIMEOUT_SECS: u64 = 15;

const APP_DIR: &str = "number-master";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: String,
    pub comment_timeout_secs: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            default_model: None,
            gemini_api_key: None,
            claude_api_key: None,
            openai_api_key: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            comment_timeout_secs: DEFAULT_COMMENT_TIMEOUT_SECS,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Configured provider, falling back to Gemini for missing or unknown names.
    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Gemini)
    }

    pub fn comment_timeout(&self) -> Duration {
        Duration::from_secs(self.comment_timeout_secs)
    }

    fn stored_key(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::Gemini => self.gemini_api_key.as_ref(),
            Provider::Claude => self.claude_api_key.as_ref(),
            Provider::OpenAI => self.openai_api_key.as_ref(),
            Provider::Ollama => None,
        }
    }

    pub fn set_api_key(&mut self, provider: Provider, key: &str) {
        let key = Some(key.to_string());
        match provider {
            Provider::Gemini => self.gemini_api_key = key,
            Provider::Claude => self.claude_api_key = key,
            Provider::OpenAI => self.openai_api_key = key,
            Provider::Ollama => {}
        }
    }

    /// API key for a provider - environment variable first, then config
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        provider
            .api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
            .or_else(|| self.stored_key(provider).cloned())
            .filter(|k| !k.is_empty())
    }

    /// Returns where a provider's key comes from: "local", "env", "config", or None
    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        let Some(var) = provider.api_key_env() else {
            return Some("local");
        };
        if std::env::var(var).map(|k| !k.is_empty()).unwrap_or(false) {
            Some("env")
        } else if self.stored_key(provider).is_some_and(|k| !k.is_empty()) {
            Some("config")
        } else {
            None
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }

    pub fn default_log_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("number-master.log"))
    }

    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.provider(), Provider::Gemini);
        assert_eq!(config.comment_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.provider = Some("ollama".to_string());
        config.default_model = Some("mistral:latest".to_string());
        config.set_api_key(Provider::Claude, "sk-test");
        config.comment_timeout_secs = 3;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.provider(), Provider::Ollama);
        assert_eq!(loaded.claude_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "provider": "claude" }"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::Claude);
        assert_eq!(loaded.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(loaded.comment_timeout_secs, DEFAULT_COMMENT_TIMEOUT_SECS);
    }

    #[test]
    fn unknown_provider_falls_back() {
        let mut config = Config::new();
        config.provider = Some("skynet".to_string());
        assert_eq!(config.provider(), Provider::Gemini);
    }

    #[test]
    fn key_sources() {
        let mut config = Config::new();
        assert_eq!(config.key_source(Provider::Ollama), Some("local"));
        assert_eq!(config.api_key(Provider::Ollama), None);

        if std::env::var("OPENAI_API_KEY").is_err() {
            assert_eq!(config.key_source(Provider::OpenAI), None);
            config.set_api_key(Provider::OpenAI, "sk-config");
            assert_eq!(config.key_source(Provider::OpenAI), Some("config"));
            assert_eq!(config.api_key(Provider::OpenAI).as_deref(), Some("sk-config"));
        }
    }
}
