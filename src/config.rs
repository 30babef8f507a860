use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::openai::{OpenAiSettings, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub credentials_file: Option<PathBuf>,
    pub openai: OpenAiConfig,
    pub images: ImagesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub endpoint: String,
    pub max_tokens: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ImagesConfig {
    pub temp_dir: Option<PathBuf>,
}

/// Key-value credential source, e.g. `llm_env.yml`.
#[derive(Deserialize, Clone, Default)]
pub struct Credentials {
    #[serde(rename = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("llm_env.yml"))
    }

    /// Combine this config with a loaded key into client settings.
    pub fn openai_settings(&self, credentials: &Credentials) -> Result<OpenAiSettings> {
        let api_key = credentials
            .openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| {
                format!(
                    "No API key: set {} in the environment or in {}",
                    API_KEY_VAR,
                    self.credentials_path().display()
                )
            })?;

        Ok(OpenAiSettings {
            endpoint: self.openai.endpoint.clone(),
            model: self.openai.model.clone(),
            api_key,
            max_tokens: self.openai.max_tokens,
            timeout: self.openai.timeout_secs.map(Duration::from_secs),
            temp_dir: self
                .images
                .temp_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

impl Credentials {
    /// Read credentials from a YAML file, then apply the environment override.
    ///
    /// A missing file is fine when the key comes from the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let credentials = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
            Self::parse(&content)?
        } else {
            log::info!("Credentials file {} not found", path.display());
            Self::default()
        };

        Ok(credentials.with_override(std::env::var(API_KEY_VAR).ok()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse credentials file")
    }

    fn with_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.openai_api_key = Some(key);
        }
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let toml_str = r#"
            credentials_file = "secrets/llm_env.yml"

            [openai]
            model = "gpt-4o"
            endpoint = "http://localhost:8080/v1/chat/completions"
            max_tokens = 500
            timeout_secs = 30

            [images]
            temp_dir = "./temp"
        "#;

        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.credentials_path(), PathBuf::from("secrets/llm_env.yml"));
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.max_tokens, 500);
        assert_eq!(config.openai.timeout_secs, Some(30));
        assert_eq!(config.images.temp_dir, Some(PathBuf::from("./temp")));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.credentials_path(), PathBuf::from("llm_env.yml"));
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.openai.max_tokens, 2000);
        assert!(config.openai.timeout_secs.is_none());
    }

    #[test]
    fn test_credentials_parsing() {
        let creds = Credentials::parse("OPENAI_API_KEY: sk-from-file\nOTHER: x\n").unwrap();
        assert_eq!(creds.openai_api_key.as_deref(), Some("sk-from-file"));
        assert!(!format!("{:?}", creds).contains("sk-from-file"));
    }

    #[test]
    fn test_credentials_override() {
        let creds = Credentials::parse("OPENAI_API_KEY: sk-from-file").unwrap();
        let creds = creds.with_override(Some("sk-from-env".to_string()));
        assert_eq!(creds.openai_api_key.as_deref(), Some("sk-from-env"));

        let creds = Credentials::default().with_override(Some("  ".to_string()));
        assert!(creds.openai_api_key.is_none());
    }

    #[test]
    fn test_openai_settings() {
        let config = Config::parse("[openai]\ntimeout_secs = 5").unwrap();
        let creds = Credentials::parse("OPENAI_API_KEY: sk-test").unwrap();

        let settings = config.openai_settings(&creds).unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.timeout, Some(Duration::from_secs(5)));
        assert_eq!(settings.max_tokens, 2000);
    }

    #[test]
    fn test_openai_settings_without_key() {
        let config = Config::default();
        assert!(config.openai_settings(&Credentials::default()).is_err());
    }
}
