use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoder::EncoderOptions;
use crate::error::{Error, Result};

const DEFAULT_API_HOST: &str = "woped.dhbw-karlsruhe.de";
const DEFAULT_API_PORT: u16 = 443;
const DEFAULT_PROMPTING_STRATEGY: &str = "few_shot";
const DEFAULT_TRANSFORMER_BASE_URL: &str = "https://woped.dhbw-karlsruhe.de/pnml-bpmn-transformer";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which LLM connector endpoint handles generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(Error::Config(format!(
                "Unknown LLM provider '{}'. Available: openai, gemini",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub llm_provider: LlmProvider,
    #[serde(default = "default_prompting_strategy")]
    pub prompting_strategy: String,
    #[serde(default = "default_transformer_base_url")]
    pub transformer_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}
fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_prompting_strategy() -> String {
    DEFAULT_PROMPTING_STRATEGY.to_string()
}
fn default_transformer_base_url() -> String {
    DEFAULT_TRANSFORMER_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_port: default_api_port(),
            llm_provider: LlmProvider::default(),
            prompting_strategy: default_prompting_strategy(),
            transformer_base_url: default_transformer_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    /// Connector endpoint for the configured provider. Only port 443 is
    /// reached over TLS.
    pub fn llm_url(&self) -> String {
        let scheme = if self.api_port == 443 { "https" } else { "http" };
        format!(
            "{}://{}:{}/llm-api-connector/call_{}",
            scheme, self.api_host, self.api_port, self.llm_provider
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub encoder: EncoderOptions,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse settings TOML: {}", e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse settings YAML: {}", e)))
    }

    /// Reads a settings file, trying TOML before YAML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read settings file: {}", e)))?;

        let toml_err = match Self::from_toml(&content) {
            Ok(settings) => return Ok(settings),
            Err(e) => e,
        };
        let yaml_err = match Self::from_yaml(&content) {
            Ok(settings) => return Ok(settings),
            Err(e) => e,
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let detail = match extension.as_deref() {
            Some("toml") => toml_err.to_string(),
            Some("yaml" | "yml") => yaml_err.to_string(),
            _ => format!("{}; {}", toml_err, yaml_err),
        };
        Err(Error::Config(format!(
            "Failed to parse {} as TOML or YAML: {}",
            path.display(),
            detail
        )))
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let upstream = &mut self.upstream;
        if let Some(host) = lookup("API_HOST") {
            upstream.api_host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            upstream.api_port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid API_PORT value: {}", port)))?;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            upstream.llm_provider = provider.parse()?;
        }
        if let Some(strategy) = lookup("PROMPTING_STRATEGIE") {
            upstream.prompting_strategy = strategy;
        }
        if let Some(url) = lookup("TRANSFORMER_BASE_URL") {
            upstream.transformer_base_url = url;
        }
        Ok(())
    }
}
