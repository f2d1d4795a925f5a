use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{ProcessGenerator, agent, read_response, truncate};
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "llm-api-connector";

/// Body accepted by the connector's `call_<provider>` endpoints.
#[derive(Debug, Serialize)]
pub struct LlmRequest<'a> {
    pub api_key: &'a str,
    pub user_text: &'a str,
    pub prompting_strategie: &'a str,
}

/// Client for the LLM connector service.
#[derive(Clone)]
pub struct LlmConnector {
    agent: ureq::Agent,
    url: String,
    prompting_strategy: String,
}

impl LlmConnector {
    pub fn new(url: impl Into<String>, prompting_strategy: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: agent(timeout),
            url: url.into(),
            prompting_strategy: prompting_strategy.into(),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            config.llm_url(),
            config.prompting_strategy.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ProcessGenerator for LlmConnector {
    fn generate(&self, user_text: &str, api_key: &str) -> Result<String> {
        let request = LlmRequest {
            api_key,
            user_text,
            prompting_strategie: &self.prompting_strategy,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| Error::Transport {
                service: SERVICE,
                message: format!("Failed to serialize request: {}", e),
            })?;

        info!(url = %self.url, strategy = %self.prompting_strategy, "calling LLM connector");
        let sent = self
            .agent
            .post(&self.url)
            .header("Content-Type", "application/json")
            .send(payload);
        let body = read_response(SERVICE, sent)?;
        debug!(bytes = body.len(), "LLM connector replied");

        parse_message(&body)
    }
}

/// Extracts the generated text from a connector response body.
pub fn parse_message(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::MalformedUpstreamPayload(format!(
            "connector response is not JSON ({}): {}",
            e,
            truncate(body)
        ))
    })?;
    match value.get("message") {
        Some(Value::String(message)) => Ok(message.clone()),
        _ => Err(Error::MalformedUpstreamPayload(format!(
            "connector response has no 'message' string: {}",
            truncate(body)
        ))),
    }
}
