use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use super::{ModelTransformer, agent, read_response, truncate};
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "transformer";
const DIRECTION: &str = "bpmntopnml";

#[derive(Deserialize)]
struct TransformResponse {
    pnml: String,
}

/// Client for the BPMN to PNML transformer service.
#[derive(Clone)]
pub struct TransformerClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl TransformerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: agent(timeout),
            endpoint: format!("{}/transform", base_url.trim_end_matches('/')),
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(
            &config.transformer_base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ModelTransformer for TransformerClient {
    fn bpmn_to_pnml(&self, bpmn: &str) -> Result<String> {
        info!(endpoint = %self.endpoint, bytes = bpmn.len(), "calling transformer");
        let sent = self
            .agent
            .post(&self.endpoint)
            .query("direction", DIRECTION)
            .send_form([("bpmn", bpmn)]);
        let body = read_response(SERVICE, sent)?;
        debug!(bytes = body.len(), "transformer replied");

        parse_pnml(&body)
    }
}

/// Extracts the PNML document from a transformer response body.
pub fn parse_pnml(body: &str) -> Result<String> {
    serde_json::from_str::<TransformResponse>(body)
        .map(|response| response.pnml)
        .map_err(|e| Error::Transport {
            service: SERVICE,
            message: format!("unexpected response ({}): {}", e, truncate(body)),
        })
}
