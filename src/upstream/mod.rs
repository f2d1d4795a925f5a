//! Blocking clients for the LLM connector and the BPMN/PNML transformer.

mod llm;
mod transformer;

use std::time::Duration;

use ureq::Body;
use ureq::http::Response;

use crate::error::{Error, Result};

pub use llm::{LlmConnector, LlmRequest, parse_message};
pub use transformer::{TransformerClient, parse_pnml};

/// Turns a process description into the LLM's raw JSON reply.
pub trait ProcessGenerator {
    fn generate(&self, user_text: &str, api_key: &str) -> Result<String>;
}

/// Converts a BPMN document into PNML.
pub trait ModelTransformer {
    fn bpmn_to_pnml(&self, bpmn: &str) -> Result<String>;
}

const MAX_LOGGED_BODY: usize = 500;

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Reads the body of an exchange, mapping non-2xx statuses to
/// [`Error::Upstream`] and everything else that goes wrong to
/// [`Error::Transport`].
fn read_response(
    service: &'static str,
    sent: std::result::Result<Response<Body>, ureq::Error>,
) -> Result<String> {
    let mut response = sent.map_err(|e| transport(service, e))?;
    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| transport(service, e))?;

    if !status.is_success() {
        return Err(Error::Upstream {
            service,
            status: status.as_u16(),
            body: truncate(&body),
        });
    }
    Ok(body)
}

fn transport(service: &'static str, err: impl std::fmt::Display) -> Error {
    Error::Transport {
        service,
        message: err.to_string(),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_LOGGED_BODY {
        return body.to_string();
    }
    let mut end = MAX_LOGGED_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, total {} bytes)", &body[..end], body.len())
}
