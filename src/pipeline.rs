//! Text -> LLM -> BPMN, optionally followed by the PNML transformer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::encoder::{Encoder, EncoderOptions, OutputFormat};
use crate::error::{Error, ErrorClass, Result};
use crate::upstream::{ModelTransformer, ProcessGenerator};

/// Requested output of a pipeline run. `PnmlToBpmn` stops after encoding
/// and returns the BPMN document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "pnmltobpmn")]
    PnmlToBpmn,
    #[serde(rename = "bpmntopnml")]
    BpmnToPnml,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::PnmlToBpmn => "pnmltobpmn",
            Direction::BpmnToPnml => "bpmntopnml",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pnmltobpmn" => Ok(Direction::PnmlToBpmn),
            "bpmntopnml" => Ok(Direction::BpmnToPnml),
            other => Err(Error::Config(format!(
                "Unknown direction '{}'. Available: pnmltobpmn, bpmntopnml",
                other
            ))),
        }
    }
}

/// Incoming request body. Both fields are required; they are optional here
/// so that every missing one can be reported at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl PipelineRequest {
    pub fn new(text: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            api_key: Some(api_key.into()),
        }
    }

    /// Returns `(text, api_key)` or every missing field name.
    pub fn validate(&self) -> Result<(&str, &str)> {
        let mut missing = Vec::new();
        if self.text.is_none() {
            missing.push("text");
        }
        if self.api_key.is_none() {
            missing.push("api_key");
        }
        match (self.text.as_deref(), self.api_key.as_deref()) {
            (Some(text), Some(api_key)) => Ok((text, api_key)),
            _ => Err(Error::MissingRequestFields(missing)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResponse {
    pub result: String,
}

pub struct Pipeline<G, T> {
    generator: G,
    transformer: T,
    encoder: Encoder,
}

impl<G: ProcessGenerator, T: ModelTransformer> Pipeline<G, T> {
    /// The transformer consumes BPMN, so the encoder always emits BPMN here
    /// regardless of `options.format`.
    pub fn new(generator: G, transformer: T, options: EncoderOptions) -> Self {
        let options = EncoderOptions {
            format: OutputFormat::Bpmn,
            ..options
        };
        Self {
            generator,
            transformer,
            encoder: Encoder::new(options),
        }
    }

    pub fn run(&self, request: &PipelineRequest, direction: Direction) -> Result<PipelineResponse> {
        let (text, api_key) = request.validate()?;
        info!(%direction, chars = text.chars().count(), "pipeline call");

        let reply = self.generator.generate(text, api_key)?;
        let bpmn = self.encoder.encode_reply(&reply)?;
        let result = match direction {
            Direction::PnmlToBpmn => bpmn,
            Direction::BpmnToPnml => self.transformer.bpmn_to_pnml(&bpmn)?,
        };
        info!(%direction, bytes = result.len(), "pipeline finished");
        Ok(PipelineResponse { result })
    }

    /// Like [`Pipeline::run`], but folds failures into an [`ErrorEnvelope`].
    pub fn handle(
        &self,
        request: &PipelineRequest,
        direction: Direction,
    ) -> std::result::Result<PipelineResponse, ErrorEnvelope> {
        self.run(request, direction).map_err(|e| {
            error!(%direction, class = e.class().as_str(), error = %e, "pipeline failed");
            ErrorEnvelope::from_error(&e)
        })
    }
}

/// JSON error body plus the status a hosting HTTP layer should answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    #[serde(skip)]
    pub status: u16,
    pub error: String,
    pub details: ErrorDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_status_code: Option<u16>,
}

impl ErrorEnvelope {
    pub fn from_error(err: &Error) -> Self {
        let class = err.class();
        let headline = match err {
            Error::MissingRequestFields(_) => err.to_string(),
            Error::Upstream { service, .. } | Error::Transport { service, .. } => {
                format!("Failed to get a usable response from {}.", service)
            }
            _ => match class {
                ErrorClass::ClientInput => "The generated process model is invalid.".to_string(),
                ErrorClass::UpstreamPayload => {
                    "The LLM response could not be read as a process model.".to_string()
                }
                ErrorClass::Upstream | ErrorClass::Internal => {
                    "An unexpected internal server error occurred.".to_string()
                }
            },
        };
        let service_status_code = match err {
            Error::Upstream { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            status: class.status_code(),
            error: headline,
            details: ErrorDetails {
                kind: class.as_str(),
                message: err.to_string(),
                service_status_code,
            },
        }
    }
}
