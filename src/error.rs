//! Error type shared by the encoder, the upstream clients and the CLI.

use serde_json::Value;

use crate::encoder::NodeCategory;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "Invalid {category} type: '{value}'. Only [{}] are supported. Got: {record}",
        allowed.join(", ")
    )]
    InvalidElementType {
        category: &'static str,
        value: String,
        allowed: Vec<&'static str>,
        record: Value,
    },

    #[error("{category} record is missing required field '{field}': {record}")]
    MissingField {
        category: &'static str,
        field: &'static str,
        record: Value,
    },

    #[error("invalid LLM response: {0}")]
    MalformedUpstreamPayload(String),

    #[error("duplicate element id '{id}' (declared as {first} and as {second})")]
    DuplicateId {
        id: String,
        first: NodeCategory,
        second: NodeCategory,
    },

    #[error("flow '{flow}' references unknown element '{endpoint}'")]
    DanglingReference { flow: String, endpoint: String },

    #[error("Missing data for: {}", .0.join(", "))]
    MissingRequestFields(Vec<&'static str>),

    #[error("failed to write XML: {0}")]
    Xml(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{service} responded with status {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to communicate with {service}: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used when mapping an [`Error`] onto a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller's input (or the graph derived from it) is wrong; retrying won't help.
    ClientInput,
    /// The LLM produced something that is not a process graph.
    UpstreamPayload,
    /// An upstream service failed or could not be reached.
    Upstream,
    Internal,
}

impl ErrorClass {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::ClientInput => 400,
            ErrorClass::UpstreamPayload | ErrorClass::Upstream => 502,
            ErrorClass::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::ClientInput => "InvalidInput",
            ErrorClass::UpstreamPayload => "InvalidLlmResponse",
            ErrorClass::Upstream => "UpstreamServiceError",
            ErrorClass::Internal => "InternalServerError",
        }
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidElementType { .. }
            | Error::DuplicateId { .. }
            | Error::DanglingReference { .. }
            | Error::MissingRequestFields(_) => ErrorClass::ClientInput,
            Error::MissingField { .. } | Error::MalformedUpstreamPayload(_) => {
                ErrorClass::UpstreamPayload
            }
            Error::Upstream { .. } | Error::Transport { .. } => ErrorClass::Upstream,
            Error::Xml(_) | Error::Config(_) | Error::Io(_) => ErrorClass::Internal,
        }
    }

    pub(crate) fn xml<E: std::fmt::Display>(err: E) -> Self {
        Error::Xml(err.to_string())
    }
}
