//! Turns LLM-produced process graphs into BPMN 2.0 diagrams and PNML nets.

pub mod artifact;
pub mod config;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod upstream;
pub mod xml;

pub use config::{LlmProvider, Settings, UpstreamConfig};
pub use encoder::{
    DanglingPolicy, Encoder, EncoderOptions, OutputFormat, ProcessGraph, TypePolicy, encode_json,
};
pub use error::{Error, ErrorClass, Result};
pub use pipeline::{Direction, ErrorEnvelope, Pipeline, PipelineRequest, PipelineResponse};
pub use upstream::{LlmConnector, ModelTransformer, ProcessGenerator, TransformerClient};
