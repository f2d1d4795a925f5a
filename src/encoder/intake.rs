//! Graph intake: turns the LLM's reply into flat, untyped records.
//!
//! Nothing here interprets `type` tags; that is the validator's job. Intake only
//! rejects payloads that do not have the shape of a process graph at all.

use serde_json::{Map, Value};
use tracing::debug;

use super::types::NodeCategory;
use crate::error::{Error, Result};

/// One event, task or gateway record as the LLM produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: String,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub record: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFlow {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: Option<String>,
    pub record: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGraph {
    pub events: Vec<RawNode>,
    pub tasks: Vec<RawNode>,
    pub gateways: Vec<RawNode>,
    pub flows: Vec<RawFlow>,
}

impl RawGraph {
    pub fn nodes(&self, category: NodeCategory) -> &[RawNode] {
        match category {
            NodeCategory::Event => &self.events,
            NodeCategory::Task => &self.tasks,
            NodeCategory::Gateway => &self.gateways,
        }
    }
}

/// Parses the text returned by the LLM connector.
///
/// Replies wrapped in prose or markdown fences are accepted as long as they
/// contain one balanced JSON object.
pub fn parse_reply(text: &str) -> Result<RawGraph> {
    let trimmed = text.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(direct) => {
            let candidate = first_json_object(trimmed).ok_or_else(|| {
                Error::MalformedUpstreamPayload(format!("reply is not JSON: {}", direct))
            })?;
            debug!("extracted JSON object from wrapped LLM reply");
            serde_json::from_str(candidate)
                .map_err(|e| Error::MalformedUpstreamPayload(format!("reply is not JSON: {}", e)))?
        }
    };
    from_value(&value)
}

/// Reads a process graph from an already-parsed JSON value.
///
/// A missing (or `null`) category is treated as empty; unknown top-level keys
/// such as `participants` are ignored.
pub fn from_value(value: &Value) -> Result<RawGraph> {
    let object = value.as_object().ok_or_else(|| {
        Error::MalformedUpstreamPayload(format!(
            "expected a JSON object with events/tasks/gateways/flows, got {}",
            json_type(value)
        ))
    })?;

    let mut graph = RawGraph::default();
    for category in [NodeCategory::Event, NodeCategory::Task, NodeCategory::Gateway] {
        let records = collection(object, category.collection())?;
        let nodes = records
            .iter()
            .map(|record| read_node(category, record))
            .collect::<Result<Vec<_>>>()?;
        match category {
            NodeCategory::Event => graph.events = nodes,
            NodeCategory::Task => graph.tasks = nodes,
            NodeCategory::Gateway => graph.gateways = nodes,
        }
    }
    graph.flows = collection(object, "flows")?
        .iter()
        .map(read_flow)
        .collect::<Result<Vec<_>>>()?;

    debug!(
        events = graph.events.len(),
        tasks = graph.tasks.len(),
        gateways = graph.gateways.len(),
        flows = graph.flows.len(),
        "graph intake complete"
    );
    Ok(graph)
}

const NO_RECORDS: &[Value] = &[];

fn collection<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a [Value]> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(NO_RECORDS),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(Error::MalformedUpstreamPayload(format!(
            "'{}' must be an array, got {}",
            key,
            json_type(other)
        ))),
    }
}

fn read_node(category: NodeCategory, record: &Value) -> Result<RawNode> {
    let label = category.as_str();
    let fields = record_fields(label, record)?;
    Ok(RawNode {
        id: required_str(label, "id", fields, record)?,
        kind: optional_str(fields, "type"),
        name: optional_str(fields, "name"),
        record: record.clone(),
    })
}

fn read_flow(record: &Value) -> Result<RawFlow> {
    let fields = record_fields("flow", record)?;
    Ok(RawFlow {
        id: required_str("flow", "id", fields, record)?,
        source: required_str("flow", "source", fields, record)?,
        target: required_str("flow", "target", fields, record)?,
        kind: optional_str(fields, "type"),
        record: record.clone(),
    })
}

fn record_fields<'a>(label: &str, record: &'a Value) -> Result<&'a Map<String, Value>> {
    record.as_object().ok_or_else(|| {
        Error::MalformedUpstreamPayload(format!(
            "{} record must be an object, got {}",
            label,
            json_type(record)
        ))
    })
}

fn required_str(
    category: &'static str,
    field: &'static str,
    fields: &Map<String, Value>,
    record: &Value,
) -> Result<String> {
    scalar_string(fields.get(field)).ok_or_else(|| Error::MissingField {
        category,
        field,
        record: record.clone(),
    })
}

fn optional_str(fields: &Map<String, Value>, field: &str) -> Option<String> {
    scalar_string(fields.get(field))
}

// LLMs sometimes emit numeric ids; those are kept as their JSON text.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Returns the first balanced `{...}` in `text`, skipping braces inside strings.
fn first_json_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' if start.is_some() => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|p| &text[p..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
