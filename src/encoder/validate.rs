//! Type validation: converts raw records into the typed [`ProcessGraph`].
//!
//! Free-form `type` strings are resolved into the closed kind enums here and
//! nowhere else.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::intake::{RawFlow, RawGraph, RawNode};
use super::types::{
    ElementKind, EventKind, Flow, GatewayKind, Node, NodeCategory, ProcessGraph, TaskKind,
};
use crate::error::{Error, Result};

/// How `type` tags outside the allow-list are handled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TypePolicy {
    /// Case-sensitive allow-list; anything else aborts the encode.
    #[default]
    Strict,
    /// Case-insensitive lookup; unknown tags become the category's fallback kind.
    Lenient,
}

/// What to do with a flow whose endpoint is not a declared node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DanglingPolicy {
    /// Emit the edge anyway, with fallback waypoints.
    #[default]
    Lenient,
    Strict,
}

const FLOW_SPELLINGS: [&str; 2] = ["SequenceFlow", "sequenceFlow"];

/// Resolves a raw `type` string into a kind of category `K`.
///
/// Returns `None` only under [`TypePolicy::Strict`].
pub fn resolve_kind<K: ElementKind>(raw: Option<&str>, policy: TypePolicy) -> Option<K> {
    match policy {
        TypePolicy::Strict => {
            let raw = raw?;
            K::ALLOWED
                .iter()
                .copied()
                .find(|kind| kind.spellings().iter().any(|s| *s == raw))
        }
        TypePolicy::Lenient => {
            let wanted = raw.map(normalize).unwrap_or_default();
            K::ALLOWED
                .iter()
                .chain(K::LENIENT_ONLY)
                .copied()
                .find(|kind| kind.spellings().iter().any(|s| normalize(s) == wanted))
                .or_else(|| Some(K::fallback()))
        }
    }
}

/// The strict allow-list of `K`, as reported in validation errors.
pub fn allowed_labels<K: ElementKind>() -> Vec<&'static str> {
    K::ALLOWED.iter().map(|kind| kind.label()).collect()
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Checks one record against its category and builds the typed node.
pub fn validate_node<K: ElementKind>(raw: &RawNode, policy: TypePolicy) -> Result<Node<K>> {
    let kind = resolve_kind::<K>(raw.kind.as_deref(), policy).ok_or_else(|| {
        Error::InvalidElementType {
            category: K::CATEGORY.as_str(),
            value: raw.kind.clone().unwrap_or_default(),
            allowed: allowed_labels::<K>(),
            record: raw.record.clone(),
        }
    })?;

    if policy == TypePolicy::Lenient {
        let exact = raw
            .kind
            .as_deref()
            .is_some_and(|k| kind.spellings().iter().any(|s| *s == k));
        if !exact {
            warn!(
                id = %raw.id,
                category = %K::CATEGORY,
                raw_type = raw.kind.as_deref().unwrap_or(""),
                resolved = kind.label(),
                "coerced element type"
            );
        }
    }

    Ok(Node {
        id: raw.id.clone(),
        kind,
        name: raw.name.clone(),
    })
}

fn validate_flow(raw: &RawFlow, policy: TypePolicy) -> Result<Flow> {
    if policy == TypePolicy::Strict
        && let Some(kind) = raw.kind.as_deref()
        && !FLOW_SPELLINGS.iter().any(|s| *s == kind)
    {
        return Err(Error::InvalidElementType {
            category: "flow",
            value: kind.to_string(),
            allowed: vec![FLOW_SPELLINGS[0]],
            record: raw.record.clone(),
        });
    }
    Ok(Flow::new(&raw.id, &raw.source, &raw.target))
}

/// Validates a whole raw graph. All-or-nothing: the first failure aborts.
pub fn validate_graph(
    raw: &RawGraph,
    policy: TypePolicy,
    dangling: DanglingPolicy,
) -> Result<ProcessGraph> {
    let graph = ProcessGraph {
        events: validate_all::<EventKind>(raw.nodes(NodeCategory::Event), policy)?,
        tasks: validate_all::<TaskKind>(raw.nodes(NodeCategory::Task), policy)?,
        gateways: validate_all::<GatewayKind>(raw.nodes(NodeCategory::Gateway), policy)?,
        flows: raw
            .flows
            .iter()
            .map(|flow| validate_flow(flow, policy))
            .collect::<Result<Vec<_>>>()?,
    };

    if policy == TypePolicy::Strict {
        check_unique_ids(&graph)?;
    }
    check_references(&graph, dangling)?;
    Ok(graph)
}

fn validate_all<K: ElementKind>(raw: &[RawNode], policy: TypePolicy) -> Result<Vec<Node<K>>> {
    raw.iter().map(|node| validate_node::<K>(node, policy)).collect()
}

fn check_unique_ids(graph: &ProcessGraph) -> Result<()> {
    let mut seen: HashMap<&str, NodeCategory> = HashMap::new();
    for node in graph.nodes() {
        if let Some(&first) = seen.get(node.id) {
            return Err(Error::DuplicateId {
                id: node.id.to_string(),
                first,
                second: node.category,
            });
        }
        seen.insert(node.id, node.category);
    }
    Ok(())
}

fn check_references(graph: &ProcessGraph, policy: DanglingPolicy) -> Result<()> {
    for flow in &graph.flows {
        for endpoint in [&flow.source, &flow.target] {
            if graph.find(endpoint).is_some() {
                continue;
            }
            if policy == DanglingPolicy::Strict {
                return Err(Error::DanglingReference {
                    flow: flow.id.clone(),
                    endpoint: endpoint.clone(),
                });
            }
            warn!(flow = %flow.id, endpoint = %endpoint, "flow references unknown element");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::intake::from_value;
    use serde_json::json;

    fn raw_task(kind: &str) -> RawNode {
        RawNode {
            id: "t1".to_string(),
            kind: Some(kind.to_string()),
            name: Some("X".to_string()),
            record: json!({"id": "t1", "type": kind, "name": "X"}),
        }
    }

    #[test]
    fn strict_accepts_label_element_name_and_tag() {
        for spelling in ["Exclusive", "ExclusiveGateway", "exclusiveGateway"] {
            assert_eq!(
                resolve_kind::<GatewayKind>(Some(spelling), TypePolicy::Strict),
                Some(GatewayKind::Exclusive)
            );
        }
        assert_eq!(
            resolve_kind::<EventKind>(Some("Start"), TypePolicy::Strict),
            Some(EventKind::Start)
        );
    }

    #[test]
    fn strict_is_case_sensitive() {
        assert_eq!(resolve_kind::<TaskKind>(Some("USERTASK"), TypePolicy::Strict), None);
        assert_eq!(resolve_kind::<TaskKind>(None, TypePolicy::Strict), None);
    }

    #[test]
    fn strict_rejects_intermediate_events() {
        assert_eq!(
            resolve_kind::<EventKind>(Some("IntermediateCatch"), TypePolicy::Strict),
            None
        );
    }

    #[test]
    fn lenient_ignores_case_and_separators() {
        assert_eq!(
            resolve_kind::<TaskKind>(Some("business_rule task"), TypePolicy::Lenient),
            Some(TaskKind::BusinessRuleTask)
        );
        assert_eq!(
            resolve_kind::<GatewayKind>(Some("PARALLEL"), TypePolicy::Lenient),
            Some(GatewayKind::Parallel)
        );
    }

    #[test]
    fn lenient_falls_back_per_category() {
        assert_eq!(
            resolve_kind::<EventKind>(Some("Timer"), TypePolicy::Lenient),
            Some(EventKind::IntermediateCatch)
        );
        assert_eq!(
            resolve_kind::<TaskKind>(None, TypePolicy::Lenient),
            Some(TaskKind::Task)
        );
        assert_eq!(
            resolve_kind::<GatewayKind>(Some("Whatever"), TypePolicy::Lenient),
            Some(GatewayKind::Exclusive)
        );
    }

    #[test]
    fn invalid_task_type_names_value_and_allowed_set() {
        let err = validate_node::<TaskKind>(&raw_task("BogusTask"), TypePolicy::Strict).unwrap_err();
        match err {
            Error::InvalidElementType {
                category,
                value,
                allowed,
                record,
            } => {
                assert_eq!(category, "task");
                assert_eq!(value, "BogusTask");
                assert_eq!(allowed.len(), 8);
                assert!(allowed.contains(&"BusinessRuleTask"));
                assert_eq!(record["id"], "t1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_ids_across_categories_are_rejected_when_strict() {
        let raw = from_value(&json!({
            "events": [{"id": "x", "type": "Start"}],
            "tasks": [{"id": "x", "type": "Task"}]
        }))
        .unwrap();
        let err = validate_graph(&raw, TypePolicy::Strict, DanglingPolicy::Lenient).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateId {
                first: NodeCategory::Event,
                second: NodeCategory::Task,
                ..
            }
        ));

        let graph = validate_graph(&raw, TypePolicy::Lenient, DanglingPolicy::Lenient).unwrap();
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn dangling_reference_depends_on_policy() {
        let raw = from_value(&json!({
            "tasks": [{"id": "t1", "type": "Task"}],
            "flows": [{"id": "f1", "source": "missing1", "target": "t1"}]
        }))
        .unwrap();

        let graph = validate_graph(&raw, TypePolicy::Strict, DanglingPolicy::Lenient).unwrap();
        assert_eq!(graph.flows[0].source, "missing1");

        let err = validate_graph(&raw, TypePolicy::Strict, DanglingPolicy::Strict).unwrap_err();
        assert!(matches!(err, Error::DanglingReference { ref endpoint, .. } if endpoint == "missing1"));
    }

    #[test]
    fn strict_rejects_unknown_flow_type() {
        let raw = from_value(&json!({
            "flows": [{"id": "f1", "source": "a", "target": "b", "type": "MessageFlow"}]
        }))
        .unwrap();
        let err = validate_graph(&raw, TypePolicy::Strict, DanglingPolicy::Lenient).unwrap_err();
        assert!(err.to_string().contains("MessageFlow"));
    }
}
