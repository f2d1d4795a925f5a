//! Process-graph to BPMN/PNML encoder.
//!
//! The pipeline is intake -> validation -> layout -> document assembly. Every
//! call builds its own graph, layout and writer; nothing is shared between
//! calls.

mod bpmn;
mod intake;
mod layout;
mod pnml;
mod types;
mod validate;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::artifact;
use crate::error::Result;
use crate::xml::XmlWriter;

use bpmn::BpmnDocument;
use pnml::PnmlDocument;

pub use bpmn::{NS_BPMNDI, NS_DC, NS_DI, NS_MODEL, NS_XSI};
pub use intake::{RawFlow, RawGraph, RawNode, from_value, parse_reply};
pub use layout::{FALLBACK_WAYPOINTS, Layout, LayoutConfig, LayoutEngine, LayoutPos, dimensions};
pub use pnml::NET_TYPE;
pub use types::{
    ElementKind, Event, EventKind, Flow, Gateway, GatewayKind, Node, NodeCategory, NodeRef,
    ProcessGraph, Task, TaskKind,
};
pub use validate::{
    DanglingPolicy, TypePolicy, allowed_labels, resolve_kind, validate_graph, validate_node,
};

/// Output document kind.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bpmn,
    Pnml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bpmn => "bpmn",
            OutputFormat::Pnml => "pnml",
        }
    }

    /// Fixed name of the debug copy written next to each encode.
    pub fn side_file_name(self) -> &'static str {
        match self {
            OutputFormat::Bpmn => "bpmn_output.bpmn",
            OutputFormat::Pnml => "pnml_output.pnml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderOptions {
    #[serde(default)]
    pub policy: TypePolicy,
    #[serde(default)]
    pub format: OutputFormat,
    /// Emit `incoming`/`outgoing` children on BPMN nodes.
    #[serde(default = "default_wiring")]
    pub wiring: bool,
    #[serde(default)]
    pub dangling: DanglingPolicy,
    #[serde(default)]
    pub side_file: bool,
    #[serde(default = "default_side_file_dir")]
    pub side_file_dir: PathBuf,
    #[serde(default = "default_process_id")]
    pub process_id: String,
    #[serde(default = "default_target_namespace")]
    pub target_namespace: String,
    #[serde(default)]
    pub layout: LayoutConfig,
}

fn default_wiring() -> bool {
    true
}
fn default_side_file_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_process_id() -> String {
    "Process_1".to_string()
}
fn default_target_namespace() -> String {
    "http://example.bpmn.com/schema/bpmn".to_string()
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            policy: TypePolicy::default(),
            format: OutputFormat::default(),
            wiring: default_wiring(),
            dangling: DanglingPolicy::default(),
            side_file: false,
            side_file_dir: default_side_file_dir(),
            process_id: default_process_id(),
            target_namespace: default_target_namespace(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Stateless encoder; one instance can serve any number of calls.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncoderOptions,
}

impl Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Encodes the raw text of an LLM reply.
    pub fn encode_reply(&self, reply: &str) -> Result<String> {
        let raw = parse_reply(reply)?;
        self.encode_raw(&raw)
    }

    pub fn encode_value(&self, value: &Value) -> Result<String> {
        let raw = from_value(value)?;
        self.encode_raw(&raw)
    }

    pub fn encode_raw(&self, raw: &RawGraph) -> Result<String> {
        let graph = validate_graph(raw, self.options.policy, self.options.dangling)?;
        self.encode_graph(&graph)
    }

    /// Lays out and serializes an already validated graph.
    pub fn encode_graph(&self, graph: &ProcessGraph) -> Result<String> {
        let xml = self.assemble(graph)?;
        debug!(
            format = self.options.format.extension(),
            nodes = graph.node_count(),
            flows = graph.flows.len(),
            bytes = xml.len(),
            "encoded process graph"
        );
        if self.options.side_file {
            artifact::persist(
                &self.options.side_file_dir,
                self.options.format.side_file_name(),
                &xml,
            );
        }
        Ok(xml)
    }

    fn assemble(&self, graph: &ProcessGraph) -> Result<String> {
        let mut w = XmlWriter::new();
        match self.options.format {
            OutputFormat::Bpmn => {
                let layout = LayoutEngine::new(self.options.layout).layout(graph);
                BpmnDocument {
                    graph,
                    layout: &layout,
                    process_id: &self.options.process_id,
                    target_namespace: &self.options.target_namespace,
                    wiring: self.options.wiring,
                }
                .write(&mut w)?;
            }
            OutputFormat::Pnml => {
                // Gateways are dropped, so they must not take up columns either.
                let net = ProcessGraph {
                    gateways: Vec::new(),
                    ..graph.clone()
                };
                let layout = LayoutEngine::new(self.options.layout).layout(&net);
                PnmlDocument {
                    graph: &net,
                    layout: &layout,
                    net_id: &self.options.process_id,
                }
                .write(&mut w)?;
            }
        }
        w.finish()
    }
}

/// Encodes an LLM reply to BPMN with default options.
pub fn encode_json(reply: &str) -> Result<String> {
    Encoder::default().encode_reply(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use quick_xml::Reader;
    use quick_xml::events::{BytesStart, Event as XmlEvent};
    use serde_json::json;
    use std::collections::HashMap;

    /// Tag name, attributes and text children of every element, in document order.
    #[derive(Debug, Clone)]
    struct Elem {
        tag: String,
        attrs: HashMap<String, String>,
        text: Option<String>,
        children: Vec<(String, String)>,
    }

    fn elem(e: &BytesStart<'_>) -> Elem {
        let tag = String::from_utf8(e.name().as_ref().to_vec()).unwrap();
        let attrs = e
            .attributes()
            .map(|a| {
                let a = a.unwrap();
                (
                    String::from_utf8(a.key.as_ref().to_vec()).unwrap(),
                    a.unescape_value().unwrap().into_owned(),
                )
            })
            .collect();
        Elem {
            tag,
            attrs,
            text: None,
            children: Vec::new(),
        }
    }

    fn elements(xml: &str) -> Vec<Elem> {
        let mut reader = Reader::from_str(xml);
        let mut out: Vec<Elem> = Vec::new();
        let mut open: Vec<usize> = Vec::new();

        loop {
            match reader.read_event().unwrap() {
                XmlEvent::Start(e) => {
                    out.push(elem(&e));
                    open.push(out.len() - 1);
                }
                XmlEvent::Empty(e) => out.push(elem(&e)),
                XmlEvent::Text(t) => {
                    let text = t.decode().unwrap();
                    if let Some(&top) = open.last()
                        && !text.trim().is_empty()
                    {
                        out[top].text = Some(text.into_owned());
                    }
                }
                XmlEvent::End(_) => {
                    let closed = open.pop().unwrap();
                    if let (Some(text), Some(&parent)) = (out[closed].text.clone(), open.last()) {
                        let tag = out[closed].tag.clone();
                        out[parent].children.push((tag, text));
                    }
                }
                XmlEvent::Eof => break,
                _ => {}
            }
        }
        out
    }

    fn find<'a>(elems: &'a [Elem], tag: &str, id: &str) -> &'a Elem {
        elems
            .iter()
            .find(|e| e.tag == tag && e.attrs.get("id").map(String::as_str) == Some(id))
            .unwrap_or_else(|| panic!("no <{tag} id=\"{id}\">"))
    }

    fn count(elems: &[Elem], tag: &str) -> usize {
        elems.iter().filter(|e| e.tag == tag).count()
    }

    fn scenario_one() -> Value {
        json!({
            "events": [{"id": "s1", "type": "Start", "name": "Begin"}],
            "tasks": [{"id": "t1", "type": "UserTask", "name": "Review"}],
            "gateways": [],
            "flows": [{"id": "f1", "source": "s1", "target": "t1"}]
        })
    }

    #[test]
    fn start_event_user_task_and_flow_are_encoded() {
        let xml = Encoder::default().encode_value(&scenario_one()).unwrap();
        let elems = elements(&xml);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        let start = find(&elems, "startEvent", "s1");
        assert_eq!(start.attrs["name"], "Begin");
        find(&elems, "userTask", "t1");
        let flow = find(&elems, "sequenceFlow", "f1");
        assert_eq!(flow.attrs["sourceRef"], "s1");
        assert_eq!(flow.attrs["targetRef"], "t1");

        find(&elems, "bpmndi:BPMNShape", "s1_di");
        find(&elems, "bpmndi:BPMNShape", "t1_di");
        find(&elems, "bpmndi:BPMNEdge", "f1_di");
        assert_eq!(count(&elems, "di:waypoint"), 2);
    }

    #[test]
    fn root_declares_namespaces_and_plane_references_process() {
        let xml = Encoder::default().encode_value(&scenario_one()).unwrap();
        let elems = elements(&xml);

        let root = &elems[0];
        assert_eq!(root.tag, "definitions");
        assert_eq!(root.attrs["xmlns"], NS_MODEL);
        assert_eq!(root.attrs["xmlns:bpmndi"], NS_BPMNDI);
        assert_eq!(root.attrs["xmlns:di"], NS_DI);
        assert_eq!(root.attrs["xmlns:dc"], NS_DC);
        assert_eq!(root.attrs["xmlns:xsi"], NS_XSI);

        let process = find(&elems, "process", "Process_1");
        assert_eq!(process.attrs["isExecutable"], "false");
        let plane = find(&elems, "bpmndi:BPMNPlane", "BPMNPlane_1");
        assert_eq!(plane.attrs["bpmnElement"], "Process_1");
    }

    #[test]
    fn unknown_task_type_aborts_without_output() {
        let payload = json!({"tasks": [{"id": "t1", "type": "BogusTask", "name": "X"}]});
        let err = Encoder::default().encode_value(&payload).unwrap_err();
        match err {
            Error::InvalidElementType { value, allowed, .. } => {
                assert_eq!(value, "BogusTask");
                assert_eq!(allowed, allowed_labels::<TaskKind>());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dangling_source_gets_fallback_waypoints() {
        let payload = json!({
            "tasks": [{"id": "t1", "type": "Task"}],
            "flows": [{"id": "f1", "source": "missing1", "target": "t1"}]
        });
        let xml = Encoder::default().encode_value(&payload).unwrap();
        let elems = elements(&xml);

        let flow = find(&elems, "sequenceFlow", "f1");
        assert_eq!(flow.attrs["sourceRef"], "missing1");
        let waypoints: Vec<(&str, &str)> = elems
            .iter()
            .filter(|e| e.tag == "di:waypoint")
            .map(|e| (e.attrs["x"].as_str(), e.attrs["y"].as_str()))
            .collect();
        assert_eq!(waypoints, vec![("120", "150"), ("250", "150")]);
    }

    #[test]
    fn minimal_start_end_document() {
        let payload = json!({
            "events": [
                {"id": "start1", "type": "Start", "name": ""},
                {"id": "end1", "type": "End", "name": ""}
            ],
            "tasks": [],
            "gateways": [],
            "flows": [{"id": "flow1", "source": "start1", "target": "end1", "type": "SequenceFlow"}]
        });
        let xml = Encoder::default().encode_value(&payload).unwrap();
        let elems = elements(&xml);

        assert_eq!(count(&elems, "startEvent"), 1);
        assert_eq!(count(&elems, "endEvent"), 1);
        assert_eq!(count(&elems, "sequenceFlow"), 1);
        assert_eq!(count(&elems, "bpmndi:BPMNShape"), 2);
        assert_eq!(count(&elems, "bpmndi:BPMNEdge"), 1);
    }

    #[test]
    fn wiring_lists_flow_ids_on_both_ends() {
        let xml = Encoder::default().encode_value(&scenario_one()).unwrap();
        assert!(xml.contains("<outgoing>f1</outgoing>"));
        assert!(xml.contains("<incoming>f1</incoming>"));

        let unwired = Encoder::new(EncoderOptions {
            wiring: false,
            ..EncoderOptions::default()
        })
        .encode_value(&scenario_one())
        .unwrap();
        assert!(!unwired.contains("<incoming>"));
        assert!(!unwired.contains("<outgoing>"));
    }

    #[test]
    fn every_node_gets_bounds_matching_its_category() {
        let payload = json!({
            "events": [{"id": "s", "type": "Start"}],
            "tasks": [{"id": "t", "type": "ServiceTask"}],
            "gateways": [{"id": "g", "type": "ParallelGateway"}],
            "flows": []
        });
        let xml = Encoder::default().encode_value(&payload).unwrap();
        let elems = elements(&xml);
        let bounds: Vec<(&str, &str)> = elems
            .iter()
            .filter(|e| e.tag == "dc:Bounds")
            .map(|e| (e.attrs["width"].as_str(), e.attrs["height"].as_str()))
            .collect();
        assert_eq!(bounds, vec![("36", "36"), ("100", "80"), ("50", "50")]);
    }

    #[test]
    fn lenient_policy_maps_unknown_types_to_fallbacks() {
        let payload = json!({
            "events": [{"id": "e", "type": "timer"}],
            "tasks": [{"id": "t", "type": "usertask"}],
            "gateways": [{"id": "g", "type": "Fork"}]
        });
        let encoder = Encoder::new(EncoderOptions {
            policy: TypePolicy::Lenient,
            ..EncoderOptions::default()
        });
        let elems = elements(&encoder.encode_value(&payload).unwrap());
        find(&elems, "intermediateCatchEvent", "e");
        find(&elems, "userTask", "t");
        find(&elems, "exclusiveGateway", "g");
    }

    #[test]
    fn names_with_markup_are_escaped() {
        let payload = json!({"tasks": [{"id": "t", "type": "Task", "name": "Check <stock> & \"price\""}]});
        let xml = Encoder::default().encode_value(&payload).unwrap();
        let elems = elements(&xml);
        assert_eq!(find(&elems, "task", "t").attrs["name"], "Check <stock> & \"price\"");
    }

    #[test]
    fn multi_line_names_survive_attribute_normalization() {
        let payload = json!({"tasks": [{"id": "t", "type": "Task", "name": "Line1\nLine2\tend"}]});
        let xml = Encoder::default().encode_value(&payload).unwrap();
        assert!(xml.contains("name=\"Line1&#10;Line2&#9;end\""));
        assert!(!xml.contains("Line1\n"));

        let elems = elements(&xml);
        assert_eq!(find(&elems, "task", "t").attrs["name"], "Line1\nLine2\tend");
    }

    #[test]
    fn every_allowed_kind_is_written_with_its_own_tag() {
        fn check<K: ElementKind>(category: NodeCategory) {
            for (i, kind) in K::ALLOWED.iter().enumerate() {
                let id = format!("{}{}", category.as_str(), i);
                let payload = json!({
                    category.collection(): [{"id": id, "type": kind.label()}]
                });
                let xml = Encoder::default().encode_value(&payload).unwrap();
                let elems = elements(&xml);
                let node = find(&elems, kind.bpmn_tag(), &id);
                assert_eq!(node.attrs["id"], id);
                assert_eq!(count(&elems, "bpmndi:BPMNShape"), 1);
            }
        }
        check::<EventKind>(NodeCategory::Event);
        check::<TaskKind>(NodeCategory::Task);
        check::<GatewayKind>(NodeCategory::Gateway);
    }

    #[test]
    fn pnml_maps_events_to_places_and_tasks_to_transitions() {
        let payload = json!({
            "events": [
                {"id": "s", "type": "Start", "name": "Begin"},
                {"id": "e", "type": "End", "name": "Done"}
            ],
            "tasks": [{"id": "t", "type": "UserTask", "name": "Work"}],
            "gateways": [{"id": "g", "type": "ExclusiveGateway"}],
            "flows": [
                {"id": "f1", "source": "s", "target": "t"},
                {"id": "f2", "source": "t", "target": "e"}
            ]
        });
        let encoder = Encoder::new(EncoderOptions {
            format: OutputFormat::Pnml,
            ..EncoderOptions::default()
        });
        let xml = encoder.encode_value(&payload).unwrap();
        let elems = elements(&xml);

        assert_eq!(elems[0].tag, "pnml");
        assert_eq!(elems[1].tag, "net");
        assert_eq!(elems[1].attrs["type"], NET_TYPE);
        find(&elems, "place", "s");
        find(&elems, "place", "e");
        find(&elems, "transition", "t");
        assert!(!xml.contains("\"g\""));
        assert_eq!(count(&elems, "arc"), 2);
        assert_eq!(count(&elems, "inscription"), 2);
        assert!(xml.contains("<text>Begin</text>"));
        assert!(xml.contains("<text>1</text>"));
        assert_eq!(count(&elems, "position"), 3);
    }

    #[test]
    fn side_file_is_written_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Encoder::new(EncoderOptions {
            side_file: true,
            side_file_dir: dir.path().to_path_buf(),
            ..EncoderOptions::default()
        });
        let xml = encoder.encode_value(&scenario_one()).unwrap();
        let copy = std::fs::read_to_string(dir.path().join("bpmn_output.bpmn")).unwrap();
        assert_eq!(copy, xml);
    }

    #[test]
    fn side_file_failure_does_not_fail_the_encode() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Encoder::new(EncoderOptions {
            side_file: true,
            side_file_dir: dir.path().join("missing"),
            ..EncoderOptions::default()
        });
        assert!(encoder.encode_value(&scenario_one()).is_ok());
    }

    #[test]
    fn encode_json_accepts_raw_llm_reply() {
        let reply = format!("```json\n{}\n```", scenario_one());
        let xml = encode_json(&reply).unwrap();
        assert!(xml.contains("startEvent"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn graph_strategy() -> impl Strategy<Value = Value> {
            let ids = prop::collection::btree_set("[a-z]{1,6}", 1..10);
            ids.prop_flat_map(|ids| {
                let ids: Vec<String> = ids.into_iter().collect();
                let n = ids.len();
                let kinds = prop::collection::vec(0usize..3, n);
                let flows = prop::collection::vec((0..n + 2, 0..n + 2), 0..12);
                (Just(ids), kinds, flows)
            })
            .prop_map(|(ids, kinds, flows)| {
                let mut events = vec![];
                let mut tasks = vec![];
                let mut gateways = vec![];
                for (id, kind) in ids.iter().zip(kinds) {
                    match kind {
                        0 => {
                            let kind = if events.is_empty() { "Start" } else { "End" };
                            events.push(json!({"id": id, "type": kind}));
                        }
                        1 => tasks.push(json!({"id": id, "type": "Task", "name": id})),
                        _ => gateways.push(json!({"id": id, "type": "Parallel"})),
                    }
                }
                // Indexes past the id list become dangling references.
                let endpoint = |i: usize| ids.get(i).cloned().unwrap_or_else(|| format!("ghost{i}"));
                let flows: Vec<Value> = flows
                    .into_iter()
                    .enumerate()
                    .map(|(i, (s, t))| json!({"id": format!("flow{i}"), "source": endpoint(s), "target": endpoint(t)}))
                    .collect();
                json!({"events": events, "tasks": tasks, "gateways": gateways, "flows": flows})
            })
        }

        proptest! {
            #[test]
            fn encoding_is_deterministic(payload in graph_strategy()) {
                let encoder = Encoder::default();
                let first = encoder.encode_value(&payload).unwrap();
                let second = encoder.encode_value(&payload).unwrap();
                prop_assert_eq!(first, second);
            }

            #[test]
            fn flow_ids_appear_on_both_endpoints(payload in graph_strategy()) {
                let xml = Encoder::default().encode_value(&payload).unwrap();
                let elems = elements(&xml);
                for flow in payload["flows"].as_array().unwrap() {
                    let id = flow["id"].as_str().unwrap();
                    for (end, child) in [("source", "outgoing"), ("target", "incoming")] {
                        let node_id = flow[end].as_str().unwrap();
                        if let Some(node) = elems.iter().find(|e| {
                            e.attrs.get("id").map(String::as_str) == Some(node_id)
                                && !e.tag.starts_with("bpmndi:")
                        }) {
                            prop_assert!(node.children.iter().any(|(t, v)| t == child && v == id));
                        }
                    }
                }
            }

            #[test]
            fn every_node_has_a_shape(payload in graph_strategy()) {
                let xml = Encoder::default().encode_value(&payload).unwrap();
                let elems = elements(&xml);
                let nodes = ["events", "tasks", "gateways"]
                    .iter()
                    .map(|k| payload[*k].as_array().unwrap().len())
                    .sum::<usize>();
                prop_assert_eq!(count(&elems, "bpmndi:BPMNShape"), nodes);
                prop_assert_eq!(count(&elems, "dc:Bounds"), nodes);
                prop_assert_eq!(
                    count(&elems, "di:waypoint"),
                    2 * payload["flows"].as_array().unwrap().len()
                );
            }
        }
    }
}
