//! BPMN 2.0 process body and diagram-interchange tree.

use super::layout::{Layout, dimensions};
use super::types::{Flow, NodeRef, ProcessGraph};
use crate::error::Result;
use crate::xml::{XmlWriter, coord};

pub const NS_MODEL: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
pub const NS_BPMNDI: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
pub const NS_DI: &str = "http://www.omg.org/spec/DD/20100524/DI";
pub const NS_DC: &str = "http://www.omg.org/spec/DD/20100524/DC";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL BPMN20.xsd";

const DIAGRAM_ID: &str = "BPMNDiagram_1";
const PLANE_ID: &str = "BPMNPlane_1";

pub(crate) struct BpmnDocument<'a> {
    pub graph: &'a ProcessGraph,
    pub layout: &'a Layout,
    pub process_id: &'a str,
    pub target_namespace: &'a str,
    pub wiring: bool,
}

impl BpmnDocument<'_> {
    pub fn write(&self, w: &mut XmlWriter) -> Result<()> {
        w.declaration()?;
        w.start(
            "definitions",
            &[
                ("xmlns", NS_MODEL),
                ("xmlns:bpmndi", NS_BPMNDI),
                ("xmlns:di", NS_DI),
                ("xmlns:dc", NS_DC),
                ("xmlns:xsi", NS_XSI),
                ("xsi:schemaLocation", SCHEMA_LOCATION),
                ("targetNamespace", self.target_namespace),
            ],
        )?;
        self.write_process(w)?;
        self.write_diagram(w)?;
        w.end("definitions")
    }

    fn write_process(&self, w: &mut XmlWriter) -> Result<()> {
        w.start(
            "process",
            &[("id", self.process_id), ("isExecutable", "false")],
        )?;
        for node in self.graph.nodes() {
            self.write_node(w, node)?;
        }
        for flow in &self.graph.flows {
            write_sequence_flow(w, flow)?;
        }
        w.end("process")
    }

    fn write_node(&self, w: &mut XmlWriter, node: NodeRef<'_>) -> Result<()> {
        let attrs = [("id", node.id), ("name", node.name.unwrap_or(""))];
        if !self.wiring {
            return w.empty(node.bpmn_tag, &attrs);
        }

        let incoming: Vec<&str> = self.graph.incoming(node.id).map(|f| f.id.as_str()).collect();
        let outgoing: Vec<&str> = self.graph.outgoing(node.id).map(|f| f.id.as_str()).collect();
        if incoming.is_empty() && outgoing.is_empty() {
            return w.empty(node.bpmn_tag, &attrs);
        }

        w.start(node.bpmn_tag, &attrs)?;
        for id in incoming {
            w.text_element("incoming", id)?;
        }
        for id in outgoing {
            w.text_element("outgoing", id)?;
        }
        w.end(node.bpmn_tag)
    }

    fn write_diagram(&self, w: &mut XmlWriter) -> Result<()> {
        w.start("bpmndi:BPMNDiagram", &[("id", DIAGRAM_ID)])?;
        w.start(
            "bpmndi:BPMNPlane",
            &[("id", PLANE_ID), ("bpmnElement", self.process_id)],
        )?;

        for node in self.graph.nodes() {
            let shape_id = format!("{}_di", node.id);
            w.start(
                "bpmndi:BPMNShape",
                &[("id", shape_id.as_str()), ("bpmnElement", node.id)],
            )?;
            let (x, y, width, height) = match self.layout.position(node.id) {
                Some(pos) => (pos.x, pos.y, pos.width, pos.height),
                None => {
                    let (width, height) = dimensions(Some(node.category));
                    (0.0, 0.0, width, height)
                }
            };
            let (x, y, width, height) = (coord(x), coord(y), coord(width), coord(height));
            w.empty(
                "dc:Bounds",
                &[
                    ("x", x.as_str()),
                    ("y", y.as_str()),
                    ("width", width.as_str()),
                    ("height", height.as_str()),
                ],
            )?;
            w.end("bpmndi:BPMNShape")?;
        }

        for flow in &self.graph.flows {
            let edge_id = format!("{}_di", flow.id);
            w.start(
                "bpmndi:BPMNEdge",
                &[("id", edge_id.as_str()), ("bpmnElement", flow.id.as_str())],
            )?;
            for (x, y) in self.layout.waypoints(&flow.source, &flow.target) {
                let (x, y) = (coord(x), coord(y));
                w.empty("di:waypoint", &[("x", x.as_str()), ("y", y.as_str())])?;
            }
            w.end("bpmndi:BPMNEdge")?;
        }

        w.end("bpmndi:BPMNPlane")?;
        w.end("bpmndi:BPMNDiagram")
    }
}

/// Endpoint-agnostic: the ids are copied as given.
fn write_sequence_flow(w: &mut XmlWriter, flow: &Flow) -> Result<()> {
    w.empty(
        "sequenceFlow",
        &[
            ("id", flow.id.as_str()),
            ("sourceRef", flow.source.as_str()),
            ("targetRef", flow.target.as_str()),
        ],
    )
}
