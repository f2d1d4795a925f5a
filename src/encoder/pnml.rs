//! PNML place/transition net: one place per event, one transition per task,
//! one unit-weight arc per flow. Gateways have no counterpart and are dropped.

use tracing::warn;

use super::layout::Layout;
use super::types::{Flow, NodeCategory, NodeRef, ProcessGraph};
use crate::error::Result;
use crate::xml::{XmlWriter, coord};

pub const NET_TYPE: &str = "http://www.informatik.hu-berlin.de/top/pntd/ptNetb";
const ARC_WEIGHT: &str = "1";

pub(crate) struct PnmlDocument<'a> {
    pub graph: &'a ProcessGraph,
    pub layout: &'a Layout,
    pub net_id: &'a str,
}

impl PnmlDocument<'_> {
    pub fn write(&self, w: &mut XmlWriter) -> Result<()> {
        w.declaration()?;
        w.start("pnml", &[])?;
        w.start("net", &[("id", self.net_id), ("type", NET_TYPE)])?;
        for node in self.graph.nodes() {
            self.write_node(w, node)?;
        }
        for flow in &self.graph.flows {
            let missing = self.unplaced_endpoints(flow);
            if !missing.is_empty() {
                warn!(arc = %flow.id, endpoints = ?missing, "arc references a node outside the net");
            }
            write_arc(w, flow)?;
        }
        w.end("net")?;
        w.end("pnml")
    }

    /// Endpoints of `flow` that are neither a place nor a transition.
    fn unplaced_endpoints<'f>(&self, flow: &'f Flow) -> Vec<&'f str> {
        [flow.source.as_str(), flow.target.as_str()]
            .into_iter()
            .filter(|id| {
                !matches!(
                    self.graph.find(id).map(|n| n.category),
                    Some(NodeCategory::Event | NodeCategory::Task)
                )
            })
            .collect()
    }

    fn write_node(&self, w: &mut XmlWriter, node: NodeRef<'_>) -> Result<()> {
        let tag = match node.category {
            NodeCategory::Event => "place",
            NodeCategory::Task => "transition",
            NodeCategory::Gateway => return Ok(()),
        };
        w.start(tag, &[("id", node.id)])?;
        w.start("name", &[])?;
        w.text_element("text", node.name.unwrap_or(""))?;
        w.end("name")?;
        if let Some(pos) = self.layout.position(node.id) {
            let (x, y) = (coord(pos.x), coord(pos.y));
            let (width, height) = (coord(pos.width), coord(pos.height));
            w.start("graphics", &[])?;
            w.empty("position", &[("x", x.as_str()), ("y", y.as_str())])?;
            w.empty("dimension", &[("x", width.as_str()), ("y", height.as_str())])?;
            w.end("graphics")?;
        }
        w.end(tag)
    }
}

fn write_arc(w: &mut XmlWriter, flow: &Flow) -> Result<()> {
    w.start(
        "arc",
        &[
            ("id", flow.id.as_str()),
            ("source", flow.source.as_str()),
            ("target", flow.target.as_str()),
        ],
    )?;
    w.start("inscription", &[])?;
    w.text_element("text", ARC_WEIGHT)?;
    w.end("inscription")?;
    w.end("arc")
}
