use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{NodeCategory, ProcessGraph};

/// Waypoints used for an edge whose endpoint could not be resolved.
pub const FALLBACK_WAYPOINTS: [(f32, f32); 2] = [(120.0, 150.0), (250.0, 150.0)];

/// Position and size of one node's shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutPos {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutPos {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Where outgoing edges leave the shape.
    pub fn right_center(&self) -> (f32, f32) {
        (self.right(), self.center_y())
    }

    /// Where incoming edges enter the shape.
    pub fn left_center(&self) -> (f32, f32) {
        (self.x, self.center_y())
    }
}

/// Fixed shape size per category.
pub fn dimensions(category: Option<NodeCategory>) -> (f32, f32) {
    match category {
        Some(NodeCategory::Event) => (36.0, 36.0),
        Some(NodeCategory::Task) => (100.0, 80.0),
        Some(NodeCategory::Gateway) => (50.0, 50.0),
        None => (100.0, 80.0),
    }
}

/// Tunables for the column layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_origin_x")]
    pub origin_x: f32,
    #[serde(default = "default_base_y")]
    pub base_y: f32,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    #[serde(default = "default_gateway_offset_y")]
    pub gateway_offset_y: f32,
}

fn default_origin_x() -> f32 {
    100.0
}
fn default_base_y() -> f32 {
    150.0
}
fn default_spacing() -> f32 {
    200.0
}
fn default_gateway_offset_y() -> f32 {
    -60.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: default_origin_x(),
            base_y: default_base_y(),
            spacing: default_spacing(),
            gateway_offset_y: default_gateway_offset_y(),
        }
    }
}

/// Geometry computed for one encode call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    positions: HashMap<String, LayoutPos>,
}

impl Layout {
    pub fn position(&self, id: &str) -> Option<&LayoutPos> {
        self.positions.get(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Right-center of the source to left-center of the target, or
    /// [`FALLBACK_WAYPOINTS`] when either end has no position.
    pub fn waypoints(&self, source: &str, target: &str) -> [(f32, f32); 2] {
        match (self.positions.get(source), self.positions.get(target)) {
            (Some(from), Some(to)) => [from.right_center(), to.left_center()],
            _ => FALLBACK_WAYPOINTS,
        }
    }
}

/// Assigns one column per node, in the order control reaches it.
pub struct LayoutEngine {
    config: LayoutConfig,
    positions: HashMap<String, LayoutPos>,
    next_index: usize,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            next_index: 0,
        }
    }

    /// Start events first, then flow targets in flow order, then every node
    /// the flows never reached, in declaration order.
    pub fn layout(mut self, graph: &ProcessGraph) -> Layout {
        for event in &graph.events {
            if graph.is_start_event(&event.id) {
                self.place(&event.id, NodeCategory::Event);
            }
        }
        let after_starts = self.next_index;

        for flow in &graph.flows {
            if self.positions.contains_key(&flow.target) || graph.is_start_event(&flow.target) {
                continue;
            }
            if let Some(node) = graph.find(&flow.target) {
                self.place(node.id, node.category);
            }
        }
        let after_flows = self.next_index;

        for node in graph.nodes() {
            if !self.positions.contains_key(node.id) {
                self.place(node.id, node.category);
            }
        }

        debug!(
            starts = after_starts,
            reached = after_flows - after_starts,
            disconnected = self.next_index - after_flows,
            "layout complete"
        );
        Layout {
            positions: self.positions,
        }
    }

    fn place(&mut self, id: &str, category: NodeCategory) {
        let (width, height) = dimensions(Some(category));
        let x = self.config.origin_x + self.next_index as f32 * self.config.spacing;
        let y = match category {
            NodeCategory::Gateway => self.config.base_y + self.config.gateway_offset_y,
            NodeCategory::Event | NodeCategory::Task => self.config.base_y,
        };
        self.positions
            .insert(id.to_string(), LayoutPos::new(x, y, width, height));
        self.next_index += 1;
    }
}
