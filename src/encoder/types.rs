use std::fmt;

/// The three node collections of a process graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Event,
    Task,
    Gateway,
}

impl NodeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeCategory::Event => "event",
            NodeCategory::Task => "task",
            NodeCategory::Gateway => "gateway",
        }
    }

    /// Key of the collection in the upstream JSON payload.
    pub fn collection(self) -> &'static str {
        match self {
            NodeCategory::Event => "events",
            NodeCategory::Task => "tasks",
            NodeCategory::Gateway => "gateways",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed set of element types for one category, with the table that maps
/// each member onto its BPMN tag.
pub trait ElementKind: Copy + Eq + fmt::Debug + 'static {
    const CATEGORY: NodeCategory;

    /// Members accepted by the strict policy, in the order they are reported.
    const ALLOWED: &'static [Self];

    /// Members only reachable through the lenient policy.
    const LENIENT_ONLY: &'static [Self] = &[];

    /// Short name used in upstream payloads, e.g. `Start` or `UserTask`.
    fn label(self) -> &'static str;

    /// Element name with its category suffix, e.g. `StartEvent`.
    fn element_name(self) -> &'static str;

    /// Local name of the BPMN 2.0 element.
    fn bpmn_tag(self) -> &'static str;

    /// Member used by the lenient policy when nothing matches.
    fn fallback() -> Self;

    fn spellings(self) -> [&'static str; 3] {
        [self.label(), self.element_name(), self.bpmn_tag()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    End,
    IntermediateCatch,
}

impl ElementKind for EventKind {
    const CATEGORY: NodeCategory = NodeCategory::Event;
    const ALLOWED: &'static [Self] = &[EventKind::Start, EventKind::End];
    const LENIENT_ONLY: &'static [Self] = &[EventKind::IntermediateCatch];

    fn label(self) -> &'static str {
        match self {
            EventKind::Start => "Start",
            EventKind::End => "End",
            EventKind::IntermediateCatch => "IntermediateCatch",
        }
    }

    fn element_name(self) -> &'static str {
        match self {
            EventKind::Start => "StartEvent",
            EventKind::End => "EndEvent",
            EventKind::IntermediateCatch => "IntermediateCatchEvent",
        }
    }

    fn bpmn_tag(self) -> &'static str {
        match self {
            EventKind::Start => "startEvent",
            EventKind::End => "endEvent",
            EventKind::IntermediateCatch => "intermediateCatchEvent",
        }
    }

    fn fallback() -> Self {
        EventKind::IntermediateCatch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Task,
    UserTask,
    ServiceTask,
    ManualTask,
    ScriptTask,
    BusinessRuleTask,
    SendTask,
    ReceiveTask,
}

impl ElementKind for TaskKind {
    const CATEGORY: NodeCategory = NodeCategory::Task;
    const ALLOWED: &'static [Self] = &[
        TaskKind::Task,
        TaskKind::UserTask,
        TaskKind::ServiceTask,
        TaskKind::ManualTask,
        TaskKind::ScriptTask,
        TaskKind::BusinessRuleTask,
        TaskKind::SendTask,
        TaskKind::ReceiveTask,
    ];

    fn label(self) -> &'static str {
        self.element_name()
    }

    fn element_name(self) -> &'static str {
        match self {
            TaskKind::Task => "Task",
            TaskKind::UserTask => "UserTask",
            TaskKind::ServiceTask => "ServiceTask",
            TaskKind::ManualTask => "ManualTask",
            TaskKind::ScriptTask => "ScriptTask",
            TaskKind::BusinessRuleTask => "BusinessRuleTask",
            TaskKind::SendTask => "SendTask",
            TaskKind::ReceiveTask => "ReceiveTask",
        }
    }

    fn bpmn_tag(self) -> &'static str {
        match self {
            TaskKind::Task => "task",
            TaskKind::UserTask => "userTask",
            TaskKind::ServiceTask => "serviceTask",
            TaskKind::ManualTask => "manualTask",
            TaskKind::ScriptTask => "scriptTask",
            TaskKind::BusinessRuleTask => "businessRuleTask",
            TaskKind::SendTask => "sendTask",
            TaskKind::ReceiveTask => "receiveTask",
        }
    }

    fn fallback() -> Self {
        TaskKind::Task
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Exclusive,
    Inclusive,
    Parallel,
    EventBased,
    Complex,
}

impl ElementKind for GatewayKind {
    const CATEGORY: NodeCategory = NodeCategory::Gateway;
    const ALLOWED: &'static [Self] = &[
        GatewayKind::Exclusive,
        GatewayKind::Inclusive,
        GatewayKind::Parallel,
        GatewayKind::EventBased,
        GatewayKind::Complex,
    ];

    fn label(self) -> &'static str {
        match self {
            GatewayKind::Exclusive => "Exclusive",
            GatewayKind::Inclusive => "Inclusive",
            GatewayKind::Parallel => "Parallel",
            GatewayKind::EventBased => "EventBased",
            GatewayKind::Complex => "Complex",
        }
    }

    fn element_name(self) -> &'static str {
        match self {
            GatewayKind::Exclusive => "ExclusiveGateway",
            GatewayKind::Inclusive => "InclusiveGateway",
            GatewayKind::Parallel => "ParallelGateway",
            GatewayKind::EventBased => "EventBasedGateway",
            GatewayKind::Complex => "ComplexGateway",
        }
    }

    fn bpmn_tag(self) -> &'static str {
        match self {
            GatewayKind::Exclusive => "exclusiveGateway",
            GatewayKind::Inclusive => "inclusiveGateway",
            GatewayKind::Parallel => "parallelGateway",
            GatewayKind::EventBased => "eventBasedGateway",
            GatewayKind::Complex => "complexGateway",
        }
    }

    fn fallback() -> Self {
        GatewayKind::Exclusive
    }
}

/// A validated node of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<K> {
    pub id: String,
    pub kind: K,
    pub name: Option<String>,
}

pub type Event = Node<EventKind>;
pub type Task = Node<TaskKind>;
pub type Gateway = Node<GatewayKind>;

impl<K: ElementKind> Node<K> {
    pub fn new(id: impl Into<String>, kind: K, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.map(str::to_string),
        }
    }

    pub fn view(&self) -> NodeRef<'_> {
        NodeRef {
            id: &self.id,
            name: self.name.as_deref(),
            category: K::CATEGORY,
            bpmn_tag: self.kind.bpmn_tag(),
        }
    }
}

/// A directed sequence flow between two element ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Flow {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Category-erased view of a node, used by the layout engine and the emitters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRef<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub category: NodeCategory,
    pub bpmn_tag: &'static str,
}

/// The validated intermediate representation of a process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessGraph {
    pub events: Vec<Event>,
    pub tasks: Vec<Task>,
    pub gateways: Vec<Gateway>,
    pub flows: Vec<Flow>,
}

impl ProcessGraph {
    /// All nodes in declaration order: events, then tasks, then gateways.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.events
            .iter()
            .map(Node::view)
            .chain(self.tasks.iter().map(Node::view))
            .chain(self.gateways.iter().map(Node::view))
    }

    /// Resolves an id by searching tasks, then gateways, then events.
    pub fn find(&self, id: &str) -> Option<NodeRef<'_>> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map(Node::view)
            .or_else(|| self.gateways.iter().find(|g| g.id == id).map(Node::view))
            .or_else(|| self.events.iter().find(|e| e.id == id).map(Node::view))
    }

    pub fn is_start_event(&self, id: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.id == id && e.kind == EventKind::Start)
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Flow> + 'a {
        self.flows.iter().filter(move |f| f.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Flow> + 'a {
        self.flows.iter().filter(move |f| f.source == id)
    }

    pub fn node_count(&self) -> usize {
        self.events.len() + self.tasks.len() + self.gateways.len()
    }
}
