//! Workflow graph data model.
//!
//! These are the plain values stored (as JSON) in the replicated maps of the
//! [`GraphStore`](crate::crdt::GraphStore) and exchanged with the browser host.
//! Every cross-reference is by string id: a [`Link`] names its endpoints by
//! operator id and port id, never by holding the operator itself.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Opaque operator property bag, interpreted by the external operator schemas.
pub type OperatorProperties = IndexMap<String, serde_json::Value>;

/// A 2D coordinate on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// The point shifted by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// An input or output port of an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PortDescription {
    pub port_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl PortDescription {
    pub fn new(port_id: impl Into<String>) -> Self {
        Self {
            port_id: port_id.into(),
            display_name: None,
        }
    }
}

/// A workflow operator (a node of the graph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Operator {
    pub operator_id: String,
    pub operator_type: String,
    /// Version tag of the operator implementation, compared by the diff engine.
    #[serde(default)]
    pub operator_version: String,
    #[serde(default)]
    pub operator_properties: OperatorProperties,
    #[serde(default)]
    pub input_ports: Vec<PortDescription>,
    #[serde(default)]
    pub output_ports: Vec<PortDescription>,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub view_result: bool,
    #[serde(default)]
    pub reuse_cache: bool,
    #[serde(default)]
    pub custom_display_name: Option<String>,
}

impl Operator {
    /// Create an operator with `n_in` input ports and `n_out` output ports.
    ///
    /// Ports are named `input-<i>` / `output-<i>`, the naming the port
    /// schemas use when they number ports positionally.
    pub fn new(
        operator_id: impl Into<String>,
        operator_type: impl Into<String>,
        n_in: usize,
        n_out: usize,
    ) -> Self {
        Self {
            operator_id: operator_id.into(),
            operator_type: operator_type.into(),
            operator_version: String::new(),
            operator_properties: OperatorProperties::new(),
            input_ports: (0..n_in)
                .map(|i| PortDescription::new(format!("input-{}", i)))
                .collect(),
            output_ports: (0..n_out)
                .map(|i| PortDescription::new(format!("output-{}", i)))
                .collect(),
            is_disabled: false,
            view_result: false,
            reuse_cache: false,
            custom_display_name: None,
        }
    }

    /// Create an operator with a freshly generated id.
    pub fn with_generated_id(operator_type: impl Into<String>, n_in: usize, n_out: usize) -> Self {
        let operator_type = operator_type.into();
        let id = format!("{}-operator-{}", operator_type, uuid::Uuid::new_v4());
        Self::new(id, operator_type, n_in, n_out)
    }

    pub fn has_input_port(&self, port_id: &str) -> bool {
        self.input_ports.iter().any(|p| p.port_id == port_id)
    }

    pub fn has_output_port(&self, port_id: &str) -> bool {
        self.output_ports.iter().any(|p| p.port_id == port_id)
    }

    /// Positional index of an input port.
    pub fn input_port_index(&self, port_id: &str) -> Option<usize> {
        self.input_ports.iter().position(|p| p.port_id == port_id)
    }
}

/// One end of a link: an operator id and one of its port ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LogicalPort {
    pub operator_id: String,
    pub port_id: String,
}

impl LogicalPort {
    pub fn new(operator_id: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            port_id: port_id.into(),
        }
    }
}

/// A directed link from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Link {
    pub link_id: String,
    pub source: LogicalPort,
    pub target: LogicalPort,
}

impl Link {
    pub fn new(link_id: impl Into<String>, source: LogicalPort, target: LogicalPort) -> Self {
        Self {
            link_id: link_id.into(),
            source,
            target,
        }
    }

    /// Create a link with a freshly generated id.
    pub fn with_generated_id(source: LogicalPort, target: LogicalPort) -> Self {
        Self::new(format!("link-{}", uuid::Uuid::new_v4()), source, target)
    }

    /// Whether this link touches the given operator at either end.
    pub fn touches(&self, operator_id: &str) -> bool {
        self.source.operator_id == operator_id || self.target.operator_id == operator_id
    }
}

/// A single comment inside a comment box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Comment {
    pub comment_id: String,
    pub creator_id: String,
    pub creator_name: String,
    /// ISO-8601 creation timestamp
    pub creation_time: String,
    pub content: String,
    /// ISO-8601 timestamp of the last edit, if the comment was edited
    #[serde(default)]
    pub last_edited: Option<String>,
}

impl Comment {
    /// Create a comment stamped with the current time.
    pub fn new(
        creator_id: impl Into<String>,
        creator_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            comment_id: format!("comment-{}", uuid::Uuid::new_v4()),
            creator_id: creator_id.into(),
            creator_name: creator_name.into(),
            creation_time: chrono::Utc::now().to_rfc3339(),
            content: content.into(),
            last_edited: None,
        }
    }
}

/// A box of comments anchored to a canvas position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommentBox {
    pub comment_box_id: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl CommentBox {
    pub fn new(comment_box_id: impl Into<String>) -> Self {
        Self {
            comment_box_id: comment_box_id.into(),
            comments: Vec::new(),
        }
    }

    pub fn with_generated_id() -> Self {
        Self::new(format!("commentBox-{}", uuid::Uuid::new_v4()))
    }
}

/// The kinds of element a canvas holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ElementKind {
    Operator,
    Link,
    CommentBox,
}

/// Element classes of a workflow, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ElementClass {
    #[serde(rename = "operators")]
    Operators,
    #[serde(rename = "links")]
    Links,
    #[serde(rename = "commentBoxes")]
    CommentBoxes,
}

impl ElementClass {
    pub fn name(&self) -> &'static str {
        match self {
            ElementClass::Operators => "operators",
            ElementClass::Links => "links",
            ElementClass::CommentBoxes => "commentBoxes",
        }
    }
}

impl std::str::FromStr for ElementClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operators" => Ok(ElementClass::Operators),
            "links" => Ok(ElementClass::Links),
            "commentBoxes" => Ok(ElementClass::CommentBoxes),
            _ => Err(format!("Unknown element class: {}", s)),
        }
    }
}

/// Full content of a workflow graph: the unit saved as a version and
/// compared by the diff engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorkflowContent {
    #[serde(default)]
    pub operators: Vec<Operator>,
    /// Canvas position of every operator and comment box, keyed by element id.
    #[serde(default)]
    pub positions: IndexMap<String, Point>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub comment_boxes: Vec<CommentBox>,
}

impl WorkflowContent {
    pub fn operator(&self, operator_id: &str) -> Option<&Operator> {
        self.operators.iter().find(|op| op.operator_id == operator_id)
    }

    pub fn link(&self, link_id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.link_id == link_id)
    }

    /// Links with the given operator at either end.
    pub fn links_of<'a>(&'a self, operator_id: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |link| link.touches(operator_id))
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty() && self.links.is_empty() && self.comment_boxes.is_empty()
    }

    /// Parse a workflow from its JSON form.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
