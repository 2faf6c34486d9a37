//! Bridge between the logical graph and the diagram renderer.
//!
//! The renderer is opaque: the core pushes commands into a
//! [`VisualGraphSink`] and receives raw [`VisualEvent`]s back. A sink may
//! react to a command by firing the same UI events a user gesture would
//! (a programmatic move still reports "element moved"); it returns those
//! echoes from the command call so the [`VisualSyncAdapter`] can recognise
//! and drop them.
//!
//! ```text
//! UI gesture → VisualSyncAdapter::handle_ui_event → GraphActionMediator
//!                                                        ↓
//!                 VisualGraphSink ← VisualSyncAdapter ← mediator events
//! ```

mod adapter;
mod recording;

pub use adapter::{ElementState, VisualSyncAdapter};
pub use recording::{RecordingSink, SinkCommand};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::highlight::HighlightTarget;
use crate::model::{CommentBox, LogicalPort, Operator, Point};
use crate::version::Decoration;

/// An element the renderer draws as a node.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum VisualElement {
    Operator {
        operator: Operator,
        position: Point,
    },
    CommentBox {
        comment_box: CommentBox,
        position: Point,
    },
}

impl VisualElement {
    pub fn element_id(&self) -> &str {
        match self {
            VisualElement::Operator { operator, .. } => &operator.operator_id,
            VisualElement::CommentBox { comment_box, .. } => &comment_box.comment_box_id,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            VisualElement::Operator { position, .. } | VisualElement::CommentBox { position, .. } => {
                *position
            }
        }
    }
}

/// Raw events coming out of the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum VisualEvent {
    ElementMoved {
        element_id: String,
        dx: f64,
        dy: f64,
    },
    ElementDeleted {
        element_id: String,
    },
    LinkDrawn {
        link_id: String,
        source: LogicalPort,
        target: LogicalPort,
    },
    LinkDeleted {
        link_id: String,
    },
    /// `element_id` is `None` for a click on the blank canvas
    PointerDown {
        element_id: Option<String>,
        position: Point,
        multi: bool,
    },
    PointerMove {
        position: Point,
    },
    PointerUp {
        position: Point,
    },
}

impl VisualEvent {
    /// The element or link the event is about, if any.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            VisualEvent::ElementMoved { element_id, .. }
            | VisualEvent::ElementDeleted { element_id } => Some(element_id),
            VisualEvent::LinkDrawn { link_id, .. } | VisualEvent::LinkDeleted { link_id } => {
                Some(link_id)
            }
            VisualEvent::PointerDown { element_id, .. } => element_id.as_deref(),
            VisualEvent::PointerMove { .. } | VisualEvent::PointerUp { .. } => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            VisualEvent::PointerDown { .. }
                | VisualEvent::PointerMove { .. }
                | VisualEvent::PointerUp { .. }
        )
    }
}

/// The diagram renderer, as seen by the core.
///
/// Every command returns the UI events the renderer fired in reaction to it.
pub trait VisualGraphSink: Send + Sync {
    fn add_element(&self, element: &VisualElement) -> Vec<VisualEvent>;

    fn remove_element(&self, element_id: &str) -> Vec<VisualEvent>;

    fn move_element(&self, element_id: &str, dx: f64, dy: f64) -> Vec<VisualEvent>;

    fn set_highlight(&self, target: &HighlightTarget, on: bool);

    fn connect_ports(
        &self,
        link_id: &str,
        source: &LogicalPort,
        target: &LogicalPort,
    ) -> Vec<VisualEvent>;

    fn disconnect_link(&self, link_id: &str) -> Vec<VisualEvent>;

    /// Show or hide a version-diff decoration. Renderers without diff
    /// support ignore it.
    fn set_decoration(&self, _decoration: &Decoration, _on: bool) {}
}
