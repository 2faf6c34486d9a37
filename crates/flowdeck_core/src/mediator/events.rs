//! Typed change notifications emitted by the mediator.
//!
//! Every event carries the [`UpdateOrigin`] of the transaction it was derived
//! from, so consumers can tell local edits from replicated ones and from
//! undo/redo replays without any shared flag.

use serde::Serialize;
use ts_rs::TS;

use crate::crdt::UpdateOrigin;
use crate::events::EventChannel;
use crate::highlight::HighlightDelta;
use crate::model::{CommentBox, Link, Operator, Point};

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum OperatorEvent {
    Added {
        operator: Operator,
        position: Option<Point>,
        origin: UpdateOrigin,
    },
    Deleted {
        operator: Operator,
        origin: UpdateOrigin,
    },
    /// Properties, ports or flags changed
    Changed {
        before: Operator,
        after: Operator,
        origin: UpdateOrigin,
    },
}

impl OperatorEvent {
    pub fn origin(&self) -> UpdateOrigin {
        match self {
            OperatorEvent::Added { origin, .. }
            | OperatorEvent::Deleted { origin, .. }
            | OperatorEvent::Changed { origin, .. } => *origin,
        }
    }

    pub fn operator_id(&self) -> &str {
        match self {
            OperatorEvent::Added { operator, .. } | OperatorEvent::Deleted { operator, .. } => {
                &operator.operator_id
            }
            OperatorEvent::Changed { after, .. } => &after.operator_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum LinkEvent {
    Added { link: Link, origin: UpdateOrigin },
    Deleted { link: Link, origin: UpdateOrigin },
}

impl LinkEvent {
    pub fn origin(&self) -> UpdateOrigin {
        match self {
            LinkEvent::Added { origin, .. } | LinkEvent::Deleted { origin, .. } => *origin,
        }
    }

    pub fn link(&self) -> &Link {
        match self {
            LinkEvent::Added { link, .. } | LinkEvent::Deleted { link, .. } => link,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum CommentBoxEvent {
    Added {
        comment_box: CommentBox,
        position: Option<Point>,
        origin: UpdateOrigin,
    },
    Deleted {
        comment_box: CommentBox,
        origin: UpdateOrigin,
    },
    /// Comments were added, edited or removed
    Changed {
        before: CommentBox,
        after: CommentBox,
        origin: UpdateOrigin,
    },
}

impl CommentBoxEvent {
    pub fn origin(&self) -> UpdateOrigin {
        match self {
            CommentBoxEvent::Added { origin, .. }
            | CommentBoxEvent::Deleted { origin, .. }
            | CommentBoxEvent::Changed { origin, .. } => *origin,
        }
    }
}

/// An existing element moved.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionEvent {
    pub element_id: String,
    pub old_position: Option<Point>,
    pub new_position: Point,
    pub origin: UpdateOrigin,
}

impl PositionEvent {
    /// Displacement from the old position (zero for a first placement).
    pub fn delta(&self) -> (f64, f64) {
        match self.old_position {
            Some(old) => (
                self.new_position.x - old.x,
                self.new_position.y - old.y,
            ),
            None => (0.0, 0.0),
        }
    }
}

/// One channel per event category.
#[derive(Debug, Default)]
pub struct MediatorEvents {
    pub operators: EventChannel<OperatorEvent>,
    pub links: EventChannel<LinkEvent>,
    pub comment_boxes: EventChannel<CommentBoxEvent>,
    pub positions: EventChannel<PositionEvent>,
    pub highlights: EventChannel<HighlightDelta>,
    /// `true` when workflow modification is (re-)enabled
    pub modification: EventChannel<bool>,
}
