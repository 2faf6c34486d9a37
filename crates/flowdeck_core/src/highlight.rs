//! Local selection state.
//!
//! The [`HighlightSet`] is per-client UI state: it is never replicated and
//! never enters undo history. Outside multi-select mode, highlighting clears
//! every other selection first.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::model::LogicalPort;

/// Something that can be highlighted on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum HighlightTarget {
    Operator(String),
    Link(String),
    CommentBox(String),
    Group(String),
    Port(LogicalPort),
}

impl HighlightTarget {
    /// Id of the element this target belongs to (the operator, for a port).
    pub fn element_id(&self) -> &str {
        match self {
            HighlightTarget::Operator(id)
            | HighlightTarget::Link(id)
            | HighlightTarget::CommentBox(id)
            | HighlightTarget::Group(id) => id,
            HighlightTarget::Port(port) => &port.operator_id,
        }
    }
}

/// Targets whose highlight state changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HighlightDelta {
    pub highlighted: Vec<HighlightTarget>,
    pub unhighlighted: Vec<HighlightTarget>,
}

impl HighlightDelta {
    pub fn is_empty(&self) -> bool {
        self.highlighted.is_empty() && self.unhighlighted.is_empty()
    }
}

/// The set of currently highlighted targets, in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightSet {
    selected: IndexSet<HighlightTarget>,
    multi_select: bool,
}

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_multi_select(&mut self, enabled: bool) {
        self.multi_select = enabled;
    }

    pub fn is_multi_select(&self) -> bool {
        self.multi_select
    }

    /// Highlight `targets`. Outside multi-select mode, everything else is
    /// unhighlighted first.
    pub fn highlight<I>(&mut self, targets: I) -> HighlightDelta
    where
        I: IntoIterator<Item = HighlightTarget>,
    {
        let targets: IndexSet<HighlightTarget> = targets.into_iter().collect();
        let mut delta = HighlightDelta::default();
        if targets.is_empty() {
            return delta;
        }

        if !self.multi_select {
            let dropped: Vec<HighlightTarget> = self
                .selected
                .iter()
                .filter(|t| !targets.contains(*t))
                .cloned()
                .collect();
            for target in dropped {
                self.selected.shift_remove(&target);
                delta.unhighlighted.push(target);
            }
        }
        for target in targets {
            if self.selected.insert(target.clone()) {
                delta.highlighted.push(target);
            }
        }
        delta
    }

    /// Unhighlight `targets`; targets not highlighted are ignored.
    pub fn unhighlight<I>(&mut self, targets: I) -> HighlightDelta
    where
        I: IntoIterator<Item = HighlightTarget>,
    {
        let mut delta = HighlightDelta::default();
        for target in targets {
            if self.selected.shift_remove(&target) {
                delta.unhighlighted.push(target);
            }
        }
        delta
    }

    /// Unhighlight every target belonging to `element_id` (used when it is deleted).
    pub fn forget_element(&mut self, element_id: &str) -> HighlightDelta {
        let gone: Vec<HighlightTarget> = self
            .selected
            .iter()
            .filter(|t| t.element_id() == element_id)
            .cloned()
            .collect();
        self.unhighlight(gone)
    }

    pub fn clear(&mut self) -> HighlightDelta {
        HighlightDelta {
            highlighted: Vec::new(),
            unhighlighted: self.selected.drain(..).collect(),
        }
    }

    pub fn contains(&self, target: &HighlightTarget) -> bool {
        self.selected.contains(target)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HighlightTarget> {
        self.selected.iter()
    }

    pub fn operators(&self) -> Vec<String> {
        self.ids(|t| matches!(t, HighlightTarget::Operator(_)))
    }

    pub fn links(&self) -> Vec<String> {
        self.ids(|t| matches!(t, HighlightTarget::Link(_)))
    }

    pub fn comment_boxes(&self) -> Vec<String> {
        self.ids(|t| matches!(t, HighlightTarget::CommentBox(_)))
    }

    pub fn groups(&self) -> Vec<String> {
        self.ids(|t| matches!(t, HighlightTarget::Group(_)))
    }

    pub fn ports(&self) -> Vec<LogicalPort> {
        self.selected
            .iter()
            .filter_map(|t| match t {
                HighlightTarget::Port(port) => Some(port.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids of highlighted operators and comment boxes: the elements that move together.
    pub fn movable_elements(&self) -> Vec<String> {
        self.ids(|t| {
            matches!(
                t,
                HighlightTarget::Operator(_) | HighlightTarget::CommentBox(_)
            )
        })
    }

    fn ids(&self, keep: impl Fn(&HighlightTarget) -> bool) -> Vec<String> {
        self.selected
            .iter()
            .filter(|t| keep(t))
            .map(|t| t.element_id().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: &str) -> HighlightTarget {
        HighlightTarget::Operator(id.to_string())
    }

    #[test]
    fn test_single_select_replaces_selection() {
        let mut set = HighlightSet::new();
        set.highlight([op("a")]);
        let delta = set.highlight([HighlightTarget::Link("l".to_string())]);

        assert_eq!(delta.unhighlighted, vec![op("a")]);
        assert_eq!(delta.highlighted.len(), 1);
        assert_eq!(set.links(), vec!["l".to_string()]);
        assert!(set.operators().is_empty());
    }

    #[test]
    fn test_multi_select_accumulates() {
        let mut set = HighlightSet::new();
        set.set_multi_select(true);
        set.highlight([op("a")]);
        set.highlight([op("b")]);
        assert_eq!(set.operators(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reselecting_reports_no_change() {
        let mut set = HighlightSet::new();
        set.highlight([op("a")]);
        assert!(set.highlight([op("a")]).is_empty());
        assert!(set.unhighlight([op("zzz")]).is_empty());
    }

    #[test]
    fn test_forget_element_drops_its_ports() {
        let mut set = HighlightSet::new();
        set.set_multi_select(true);
        set.highlight([
            op("a"),
            HighlightTarget::Port(LogicalPort::new("a", "input-0")),
            op("b"),
        ]);
        let delta = set.forget_element("a");
        assert_eq!(delta.unhighlighted.len(), 2);
        assert_eq!(set.movable_elements(), vec!["b".to_string()]);
    }
}
