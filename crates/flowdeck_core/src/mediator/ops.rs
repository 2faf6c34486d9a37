//! Graph mutations.
//!
//! Each public operation is one store transaction. Existence checks run
//! before the first write, since a committed write cannot be rolled back.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::GraphActionMediator;
use crate::crdt::{Collection, GraphTxn, UpdateOrigin};
use crate::error::{FlowdeckError, Result};
use crate::model::{
    Comment, CommentBox, Link, Operator, OperatorProperties, Point, PortDescription,
    WorkflowContent,
};
use crate::validation::check_link;

/// One element of a batched move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ElementMove {
    pub element_id: String,
    pub dx: f64,
    pub dy: f64,
}

impl ElementMove {
    pub fn new(element_id: impl Into<String>, dx: f64, dy: f64) -> Self {
        Self {
            element_id: element_id.into(),
            dx,
            dy,
        }
    }
}

/// Which side of an operator a port is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PortDirection {
    Input,
    Output,
}

/// Remove `link_id` and return whether it existed.
fn drop_link(txn: &mut GraphTxn<'_>, link_id: &str) -> bool {
    txn.remove(Collection::Links, link_id).is_some()
}

impl GraphActionMediator {
    fn local<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut GraphTxn<'_>) -> Result<R>,
    {
        self.current_store().transact(UpdateOrigin::Local, f)
    }

    // ==================== Operators ====================

    /// Add one operator at `position`.
    pub fn add_operator(&self, operator: Operator, position: Point) -> Result<bool> {
        self.add_operators_and_links(vec![(operator, position)], Vec::new())
    }

    /// Add operators and links in one transaction.
    ///
    /// Operator ids must be new. Links are validated against the graph as it
    /// stands after the operators are added, and invalid ones are skipped
    /// (logged) without failing the rest.
    pub fn add_operators_and_links(
        &self,
        operators: Vec<(Operator, Point)>,
        links: Vec<Link>,
    ) -> Result<bool> {
        if !self.check_modifiable("add operators") {
            return Ok(false);
        }
        let schemas = self.schemas.as_ref();
        self.local(|txn| {
            for (operator, _) in &operators {
                if txn.contains(Collection::Operators, &operator.operator_id) {
                    return Err(FlowdeckError::DuplicateElement(operator.operator_id.clone()));
                }
            }
            for (operator, position) in &operators {
                txn.put_operator(operator)?;
                txn.put_position(&operator.operator_id, *position)?;
            }
            for link in &links {
                let existing = txn.links();
                let verdict = check_link(link, |id| txn.operator(id), &existing, schemas);
                match verdict {
                    Ok(()) => txn.put_link(link)?,
                    Err(reason) => {
                        log::warn!("[Mediator] skipping link {}: {}", link.link_id, reason)
                    }
                }
            }
            Ok(true)
        })
    }

    /// Delete one operator together with every link attached to it.
    pub fn delete_operator(&self, operator_id: &str) -> Result<bool> {
        self.delete_operators_and_links(&[operator_id.to_string()], &[])
    }

    /// Delete operators, their attached links, and extra links in one
    /// transaction, so one undo restores all of it.
    pub fn delete_operators_and_links(
        &self,
        operator_ids: &[String],
        link_ids: &[String],
    ) -> Result<bool> {
        if !self.check_modifiable("delete operators") {
            return Ok(false);
        }
        self.local(|txn| {
            for id in operator_ids {
                if !txn.contains(Collection::Operators, id) {
                    return Err(FlowdeckError::OperatorNotFound(id.clone()));
                }
            }
            for id in link_ids {
                if !txn.contains(Collection::Links, id) {
                    return Err(FlowdeckError::LinkNotFound(id.clone()));
                }
            }

            let mut removed_links = 0;
            for link in txn.links() {
                let attached = operator_ids.iter().any(|id| link.touches(id));
                if attached || link_ids.contains(&link.link_id) {
                    if drop_link(txn, &link.link_id) {
                        removed_links += 1;
                    }
                }
            }
            for id in operator_ids {
                txn.remove(Collection::Operators, id);
                txn.remove(Collection::Positions, id);
            }
            log::info!(
                "[Mediator] deleted {} operator(s) and {} link(s)",
                operator_ids.len(),
                removed_links
            );
            Ok(true)
        })
    }

    /// Read-modify-write one operator.
    fn update_operator<F>(&self, operator_id: &str, action: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Operator) -> Result<()>,
    {
        if !self.check_modifiable(action) {
            return Ok(false);
        }
        self.local(|txn| {
            let mut operator = txn
                .operator(operator_id)
                .ok_or_else(|| FlowdeckError::OperatorNotFound(operator_id.to_string()))?;
            let before = operator.clone();
            f(&mut operator)?;
            if operator != before {
                txn.put_operator(&operator)?;
            }
            Ok(true)
        })
    }

    /// Replace the property bag of an operator.
    pub fn set_operator_property(
        &self,
        operator_id: &str,
        properties: OperatorProperties,
    ) -> Result<bool> {
        self.update_operator(operator_id, "set operator property", |operator| {
            operator.operator_properties = properties;
            Ok(())
        })
    }

    pub fn set_operator_display_name(
        &self,
        operator_id: &str,
        display_name: Option<String>,
    ) -> Result<bool> {
        self.update_operator(operator_id, "rename operator", |operator| {
            operator.custom_display_name = display_name;
            Ok(())
        })
    }

    /// Apply a flag change to several operators in one transaction.
    fn set_flag<F>(&self, operator_ids: &[String], action: &str, set: F) -> Result<bool>
    where
        F: Fn(&mut Operator),
    {
        if !self.check_modifiable(action) {
            return Ok(false);
        }
        self.local(|txn| {
            let mut operators = Vec::with_capacity(operator_ids.len());
            for id in operator_ids {
                let operator = txn
                    .operator(id)
                    .ok_or_else(|| FlowdeckError::OperatorNotFound(id.clone()))?;
                operators.push(operator);
            }
            for mut operator in operators {
                set(&mut operator);
                txn.put_operator(&operator)?;
            }
            Ok(true)
        })
    }

    pub fn set_operator_disabled(&self, operator_ids: &[String], disabled: bool) -> Result<bool> {
        self.set_flag(operator_ids, "disable operators", |op| op.is_disabled = disabled)
    }

    pub fn set_view_result(&self, operator_ids: &[String], view_result: bool) -> Result<bool> {
        self.set_flag(operator_ids, "toggle view result", |op| {
            op.view_result = view_result
        })
    }

    pub fn set_reuse_cache(&self, operator_ids: &[String], reuse_cache: bool) -> Result<bool> {
        self.set_flag(operator_ids, "toggle result cache", |op| {
            op.reuse_cache = reuse_cache
        })
    }

    // ==================== Ports ====================

    /// Append a port to an operator. Returns the new port id, or `None`
    /// while modification is disabled.
    pub fn add_port(
        &self,
        operator_id: &str,
        direction: PortDirection,
        display_name: Option<String>,
    ) -> Result<Option<String>> {
        let mut new_port = None;
        let accepted = self.update_operator(operator_id, "add port", |operator| {
            let (prefix, ports) = match direction {
                PortDirection::Input => ("input", &mut operator.input_ports),
                PortDirection::Output => ("output", &mut operator.output_ports),
            };
            let mut index = ports.len();
            while ports
                .iter()
                .any(|p| p.port_id == format!("{}-{}", prefix, index))
            {
                index += 1;
            }
            let port_id = format!("{}-{}", prefix, index);
            ports.push(PortDescription {
                port_id: port_id.clone(),
                display_name,
            });
            new_port = Some(port_id);
            Ok(())
        })?;
        Ok(if accepted { new_port } else { None })
    }

    /// Remove a port and every link attached to it.
    pub fn remove_port(&self, operator_id: &str, port_id: &str) -> Result<bool> {
        if !self.check_modifiable("remove port") {
            return Ok(false);
        }
        self.local(|txn| {
            let mut operator = txn
                .operator(operator_id)
                .ok_or_else(|| FlowdeckError::OperatorNotFound(operator_id.to_string()))?;
            let before = operator.input_ports.len() + operator.output_ports.len();
            operator.input_ports.retain(|p| p.port_id != port_id);
            operator.output_ports.retain(|p| p.port_id != port_id);
            if operator.input_ports.len() + operator.output_ports.len() == before {
                return Err(FlowdeckError::PortNotFound {
                    operator_id: operator_id.to_string(),
                    port_id: port_id.to_string(),
                });
            }

            for link in txn.links() {
                let on_port = (link.source.operator_id == operator_id
                    && link.source.port_id == port_id)
                    || (link.target.operator_id == operator_id && link.target.port_id == port_id);
                if on_port {
                    drop_link(txn, &link.link_id);
                }
            }
            txn.put_operator(&operator)?;
            Ok(true)
        })
    }

    // ==================== Links ====================

    /// Add a link if it passes validation.
    ///
    /// Returns `Ok(false)` without writing anything when the link is
    /// rejected or modification is disabled.
    pub fn add_link(&self, link: Link) -> Result<bool> {
        if !self.check_modifiable("add link") {
            return Ok(false);
        }
        let schemas = self.schemas.as_ref();
        self.local(|txn| {
            let existing = txn.links();
            if let Err(reason) = check_link(&link, |id| txn.operator(id), &existing, schemas) {
                log::debug!("[Mediator] rejected link {}: {}", link.link_id, reason);
                return Ok(false);
            }
            txn.put_link(&link)?;
            Ok(true)
        })
    }

    pub fn delete_link(&self, link_id: &str) -> Result<bool> {
        if !self.check_modifiable("delete link") {
            return Ok(false);
        }
        self.local(|txn| {
            if !drop_link(txn, link_id) {
                return Err(FlowdeckError::LinkNotFound(link_id.to_string()));
            }
            Ok(true)
        })
    }

    // ==================== Positions ====================

    /// Move several elements by their deltas in one transaction.
    pub fn move_elements(&self, moves: &[ElementMove]) -> Result<bool> {
        if !self.check_modifiable("move elements") {
            return Ok(false);
        }
        if moves.is_empty() {
            return Ok(true);
        }
        self.local(|txn| {
            let mut targets = Vec::with_capacity(moves.len());
            for m in moves {
                let position = txn
                    .position(&m.element_id)
                    .ok_or_else(|| FlowdeckError::PositionNotFound(m.element_id.clone()))?;
                targets.push((m.element_id.as_str(), position.translated(m.dx, m.dy)));
            }
            for (element_id, position) in targets {
                txn.put_position(element_id, position)?;
            }
            Ok(true)
        })
    }

    pub fn set_element_position(&self, element_id: &str, position: Point) -> Result<bool> {
        if !self.check_modifiable("set position") {
            return Ok(false);
        }
        self.local(|txn| {
            if !txn.contains(Collection::Positions, element_id) {
                return Err(FlowdeckError::PositionNotFound(element_id.to_string()));
            }
            txn.put_position(element_id, position)?;
            Ok(true)
        })
    }

    // ==================== Comment boxes ====================

    pub fn add_comment_box(&self, comment_box: CommentBox, position: Point) -> Result<bool> {
        if !self.check_modifiable("add comment box") {
            return Ok(false);
        }
        self.local(|txn| {
            if txn.contains(Collection::CommentBoxes, &comment_box.comment_box_id) {
                return Err(FlowdeckError::DuplicateElement(
                    comment_box.comment_box_id.clone(),
                ));
            }
            txn.put_comment_box(&comment_box)?;
            txn.put_position(&comment_box.comment_box_id, position)?;
            Ok(true)
        })
    }

    pub fn delete_comment_box(&self, comment_box_id: &str) -> Result<bool> {
        if !self.check_modifiable("delete comment box") {
            return Ok(false);
        }
        self.local(|txn| {
            if txn.remove(Collection::CommentBoxes, comment_box_id).is_none() {
                return Err(FlowdeckError::CommentBoxNotFound(comment_box_id.to_string()));
            }
            txn.remove(Collection::Positions, comment_box_id);
            Ok(true)
        })
    }

    fn update_comment_box<F>(&self, comment_box_id: &str, action: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut CommentBox) -> Result<()>,
    {
        if !self.check_modifiable(action) {
            return Ok(false);
        }
        self.local(|txn| {
            let mut comment_box = txn
                .comment_box(comment_box_id)
                .ok_or_else(|| FlowdeckError::CommentBoxNotFound(comment_box_id.to_string()))?;
            f(&mut comment_box)?;
            txn.put_comment_box(&comment_box)?;
            Ok(true)
        })
    }

    /// Append a comment authored by this session's user. Returns the new
    /// comment id, or `None` while modification is disabled.
    pub fn add_comment(&self, comment_box_id: &str, content: &str) -> Result<Option<String>> {
        let comment = Comment::new(&self.client_id, &self.user_name, content);
        let comment_id = comment.comment_id.clone();
        let accepted = self.update_comment_box(comment_box_id, "add comment", |comment_box| {
            comment_box.comments.push(comment);
            Ok(())
        })?;
        Ok(accepted.then_some(comment_id))
    }

    pub fn edit_comment(&self, comment_box_id: &str, comment_id: &str, content: &str) -> Result<bool> {
        self.update_comment_box(comment_box_id, "edit comment", |comment_box| {
            let comment = comment_box
                .comments
                .iter_mut()
                .find(|c| c.comment_id == comment_id)
                .ok_or_else(|| FlowdeckError::CommentNotFound {
                    comment_box_id: comment_box_id.to_string(),
                    comment_id: comment_id.to_string(),
                })?;
            comment.content = content.to_string();
            comment.last_edited = Some(chrono::Utc::now().to_rfc3339());
            Ok(())
        })
    }

    pub fn delete_comment(&self, comment_box_id: &str, comment_id: &str) -> Result<bool> {
        self.update_comment_box(comment_box_id, "delete comment", |comment_box| {
            let before = comment_box.comments.len();
            comment_box.comments.retain(|c| c.comment_id != comment_id);
            if comment_box.comments.len() == before {
                return Err(FlowdeckError::CommentNotFound {
                    comment_box_id: comment_box_id.to_string(),
                    comment_id: comment_id.to_string(),
                });
            }
            Ok(())
        })
    }

    // ==================== Whole-graph operations ====================

    /// Overwrite the live graph with `content` as one local, undoable and
    /// replicated transaction.
    ///
    /// Used to restore a historical version. Not gated: restoring happens
    /// while the version display has modification disabled.
    pub fn restore_workflow_content(&self, content: &WorkflowContent) -> Result<()> {
        self.live_store
            .transact(UpdateOrigin::Local, |txn| txn.replace_content(content))
    }

    /// Drop both undo and redo stacks.
    pub fn clear_history(&self) {
        self.history.clear();
    }
}
