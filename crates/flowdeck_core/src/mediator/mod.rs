//! The single entry point for graph mutations.
//!
//! [`GraphActionMediator`] turns user intents ("add operator", "connect
//! these ports", "delete the selection") into [`GraphStore`] transactions,
//! validates links before committing them, and re-publishes every committed
//! change (local, replicated or replayed) as typed events on
//! [`MediatorEvents`].
//!
//! # Stores
//!
//! The mediator always works on a *current* store. Normally that is the live
//! store shared with the room. While a historical version is displayed, a
//! detached store holding that version is swapped in; the live store keeps
//! receiving remote updates in the background, and swapping back emits the
//! events that bring observers up to date.
//!
//! # Rejections
//!
//! Mutations return `Ok(false)` when they are refused (an invalid link, any
//! edit while modification is disabled) and `Err(..)` when the caller refers
//! to elements that do not exist.

mod events;
mod ops;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

pub use events::{
    CommentBoxEvent, LinkEvent, MediatorEvents, OperatorEvent, PositionEvent,
};
pub use ops::{ElementMove, PortDirection};

use crate::crdt::{
    ChangeRecord, Collection, GraphStore, HistoryManager, StoreChange, UpdateOrigin,
    content_changes,
};
use crate::error::Result;
use crate::events::SubscriptionId;
use crate::highlight::{HighlightDelta, HighlightSet, HighlightTarget};
use crate::model::{CommentBox, Link, Operator, Point, WorkflowContent};
use crate::schema::OperatorSchemaSource;
use crate::session::SessionContext;

/// Mediates between user intents, the replicated store and event consumers.
pub struct GraphActionMediator {
    weak_self: Weak<GraphActionMediator>,
    live_store: Arc<GraphStore>,
    current: RwLock<Arc<GraphStore>>,
    subscription: Mutex<Option<SubscriptionId>>,
    history: Arc<HistoryManager>,
    schemas: Arc<dyn OperatorSchemaSource>,
    highlights: Arc<Mutex<HighlightSet>>,
    modification_enabled: AtomicBool,
    temp_workflow: Mutex<Option<WorkflowContent>>,
    events: MediatorEvents,
    client_id: String,
    user_name: String,
}

impl GraphActionMediator {
    /// Create a mediator over the live `store`.
    pub fn new(
        store: Arc<GraphStore>,
        session: &SessionContext,
        schemas: Arc<dyn OperatorSchemaSource>,
    ) -> Arc<Self> {
        let mediator = Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            live_store: Arc::clone(&store),
            current: RwLock::new(Arc::clone(&store)),
            subscription: Mutex::new(None),
            history: Arc::new(HistoryManager::new(session.config.undo_capacity)),
            schemas,
            highlights: Arc::clone(&session.highlights),
            modification_enabled: AtomicBool::new(true),
            temp_workflow: Mutex::new(None),
            events: MediatorEvents::default(),
            client_id: session.client_id.clone(),
            user_name: session.user_name.clone(),
        });
        mediator.history.attach(&store);
        let id = mediator.observe(&store);
        *mediator.subscription.lock().unwrap() = Some(id);
        mediator
    }

    fn observe(&self, store: &GraphStore) -> SubscriptionId {
        let weak = self.weak_self.clone();
        store.observe_changes(move |change| {
            if let Some(mediator) = weak.upgrade() {
                mediator.history.record(change);
                mediator.dispatch(change);
            }
        })
    }

    // ==================== Accessors ====================

    pub fn events(&self) -> &MediatorEvents {
        &self.events
    }

    pub fn history(&self) -> &Arc<HistoryManager> {
        &self.history
    }

    pub fn schemas(&self) -> &Arc<dyn OperatorSchemaSource> {
        &self.schemas
    }

    /// The store mutations currently go to.
    pub fn current_store(&self) -> Arc<GraphStore> {
        Arc::clone(&self.current.read().unwrap())
    }

    /// The store shared with the room.
    pub fn live_store(&self) -> &Arc<GraphStore> {
        &self.live_store
    }

    /// Whether the live store (not a historical snapshot) is current.
    pub fn is_showing_live(&self) -> bool {
        Arc::ptr_eq(&self.current_store(), &self.live_store)
    }

    // ==================== Reads ====================

    pub fn get_operator(&self, operator_id: &str) -> Option<Operator> {
        self.current_store().get_operator(operator_id)
    }

    pub fn has_operator(&self, operator_id: &str) -> bool {
        self.current_store().has_operator(operator_id)
    }

    pub fn operators(&self) -> Vec<Operator> {
        self.current_store().operators()
    }

    pub fn get_link(&self, link_id: &str) -> Option<Link> {
        self.current_store().get_link(link_id)
    }

    pub fn links(&self) -> Vec<Link> {
        self.current_store().links()
    }

    pub fn get_comment_box(&self, comment_box_id: &str) -> Option<CommentBox> {
        self.current_store().get_comment_box(comment_box_id)
    }

    pub fn comment_boxes(&self) -> Vec<CommentBox> {
        self.current_store().comment_boxes()
    }

    pub fn get_position(&self, element_id: &str) -> Option<Point> {
        self.current_store().get_position(element_id)
    }

    /// Snapshot of the current graph.
    pub fn get_workflow_content(&self) -> WorkflowContent {
        self.current_store().snapshot()
    }

    // ==================== Modification gate ====================

    pub fn enable_workflow_modification(&self) {
        self.set_modification(true);
    }

    pub fn disable_workflow_modification(&self) {
        self.set_modification(false);
    }

    fn set_modification(&self, enabled: bool) {
        let was = self.modification_enabled.swap(enabled, Ordering::SeqCst);
        self.history.set_modification_enabled(enabled);
        if was != enabled {
            log::info!(
                "[Mediator] workflow modification {}",
                if enabled { "enabled" } else { "disabled" }
            );
            self.events.modification.emit(&enabled);
        }
    }

    pub fn is_workflow_modification_enabled(&self) -> bool {
        self.modification_enabled.load(Ordering::SeqCst)
    }

    /// Returns `false` (and logs) when edits are currently refused.
    fn check_modifiable(&self, action: &str) -> bool {
        let enabled = self.is_workflow_modification_enabled();
        if !enabled {
            log::debug!("[Mediator] {} refused: modification is disabled", action);
        }
        enabled
    }

    // ==================== Undo / Redo ====================

    pub fn undo(&self) -> Result<bool> {
        self.history.undo(&self.current_store())
    }

    pub fn redo(&self) -> Result<bool> {
        self.history.redo(&self.current_store())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn clear_undo(&self) {
        self.history.clear_undo();
    }

    pub fn clear_redo(&self) {
        self.history.clear_redo();
    }

    // ==================== Temporary workflow ====================

    /// Park the live graph content while a read-only version is shown.
    pub fn set_temp_workflow(&self, content: WorkflowContent) {
        *self.temp_workflow.lock().unwrap() = Some(content);
    }

    pub fn get_temp_workflow(&self) -> Option<WorkflowContent> {
        self.temp_workflow.lock().unwrap().clone()
    }

    pub fn reset_temp_workflow(&self) {
        *self.temp_workflow.lock().unwrap() = None;
    }

    // ==================== Store swapping ====================

    /// Show `content` from a detached store. Nothing done to it reaches the room.
    pub fn reload_workflow(&self, content: &WorkflowContent) -> Result<()> {
        let detached = Arc::new(GraphStore::from_content(content)?);
        self.swap_store(detached)
    }

    /// Make the live store current again. Undo history restarts empty.
    pub fn return_to_live_workflow(&self) -> Result<()> {
        if self.is_showing_live() {
            return Ok(());
        }
        self.swap_store(Arc::clone(&self.live_store))
    }

    fn swap_store(&self, next: Arc<GraphStore>) -> Result<()> {
        let previous = {
            let mut current = self.current.write().unwrap();
            std::mem::replace(&mut *current, Arc::clone(&next))
        };
        {
            let mut subscription = self.subscription.lock().unwrap();
            if let Some(id) = subscription.take() {
                previous.unobserve(id);
            }
            *subscription = Some(self.observe(&next));
        }
        self.history.attach(&next);

        let changes = content_changes(&previous.snapshot(), &next.snapshot())?;
        log::info!(
            "[Mediator] switched to {} store, {} key(s) differ",
            if Arc::ptr_eq(&next, &self.live_store) {
                "live"
            } else {
                "detached"
            },
            changes.len()
        );
        self.dispatch(&StoreChange {
            origin: UpdateOrigin::Reload,
            changes,
        });
        Ok(())
    }

    // ==================== Highlights ====================

    fn apply_highlight<F>(&self, f: F) -> HighlightDelta
    where
        F: FnOnce(&mut HighlightSet) -> HighlightDelta,
    {
        let delta = {
            let mut set = self.highlights.lock().unwrap();
            f(&mut set)
        };
        if !delta.is_empty() {
            self.events.highlights.emit(&delta);
        }
        delta
    }

    pub fn highlight_operators<I, S>(&self, ids: I) -> HighlightDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<HighlightTarget> = ids
            .into_iter()
            .map(|id| HighlightTarget::Operator(id.into()))
            .collect();
        self.apply_highlight(|set| set.highlight(targets))
    }

    pub fn unhighlight_operators<I, S>(&self, ids: I) -> HighlightDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<HighlightTarget> = ids
            .into_iter()
            .map(|id| HighlightTarget::Operator(id.into()))
            .collect();
        self.apply_highlight(|set| set.unhighlight(targets))
    }

    pub fn highlight_links<I, S>(&self, ids: I) -> HighlightDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<HighlightTarget> = ids
            .into_iter()
            .map(|id| HighlightTarget::Link(id.into()))
            .collect();
        self.apply_highlight(|set| set.highlight(targets))
    }

    pub fn unhighlight_links<I, S>(&self, ids: I) -> HighlightDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<HighlightTarget> = ids
            .into_iter()
            .map(|id| HighlightTarget::Link(id.into()))
            .collect();
        self.apply_highlight(|set| set.unhighlight(targets))
    }

    pub fn highlight_comment_boxes<I, S>(&self, ids: I) -> HighlightDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<HighlightTarget> = ids
            .into_iter()
            .map(|id| HighlightTarget::CommentBox(id.into()))
            .collect();
        self.apply_highlight(|set| set.highlight(targets))
    }

    pub fn unhighlight_comment_boxes<I, S>(&self, ids: I) -> HighlightDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<HighlightTarget> = ids
            .into_iter()
            .map(|id| HighlightTarget::CommentBox(id.into()))
            .collect();
        self.apply_highlight(|set| set.unhighlight(targets))
    }

    pub fn highlight_ports(&self, ports: Vec<crate::model::LogicalPort>) -> HighlightDelta {
        let targets: Vec<HighlightTarget> = ports.into_iter().map(HighlightTarget::Port).collect();
        self.apply_highlight(|set| set.highlight(targets))
    }

    pub fn unhighlight_ports(&self, ports: Vec<crate::model::LogicalPort>) -> HighlightDelta {
        let targets: Vec<HighlightTarget> = ports.into_iter().map(HighlightTarget::Port).collect();
        self.apply_highlight(|set| set.unhighlight(targets))
    }

    pub fn set_multi_select(&self, enabled: bool) {
        self.highlights.lock().unwrap().set_multi_select(enabled);
    }

    pub fn clear_highlights(&self) -> HighlightDelta {
        self.apply_highlight(|set| set.clear())
    }

    /// A copy of the current highlight set.
    pub fn get_highlights(&self) -> HighlightSet {
        self.highlights.lock().unwrap().clone()
    }

    // ==================== Event translation ====================

    /// Re-publish one committed store change as typed events.
    ///
    /// Deletions go out first (links before the operators they hang on),
    /// then additions (operators before the links that need them), then
    /// modifications and moves.
    fn dispatch(&self, change: &StoreChange) {
        let origin = change.origin;
        let positions: HashMap<&str, &ChangeRecord> = change
            .in_collection(Collection::Positions)
            .map(|record| (record.key.as_str(), record))
            .collect();
        let position_of = |element_id: &str| -> Option<Point> {
            match positions.get(element_id) {
                Some(record) => record.after_as(),
                None => self.current_store().get_position(element_id),
            }
        };

        let mut link_added = Vec::new();
        let mut link_deleted = Vec::new();
        for record in change.in_collection(Collection::Links) {
            if let Some(before) = record.before_as::<Link>() {
                link_deleted.push(before);
            }
            if let Some(after) = record.after_as::<Link>() {
                link_added.push(after);
            }
        }

        let mut op_events = Vec::new();
        let mut box_events = Vec::new();
        let mut structural: HashSet<&str> = HashSet::new();
        let mut deleted_ids: Vec<String> = link_deleted.iter().map(|l| l.link_id.clone()).collect();

        for record in change.in_collection(Collection::Operators) {
            match (record.before_as::<Operator>(), record.after_as::<Operator>()) {
                (None, Some(operator)) => {
                    structural.insert(record.key.as_str());
                    let position = position_of(&record.key);
                    op_events.push(OperatorEvent::Added {
                        operator,
                        position,
                        origin,
                    });
                }
                (Some(operator), None) => {
                    structural.insert(record.key.as_str());
                    deleted_ids.push(record.key.clone());
                    op_events.push(OperatorEvent::Deleted { operator, origin });
                }
                (Some(before), Some(after)) => op_events.push(OperatorEvent::Changed {
                    before,
                    after,
                    origin,
                }),
                (None, None) => {}
            }
        }

        for record in change.in_collection(Collection::CommentBoxes) {
            match (
                record.before_as::<CommentBox>(),
                record.after_as::<CommentBox>(),
            ) {
                (None, Some(comment_box)) => {
                    structural.insert(record.key.as_str());
                    let position = position_of(&record.key);
                    box_events.push(CommentBoxEvent::Added {
                        comment_box,
                        position,
                        origin,
                    });
                }
                (Some(comment_box), None) => {
                    structural.insert(record.key.as_str());
                    deleted_ids.push(record.key.clone());
                    box_events.push(CommentBoxEvent::Deleted {
                        comment_box,
                        origin,
                    });
                }
                (Some(before), Some(after)) => box_events.push(CommentBoxEvent::Changed {
                    before,
                    after,
                    origin,
                }),
                (None, None) => {}
            }
        }

        let is_deletion = |e: &&OperatorEvent| matches!(e, OperatorEvent::Deleted { .. });
        let is_box_deletion = |e: &&CommentBoxEvent| matches!(e, CommentBoxEvent::Deleted { .. });

        for link in link_deleted {
            self.events.links.emit(&LinkEvent::Deleted { link, origin });
        }
        for event in op_events.iter().filter(is_deletion) {
            self.events.operators.emit(event);
        }
        for event in box_events.iter().filter(is_box_deletion) {
            self.events.comment_boxes.emit(event);
        }
        for event in op_events.iter().filter(|e| !is_deletion(e)) {
            self.events.operators.emit(event);
        }
        for event in box_events.iter().filter(|e| !is_box_deletion(e)) {
            self.events.comment_boxes.emit(event);
        }
        for link in link_added {
            self.events.links.emit(&LinkEvent::Added { link, origin });
        }

        for record in change.in_collection(Collection::Positions) {
            if structural.contains(record.key.as_str()) {
                continue;
            }
            if let Some(new_position) = record.after_as::<Point>() {
                self.events.positions.emit(&PositionEvent {
                    element_id: record.key.clone(),
                    old_position: record.before_as(),
                    new_position,
                    origin,
                });
            }
        }

        if !deleted_ids.is_empty() {
            self.apply_highlight(|set| {
                let mut delta = HighlightDelta::default();
                for id in &deleted_ids {
                    delta.unhighlighted.extend(set.forget_element(id).unhighlighted);
                }
                delta
            });
        }

        log::debug!(
            "[Mediator] dispatched {} change(s), origin {}",
            change.changes.len(),
            origin
        );
    }
}

impl Drop for GraphActionMediator {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get_mut().ok().and_then(|s| s.take()) {
            if let Ok(current) = self.current.read() {
                current.unobserve(id);
            }
        }
    }
}

impl std::fmt::Debug for GraphActionMediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphActionMediator")
            .field("showing_live", &self.is_showing_live())
            .field(
                "modification_enabled",
                &self.is_workflow_modification_enabled(),
            )
            .field("history", &self.history)
            .finish()
    }
}
