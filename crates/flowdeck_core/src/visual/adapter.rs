//! Two-way synchronisation between the mediator and a renderer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use ts_rs::TS;

use super::{VisualElement, VisualEvent, VisualGraphSink};
use crate::crdt::UpdateOrigin;
use crate::error::Result;
use crate::events::{EventChannel, SubscriptionId};
use crate::highlight::HighlightDelta;
use crate::mediator::{
    CommentBoxEvent, ElementMove, GraphActionMediator, LinkEvent, OperatorEvent, PositionEvent,
};
use crate::model::{Link, Point};
use crate::version::{Decoration, DecorationEvent};

/// Visual lifecycle of one element, operator, comment box or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ElementState {
    /// Not drawn
    Absent,
    /// Drawn and in step with the logical graph
    Clean,
    /// A local change is being pushed into the renderer
    DirtyLocal,
    /// A replicated change is being pushed into the renderer
    DirtyRemote,
}

impl ElementState {
    pub fn is_dirty(&self) -> bool {
        matches!(self, ElementState::DirtyLocal | ElementState::DirtyRemote)
    }
}

/// Moves smaller than this are treated as no move.
const MOVE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Subscriptions {
    operators: SubscriptionId,
    links: SubscriptionId,
    comment_boxes: SubscriptionId,
    positions: SubscriptionId,
    highlights: SubscriptionId,
}

/// Keeps a renderer in step with a [`GraphActionMediator`], and routes the
/// renderer's UI events back into it.
///
/// Every renderer command runs with its element marked dirty. UI events the
/// renderer fires about a dirty element, or any UI event fired while a
/// replicated change is being applied, are echoes and are dropped instead of
/// being turned into new edits.
pub struct VisualSyncAdapter {
    mediator: Arc<GraphActionMediator>,
    sink: Arc<dyn VisualGraphSink>,
    states: Mutex<HashMap<String, ElementState>>,
    positions: Mutex<HashMap<String, Point>>,
    decorations: Mutex<Vec<Decoration>>,
    suppressing: AtomicBool,
    suppressed: AtomicU64,
    forwarded: AtomicU64,
    subscriptions: Mutex<Option<Subscriptions>>,
    pointer: EventChannel<VisualEvent>,
}

impl VisualSyncAdapter {
    /// Draw the mediator's current graph into `sink` and start following it.
    pub fn attach(
        mediator: Arc<GraphActionMediator>,
        sink: Arc<dyn VisualGraphSink>,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            mediator,
            sink,
            states: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
            decorations: Mutex::new(Vec::new()),
            suppressing: AtomicBool::new(false),
            suppressed: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            subscriptions: Mutex::new(None),
            pointer: EventChannel::new(),
        });
        adapter.render_all();
        let subscriptions = adapter.subscribe(Arc::downgrade(&adapter));
        *adapter.subscriptions.lock().unwrap() = Some(subscriptions);
        adapter
    }

    fn subscribe(&self, weak: Weak<Self>) -> Subscriptions {
        let events = self.mediator.events();
        let w = weak.clone();
        let operators = events.operators.subscribe(move |e| {
            if let Some(adapter) = w.upgrade() {
                adapter.on_operator(e);
            }
        });
        let w = weak.clone();
        let links = events.links.subscribe(move |e| {
            if let Some(adapter) = w.upgrade() {
                adapter.on_link(e);
            }
        });
        let w = weak.clone();
        let comment_boxes = events.comment_boxes.subscribe(move |e| {
            if let Some(adapter) = w.upgrade() {
                adapter.on_comment_box(e);
            }
        });
        let w = weak.clone();
        let positions = events.positions.subscribe(move |e| {
            if let Some(adapter) = w.upgrade() {
                adapter.on_position(e);
            }
        });
        let highlights = events.highlights.subscribe(move |e| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_highlight(e);
            }
        });
        Subscriptions {
            operators,
            links,
            comment_boxes,
            positions,
            highlights,
        }
    }

    /// Stop following the mediator. The renderer keeps what it shows.
    pub fn detach(&self) {
        if let Some(s) = self.subscriptions.lock().unwrap().take() {
            let events = self.mediator.events();
            events.operators.unsubscribe(s.operators);
            events.links.unsubscribe(s.links);
            events.comment_boxes.unsubscribe(s.comment_boxes);
            events.positions.unsubscribe(s.positions);
            events.highlights.unsubscribe(s.highlights);
        }
    }

    // ==================== Inspection ====================

    pub fn state_of(&self, element_id: &str) -> ElementState {
        self.states
            .lock()
            .unwrap()
            .get(element_id)
            .copied()
            .unwrap_or(ElementState::Absent)
    }

    /// Where the renderer currently shows an element.
    pub fn visual_position(&self, element_id: &str) -> Option<Point> {
        self.positions.lock().unwrap().get(element_id).copied()
    }

    /// Number of renderer events dropped as echoes.
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::SeqCst)
    }

    /// Number of UI events turned into mediator calls.
    pub fn forwarded_count(&self) -> u64 {
        self.forwarded.load(Ordering::SeqCst)
    }

    /// Pointer events, for gesture consumers such as placement suggestions.
    pub fn pointer_events(&self) -> &EventChannel<VisualEvent> {
        &self.pointer
    }

    pub fn mediator(&self) -> &Arc<GraphActionMediator> {
        &self.mediator
    }

    // ==================== Logical → visual ====================

    fn set_state(&self, element_id: &str, state: ElementState) {
        let mut states = self.states.lock().unwrap();
        if state == ElementState::Absent {
            states.remove(element_id);
        } else {
            states.insert(element_id.to_string(), state);
        }
    }

    /// Run one renderer command for `element_id` and swallow its echoes.
    fn render<F>(&self, element_id: &str, origin: UpdateOrigin, removing: bool, command: F)
    where
        F: FnOnce(&dyn VisualGraphSink) -> Vec<VisualEvent>,
    {
        let remote = !origin.is_outbound();
        self.set_state(
            element_id,
            if remote {
                ElementState::DirtyRemote
            } else {
                ElementState::DirtyLocal
            },
        );
        let was_suppressing = remote && self.suppressing.swap(true, Ordering::SeqCst);

        let echoes = command(self.sink.as_ref());
        for echo in echoes {
            if echo.is_pointer() {
                // A render is not user input
                self.suppressed.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            if let Err(e) = self.handle_ui_event(echo) {
                log::warn!("[VisualSync] echo of {} not dropped: {}", element_id, e);
            }
        }

        if remote {
            self.suppressing.store(was_suppressing, Ordering::SeqCst);
        }
        self.set_state(
            element_id,
            if removing {
                ElementState::Absent
            } else {
                ElementState::Clean
            },
        );
    }

    fn render_all(&self) {
        let content = self.mediator.get_workflow_content();
        for operator in content.operators {
            let position = content
                .positions
                .get(&operator.operator_id)
                .copied()
                .unwrap_or_default();
            self.draw(
                VisualElement::Operator { operator, position },
                UpdateOrigin::Reload,
            );
        }
        for comment_box in content.comment_boxes {
            let position = content
                .positions
                .get(&comment_box.comment_box_id)
                .copied()
                .unwrap_or_default();
            self.draw(
                VisualElement::CommentBox {
                    comment_box,
                    position,
                },
                UpdateOrigin::Reload,
            );
        }
        for link in content.links {
            self.connect(&link, UpdateOrigin::Reload);
        }
        log::debug!(
            "[VisualSync] rendered {} element(s)",
            self.states.lock().unwrap().len()
        );
    }

    fn draw(&self, element: VisualElement, origin: UpdateOrigin) {
        let id = element.element_id().to_string();
        self.positions
            .lock()
            .unwrap()
            .insert(id.clone(), element.position());
        self.render(&id, origin, false, |sink| sink.add_element(&element));
    }

    fn erase(&self, element_id: &str, origin: UpdateOrigin) {
        self.positions.lock().unwrap().remove(element_id);
        if self.state_of(element_id) == ElementState::Absent {
            // Already removed from the renderer by the gesture that deleted it
            return;
        }
        self.render(element_id, origin, true, |sink| sink.remove_element(element_id));
    }

    fn connect(&self, link: &Link, origin: UpdateOrigin) {
        if self.state_of(&link.link_id) != ElementState::Absent {
            // Drawn by the user before it was committed
            return;
        }
        self.render(&link.link_id, origin, false, |sink| {
            sink.connect_ports(&link.link_id, &link.source, &link.target)
        });
    }

    fn disconnect(&self, link_id: &str, origin: UpdateOrigin) {
        if self.state_of(link_id) == ElementState::Absent {
            return;
        }
        self.render(link_id, origin, true, |sink| sink.disconnect_link(link_id));
    }

    fn on_operator(&self, event: &OperatorEvent) {
        match event {
            OperatorEvent::Added {
                operator,
                position,
                origin,
            } => self.draw(
                VisualElement::Operator {
                    operator: operator.clone(),
                    position: position.unwrap_or_default(),
                },
                *origin,
            ),
            OperatorEvent::Deleted { operator, origin } => {
                self.erase(&operator.operator_id, *origin)
            }
            OperatorEvent::Changed {
                before,
                after,
                origin,
            } => {
                let reshaped = before.input_ports != after.input_ports
                    || before.output_ports != after.output_ports
                    || before.custom_display_name != after.custom_display_name;
                if reshaped {
                    let position = self
                        .visual_position(&after.operator_id)
                        .unwrap_or_default();
                    let element = VisualElement::Operator {
                        operator: after.clone(),
                        position,
                    };
                    self.render(&after.operator_id, *origin, false, |sink| {
                        sink.add_element(&element)
                    });
                }
            }
        }
    }

    fn on_link(&self, event: &LinkEvent) {
        match event {
            LinkEvent::Added { link, origin } => self.connect(link, *origin),
            LinkEvent::Deleted { link, origin } => self.disconnect(&link.link_id, *origin),
        }
    }

    fn on_comment_box(&self, event: &CommentBoxEvent) {
        match event {
            CommentBoxEvent::Added {
                comment_box,
                position,
                origin,
            } => self.draw(
                VisualElement::CommentBox {
                    comment_box: comment_box.clone(),
                    position: position.unwrap_or_default(),
                },
                *origin,
            ),
            CommentBoxEvent::Deleted {
                comment_box,
                origin,
            } => self.erase(&comment_box.comment_box_id, *origin),
            // Comment text lives in the side panel, not on the canvas
            CommentBoxEvent::Changed { .. } => {}
        }
    }

    fn on_position(&self, event: &PositionEvent) {
        let (dx, dy) = {
            let mut positions = self.positions.lock().unwrap();
            let delta = match positions.get(&event.element_id) {
                Some(shown) => (
                    event.new_position.x - shown.x,
                    event.new_position.y - shown.y,
                ),
                None => event.delta(),
            };
            positions.insert(event.element_id.clone(), event.new_position);
            delta
        };
        if dx.abs() < MOVE_EPSILON && dy.abs() < MOVE_EPSILON {
            return;
        }
        self.render(&event.element_id, event.origin, false, |sink| {
            sink.move_element(&event.element_id, dx, dy)
        });
    }

    fn on_highlight(&self, delta: &HighlightDelta) {
        for target in &delta.unhighlighted {
            self.sink.set_highlight(target, false);
        }
        for target in &delta.highlighted {
            self.sink.set_highlight(target, true);
        }
    }

    /// Show or clear version-diff decorations.
    pub fn apply_decoration_event(&self, event: &DecorationEvent) {
        let previous = std::mem::take(&mut *self.decorations.lock().unwrap());
        for decoration in &previous {
            self.sink.set_decoration(decoration, false);
        }
        if let DecorationEvent::Show(decorations) = event {
            for decoration in decorations {
                self.sink.set_decoration(decoration, true);
            }
            *self.decorations.lock().unwrap() = decorations.clone();
        }
    }

    // ==================== Visual → logical ====================

    /// Route a renderer event to the mediator.
    ///
    /// Returns `Ok(true)` if it became a mediator call that was accepted,
    /// `Ok(false)` if it was dropped as an echo or refused.
    pub fn handle_ui_event(&self, event: VisualEvent) -> Result<bool> {
        if event.is_pointer() {
            self.pointer.emit(&event);
            if let VisualEvent::PointerDown {
                element_id, multi, ..
            } = &event
            {
                self.select(element_id.as_deref(), *multi);
            }
            return Ok(false);
        }

        let echo = self.suppressing.load(Ordering::SeqCst)
            || event
                .element_id()
                .is_some_and(|id| self.state_of(id).is_dirty());
        if echo {
            self.suppressed.fetch_add(1, Ordering::SeqCst);
            log::trace!("[VisualSync] dropped echo {:?}", event);
            return Ok(false);
        }

        self.forwarded.fetch_add(1, Ordering::SeqCst);
        match event {
            VisualEvent::ElementMoved { element_id, dx, dy } => {
                self.user_moved(&element_id, dx, dy)
            }
            VisualEvent::ElementDeleted { element_id } => self.user_deleted(&element_id),
            VisualEvent::LinkDrawn {
                link_id,
                source,
                target,
            } => {
                self.set_state(&link_id, ElementState::Clean);
                let accepted = self
                    .mediator
                    .add_link(Link::new(link_id.clone(), source, target))?;
                if !accepted {
                    self.render(&link_id, UpdateOrigin::Local, true, |sink| {
                        sink.disconnect_link(&link_id)
                    });
                }
                Ok(accepted)
            }
            VisualEvent::LinkDeleted { link_id } => {
                self.set_state(&link_id, ElementState::Absent);
                if self.mediator.get_link(&link_id).is_none() {
                    return Ok(false);
                }
                self.mediator.delete_link(&link_id)
            }
            VisualEvent::PointerDown { .. }
            | VisualEvent::PointerMove { .. }
            | VisualEvent::PointerUp { .. } => Ok(false),
        }
    }

    /// A drag of one element moves the whole selection with it.
    fn user_moved(&self, element_id: &str, dx: f64, dy: f64) -> Result<bool> {
        if let Some(shown) = self.positions.lock().unwrap().get_mut(element_id) {
            *shown = shown.translated(dx, dy);
        }

        let selection = self.mediator.get_highlights().movable_elements();
        let ids = if selection.iter().any(|id| id == element_id) {
            selection
        } else {
            vec![element_id.to_string()]
        };
        let moves: Vec<ElementMove> = ids
            .into_iter()
            .filter(|id| self.mediator.get_position(id).is_some())
            .map(|id| ElementMove::new(id, dx, dy))
            .collect();
        log::debug!("[VisualSync] moving {} element(s)", moves.len());
        self.mediator.move_elements(&moves)
    }

    fn user_deleted(&self, element_id: &str) -> Result<bool> {
        self.set_state(element_id, ElementState::Absent);
        if self.mediator.has_operator(element_id) {
            self.mediator.delete_operator(element_id)
        } else if self.mediator.get_comment_box(element_id).is_some() {
            self.mediator.delete_comment_box(element_id)
        } else if self.mediator.get_link(element_id).is_some() {
            self.mediator.delete_link(element_id)
        } else {
            Ok(false)
        }
    }

    fn select(&self, element_id: Option<&str>, multi: bool) {
        let Some(id) = element_id else {
            self.mediator.clear_highlights();
            return;
        };
        self.mediator.set_multi_select(multi);
        if self.mediator.has_operator(id) {
            self.mediator.highlight_operators([id]);
        } else if self.mediator.get_comment_box(id).is_some() {
            self.mediator.highlight_comment_boxes([id]);
        } else if self.mediator.get_link(id).is_some() {
            self.mediator.highlight_links([id]);
        }
    }
}

impl Drop for VisualSyncAdapter {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for VisualSyncAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualSyncAdapter")
            .field("elements", &self.states.lock().unwrap().len())
            .field("suppressed", &self.suppressed_count())
            .field("forwarded", &self.forwarded_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::crdt::GraphStore;
    use crate::highlight::HighlightTarget;
    use crate::model::{LogicalPort, Operator};
    use crate::schema::StaticSchemaRegistry;
    use crate::session::SessionContext;
    use crate::visual::{RecordingSink, SinkCommand};

    fn setup(echo: bool) -> (Arc<GraphActionMediator>, Arc<RecordingSink>, Arc<VisualSyncAdapter>) {
        let session = SessionContext::new("tester", EditorConfig::default());
        let mediator = GraphActionMediator::new(
            Arc::new(GraphStore::new()),
            &session,
            Arc::new(StaticSchemaRegistry::new()),
        );
        mediator
            .add_operator(Operator::new("a", "Scan", 0, 1), Point::new(0.0, 0.0))
            .unwrap();
        mediator
            .add_operator(Operator::new("b", "Sink", 1, 0), Point::new(100.0, 0.0))
            .unwrap();
        let sink = Arc::new(if echo {
            RecordingSink::echoing()
        } else {
            RecordingSink::new()
        });
        let adapter = VisualSyncAdapter::attach(mediator.clone(), sink.clone());
        (mediator, sink, adapter)
    }

    #[test]
    fn test_attach_renders_existing_graph() {
        let (_, sink, adapter) = setup(false);
        assert_eq!(sink.element_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(adapter.state_of("a"), ElementState::Clean);
        assert_eq!(adapter.state_of("zzz"), ElementState::Absent);
    }

    #[test]
    fn test_local_edits_reach_the_renderer_once() {
        let (mediator, sink, adapter) = setup(true);
        mediator
            .add_operator(Operator::new("c", "Filter", 1, 1), Point::new(50.0, 50.0))
            .unwrap();
        mediator
            .move_elements(&[ElementMove::new("c", 10.0, 0.0)])
            .unwrap();
        assert_eq!(sink.element_position("c"), Some(Point::new(60.0, 50.0)));
        assert_eq!(mediator.history().undo_len(), 4);
        assert_eq!(adapter.forwarded_count(), 0);
        assert!(adapter.suppressed_count() >= 1);
    }

    #[test]
    fn test_drag_moves_whole_selection() {
        let (mediator, sink, adapter) = setup(true);
        mediator.set_multi_select(true);
        mediator.highlight_operators(["a", "b"]);

        let event = sink.user_drag("a", 5.0, 7.0);
        assert!(adapter.handle_ui_event(event).unwrap());

        assert_eq!(mediator.get_position("a"), Some(Point::new(5.0, 7.0)));
        assert_eq!(mediator.get_position("b"), Some(Point::new(105.0, 7.0)));
        assert_eq!(sink.element_position("a"), Some(Point::new(5.0, 7.0)));
        assert_eq!(sink.element_position("b"), Some(Point::new(105.0, 7.0)));
        // The dragged element is not moved a second time
        let moves_of_a = sink
            .commands()
            .into_iter()
            .filter(|c| matches!(c, SinkCommand::MoveElement { element_id, .. } if element_id == "a"))
            .count();
        assert_eq!(moves_of_a, 0);
    }

    #[test]
    fn test_rejected_link_is_erased() {
        let (mediator, sink, adapter) = setup(false);
        let accepted = adapter
            .handle_ui_event(VisualEvent::LinkDrawn {
                link_id: "loop".to_string(),
                source: LogicalPort::new("a", "output-0"),
                target: LogicalPort::new("a", "input-0"),
            })
            .unwrap();
        assert!(!accepted);
        assert!(mediator.links().is_empty());
        assert!(sink.commands().contains(&SinkCommand::DisconnectLink("loop".to_string())));
        assert_eq!(adapter.state_of("loop"), ElementState::Absent);
    }

    #[test]
    fn test_drawn_link_is_not_drawn_twice() {
        let (mediator, sink, adapter) = setup(false);
        adapter
            .handle_ui_event(VisualEvent::LinkDrawn {
                link_id: "l".to_string(),
                source: LogicalPort::new("a", "output-0"),
                target: LogicalPort::new("b", "input-0"),
            })
            .unwrap();
        assert_eq!(mediator.links().len(), 1);
        assert!(!sink.commands().contains(&SinkCommand::ConnectPorts("l".to_string())));
        assert_eq!(adapter.state_of("l"), ElementState::Clean);
    }

    #[test]
    fn test_ui_delete_goes_through_mediator() {
        let (mediator, sink, adapter) = setup(true);
        adapter
            .handle_ui_event(VisualEvent::ElementDeleted {
                element_id: "b".to_string(),
            })
            .unwrap();
        assert!(!mediator.has_operator("b"));
        assert!(!sink.commands().contains(&SinkCommand::RemoveElement("b".to_string())));

        mediator.undo().unwrap();
        assert_eq!(adapter.state_of("b"), ElementState::Clean);
        assert!(sink.element_ids().contains(&"b".to_string()));
    }

    #[test]
    fn test_pointer_down_selects() {
        let (mediator, sink, adapter) = setup(false);
        adapter
            .handle_ui_event(VisualEvent::PointerDown {
                element_id: Some("a".to_string()),
                position: Point::new(0.0, 0.0),
                multi: false,
            })
            .unwrap();
        let target = HighlightTarget::Operator("a".to_string());
        assert!(sink.is_highlighted(&target));
        assert!(mediator.get_highlights().contains(&target));

        adapter
            .handle_ui_event(VisualEvent::PointerDown {
                element_id: None,
                position: Point::new(500.0, 500.0),
                multi: false,
            })
            .unwrap();
        assert!(!sink.is_highlighted(&target));
    }

    /// Answers every add with the click a renderer fires when a new node
    /// lands under the cursor.
    struct ClickingSink(RecordingSink);

    impl VisualGraphSink for ClickingSink {
        fn add_element(&self, element: &VisualElement) -> Vec<VisualEvent> {
            self.0.add_element(element);
            vec![VisualEvent::PointerDown {
                element_id: Some(element.element_id().to_string()),
                position: element.position(),
                multi: false,
            }]
        }

        fn remove_element(&self, element_id: &str) -> Vec<VisualEvent> {
            self.0.remove_element(element_id)
        }

        fn move_element(&self, element_id: &str, dx: f64, dy: f64) -> Vec<VisualEvent> {
            self.0.move_element(element_id, dx, dy)
        }

        fn set_highlight(&self, target: &HighlightTarget, on: bool) {
            self.0.set_highlight(target, on)
        }

        fn connect_ports(
            &self,
            link_id: &str,
            source: &LogicalPort,
            target: &LogicalPort,
        ) -> Vec<VisualEvent> {
            self.0.connect_ports(link_id, source, target)
        }

        fn disconnect_link(&self, link_id: &str) -> Vec<VisualEvent> {
            self.0.disconnect_link(link_id)
        }
    }

    #[test]
    fn test_pointer_echo_of_remote_render_keeps_selection() {
        let store = Arc::new(GraphStore::new());
        let session = SessionContext::new("tester", EditorConfig::default());
        let mediator = GraphActionMediator::new(
            store.clone(),
            &session,
            Arc::new(StaticSchemaRegistry::new()),
        );
        mediator
            .add_operator(Operator::new("a", "Scan", 0, 1), Point::new(0.0, 0.0))
            .unwrap();
        let sink = Arc::new(ClickingSink(RecordingSink::new()));
        let adapter = VisualSyncAdapter::attach(mediator.clone(), sink.clone());
        mediator.highlight_operators(["a"]);
        let selected = mediator.get_highlights();

        let peer = GraphStore::new();
        peer.transact(UpdateOrigin::Local, |txn| {
            txn.put_operator(&Operator::new("c", "Filter", 1, 1))?;
            txn.put_position("c", Point::new(50.0, 50.0))
        })
        .unwrap();
        store
            .apply_update(&peer.encode_state_as_update(), UpdateOrigin::Remote)
            .unwrap();

        assert!(sink.0.element_ids().contains(&"c".to_string()));
        assert_eq!(mediator.get_highlights(), selected);
        assert!(sink.0.is_highlighted(&HighlightTarget::Operator("a".to_string())));
        assert!(!sink.0.is_highlighted(&HighlightTarget::Operator("c".to_string())));
        assert_eq!(adapter.forwarded_count(), 0);
    }
}
