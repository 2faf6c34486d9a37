//! An in-memory [`VisualGraphSink`] for tests and headless use.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::{VisualElement, VisualEvent, VisualGraphSink};
use crate::highlight::HighlightTarget;
use crate::model::{LogicalPort, Point};
use crate::version::Decoration;

/// A command received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommand {
    AddElement(String),
    RemoveElement(String),
    MoveElement { element_id: String, dx: f64, dy: f64 },
    SetHighlight { target: HighlightTarget, on: bool },
    ConnectPorts(String),
    DisconnectLink(String),
    SetDecoration { decoration: Decoration, on: bool },
}

#[derive(Debug, Default)]
struct Scene {
    elements: IndexMap<String, Point>,
    links: IndexMap<String, (LogicalPort, LogicalPort)>,
    highlighted: IndexSet<HighlightTarget>,
    decorations: Vec<Decoration>,
    commands: Vec<SinkCommand>,
}

/// Records every command and keeps a model of what would be on screen.
///
/// With echo mode on, structural commands answer with the UI event a real
/// renderer would fire for them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    scene: Mutex<Scene>,
    echo: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that echoes its commands back as UI events.
    pub fn echoing() -> Self {
        let sink = Self::default();
        sink.set_echo(true);
        sink
    }

    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::SeqCst);
    }

    fn echo(&self, event: VisualEvent) -> Vec<VisualEvent> {
        if self.echo.load(Ordering::SeqCst) {
            vec![event]
        } else {
            Vec::new()
        }
    }

    pub fn commands(&self) -> Vec<SinkCommand> {
        self.scene.lock().unwrap().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.scene.lock().unwrap().commands.clear();
    }

    pub fn element_position(&self, element_id: &str) -> Option<Point> {
        self.scene.lock().unwrap().elements.get(element_id).copied()
    }

    pub fn element_ids(&self) -> Vec<String> {
        self.scene.lock().unwrap().elements.keys().cloned().collect()
    }

    pub fn link_ids(&self) -> Vec<String> {
        self.scene.lock().unwrap().links.keys().cloned().collect()
    }

    pub fn is_highlighted(&self, target: &HighlightTarget) -> bool {
        self.scene.lock().unwrap().highlighted.contains(target)
    }

    pub fn decorations(&self) -> Vec<Decoration> {
        self.scene.lock().unwrap().decorations.clone()
    }

    /// Simulate a user dragging an element: the scene moves, and the event
    /// the renderer would fire is returned for the caller to route.
    pub fn user_drag(&self, element_id: &str, dx: f64, dy: f64) -> VisualEvent {
        let mut scene = self.scene.lock().unwrap();
        if let Some(position) = scene.elements.get_mut(element_id) {
            *position = position.translated(dx, dy);
        }
        VisualEvent::ElementMoved {
            element_id: element_id.to_string(),
            dx,
            dy,
        }
    }
}

impl VisualGraphSink for RecordingSink {
    fn add_element(&self, element: &VisualElement) -> Vec<VisualEvent> {
        let mut scene = self.scene.lock().unwrap();
        let id = element.element_id().to_string();
        scene.elements.insert(id.clone(), element.position());
        scene.commands.push(SinkCommand::AddElement(id));
        Vec::new()
    }

    fn remove_element(&self, element_id: &str) -> Vec<VisualEvent> {
        {
            let mut scene = self.scene.lock().unwrap();
            scene.elements.shift_remove(element_id);
            scene
                .commands
                .push(SinkCommand::RemoveElement(element_id.to_string()));
        }
        self.echo(VisualEvent::ElementDeleted {
            element_id: element_id.to_string(),
        })
    }

    fn move_element(&self, element_id: &str, dx: f64, dy: f64) -> Vec<VisualEvent> {
        {
            let mut scene = self.scene.lock().unwrap();
            if let Some(position) = scene.elements.get_mut(element_id) {
                *position = position.translated(dx, dy);
            }
            scene.commands.push(SinkCommand::MoveElement {
                element_id: element_id.to_string(),
                dx,
                dy,
            });
        }
        self.echo(VisualEvent::ElementMoved {
            element_id: element_id.to_string(),
            dx,
            dy,
        })
    }

    fn set_highlight(&self, target: &HighlightTarget, on: bool) {
        let mut scene = self.scene.lock().unwrap();
        if on {
            scene.highlighted.insert(target.clone());
        } else {
            scene.highlighted.shift_remove(target);
        }
        scene.commands.push(SinkCommand::SetHighlight {
            target: target.clone(),
            on,
        });
    }

    fn connect_ports(
        &self,
        link_id: &str,
        source: &LogicalPort,
        target: &LogicalPort,
    ) -> Vec<VisualEvent> {
        {
            let mut scene = self.scene.lock().unwrap();
            scene
                .links
                .insert(link_id.to_string(), (source.clone(), target.clone()));
            scene
                .commands
                .push(SinkCommand::ConnectPorts(link_id.to_string()));
        }
        self.echo(VisualEvent::LinkDrawn {
            link_id: link_id.to_string(),
            source: source.clone(),
            target: target.clone(),
        })
    }

    fn disconnect_link(&self, link_id: &str) -> Vec<VisualEvent> {
        {
            let mut scene = self.scene.lock().unwrap();
            scene.links.shift_remove(link_id);
            scene
                .commands
                .push(SinkCommand::DisconnectLink(link_id.to_string()));
        }
        self.echo(VisualEvent::LinkDeleted {
            link_id: link_id.to_string(),
        })
    }

    fn set_decoration(&self, decoration: &Decoration, on: bool) {
        let mut scene = self.scene.lock().unwrap();
        if on {
            scene.decorations.push(decoration.clone());
        } else {
            scene.decorations.retain(|d| d != decoration);
        }
        scene.commands.push(SinkCommand::SetDecoration {
            decoration: decoration.clone(),
            on,
        });
    }
}
