//! Auto-link suggestions while an operator is dragged onto the canvas.
//!
//! On every pointer move, [`PlacementSuggester::update`] picks the operators
//! the dragged one would be wired to if dropped there:
//!
//! - only operators within the suggestion radius of the pointer count;
//! - operators strictly left of the pointer with a free output port are
//!   upstream candidates, feeding the dragged operator's inputs;
//! - operators strictly right of the pointer with a free input port are
//!   downstream candidates, fed by its outputs;
//! - the `n_in` nearest upstream and `n_out` nearest downstream candidates
//!   win.
//!
//! Each side keeps its winners in a max-heap bounded to the wanted size, so
//! an update costs `O(n log k)`. Only suggestions entering or leaving the set
//! are announced.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;

use serde::Serialize;
use ts_rs::TS;

use crate::config::{DEFAULT_SUGGESTION_RADIUS, EditorConfig};
use crate::error::Result;
use crate::events::EventChannel;
use crate::mediator::GraphActionMediator;
use crate::model::{Link, LogicalPort, Operator, Point, WorkflowContent};

/// Operators suggested for auto-linking, nearest first on each side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Suggestion {
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

impl Suggestion {
    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty() && self.downstream.is_empty()
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.upstream.iter().chain(self.downstream.iter())
    }
}

/// Operators that entered or left the suggestion set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SuggestionDelta {
    pub highlighted: Vec<String>,
    pub unhighlighted: Vec<String>,
}

impl SuggestionDelta {
    pub fn is_empty(&self) -> bool {
        self.highlighted.is_empty() && self.unhighlighted.is_empty()
    }
}

/// Heap entry ordered by distance, then id.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    distance: f64,
    operator_id: &'a str,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.operator_id.cmp(other.operator_id))
    }
}

/// Keeps the `limit` smallest candidates pushed into it.
struct Nearest<'a> {
    heap: BinaryHeap<Candidate<'a>>,
    limit: usize,
}

impl<'a> Nearest<'a> {
    fn new(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit + 1),
            limit,
        }
    }

    fn push(&mut self, candidate: Candidate<'a>) {
        if self.limit == 0 {
            return;
        }
        self.heap.push(candidate);
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    fn into_ids(self) -> Vec<String> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| c.operator_id.to_string())
            .collect()
    }
}

fn links_from(content: &WorkflowContent, operator_id: &str) -> usize {
    content
        .links
        .iter()
        .filter(|l| l.source.operator_id == operator_id)
        .count()
}

fn links_into(content: &WorkflowContent, operator_id: &str) -> usize {
    content
        .links
        .iter()
        .filter(|l| l.target.operator_id == operator_id)
        .count()
}

/// Compute the suggestion for a pointer at `mouse`, without side effects.
pub fn suggest(
    content: &WorkflowContent,
    radius: f64,
    n_in: usize,
    n_out: usize,
    mouse: Point,
) -> Suggestion {
    let mut upstream = Nearest::new(n_in);
    let mut downstream = Nearest::new(n_out);

    for operator in &content.operators {
        let Some(position) = content.positions.get(&operator.operator_id) else {
            continue;
        };
        let distance = position.distance_to(&mouse);
        if distance > radius {
            continue;
        }
        let candidate = Candidate {
            distance,
            operator_id: &operator.operator_id,
        };
        if position.x < mouse.x {
            if links_from(content, &operator.operator_id) < operator.output_ports.len() {
                upstream.push(candidate);
            }
        } else if position.x > mouse.x
            && links_into(content, &operator.operator_id) < operator.input_ports.len()
        {
            downstream.push(candidate);
        }
    }

    Suggestion {
        upstream: upstream.into_ids(),
        downstream: downstream.into_ids(),
    }
}

/// Pair suggested operators with the dragged operator's ports.
///
/// Upstream operators, taken top to bottom, feed the dragged operator's
/// inputs in order; downstream operators, top to bottom, are fed from its
/// outputs in order. Each side of each pairing uses a port with no existing
/// link, and no port is used twice.
pub fn drop_links(
    dragged: &Operator,
    suggestion: &Suggestion,
    content: &WorkflowContent,
) -> Vec<Link> {
    let mut taken: HashSet<LogicalPort> = content
        .links
        .iter()
        .flat_map(|l| [l.source.clone(), l.target.clone()])
        .collect();
    let by_height = |ids: &[String]| -> Vec<Operator> {
        let mut operators: Vec<(f64, Operator)> = ids
            .iter()
            .filter_map(|id| {
                let operator = content.operator(id)?.clone();
                let y = content.positions.get(id)?.y;
                Some((y, operator))
            })
            .collect();
        operators.sort_by(|a, b| a.0.total_cmp(&b.0));
        operators.into_iter().map(|(_, op)| op).collect()
    };
    let mut links = Vec::new();

    let mut inputs = dragged
        .input_ports
        .iter()
        .map(|p| LogicalPort::new(&dragged.operator_id, &p.port_id));
    for upstream in by_height(&suggestion.upstream) {
        let free = upstream
            .output_ports
            .iter()
            .map(|p| LogicalPort::new(&upstream.operator_id, &p.port_id))
            .find(|port| !taken.contains(port));
        let Some(source) = free else { continue };
        let Some(target) = inputs.by_ref().find(|port| !taken.contains(port)) else {
            break;
        };
        taken.insert(source.clone());
        taken.insert(target.clone());
        links.push(Link::with_generated_id(source, target));
    }

    let mut outputs = dragged
        .output_ports
        .iter()
        .map(|p| LogicalPort::new(&dragged.operator_id, &p.port_id));
    for downstream in by_height(&suggestion.downstream) {
        let free = downstream
            .input_ports
            .iter()
            .map(|p| LogicalPort::new(&downstream.operator_id, &p.port_id))
            .find(|port| !taken.contains(port));
        let Some(target) = free else { continue };
        let Some(source) = outputs.by_ref().find(|port| !taken.contains(port)) else {
            break;
        };
        taken.insert(source.clone());
        taken.insert(target.clone());
        links.push(Link::with_generated_id(source, target));
    }

    links
}

/// Tracks the suggestion across one drag gesture.
#[derive(Debug)]
pub struct PlacementSuggester {
    radius: f64,
    current: Mutex<Suggestion>,
    events: EventChannel<SuggestionDelta>,
}

impl Default for PlacementSuggester {
    fn default() -> Self {
        Self::new(DEFAULT_SUGGESTION_RADIUS)
    }
}

impl PlacementSuggester {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            current: Mutex::new(Suggestion::default()),
            events: EventChannel::new(),
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.suggestion_radius)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Highlight changes, one event per pointer move that changed anything.
    pub fn events(&self) -> &EventChannel<SuggestionDelta> {
        &self.events
    }

    pub fn current(&self) -> Suggestion {
        self.current.lock().unwrap().clone()
    }

    /// Recompute for a pointer at `mouse` and announce what changed.
    pub fn update(
        &self,
        content: &WorkflowContent,
        n_in: usize,
        n_out: usize,
        mouse: Point,
    ) -> SuggestionDelta {
        let next = suggest(content, self.radius, n_in, n_out, mouse);
        self.replace(next)
    }

    /// End the gesture without dropping: everything is unhighlighted.
    pub fn cancel(&self) -> SuggestionDelta {
        self.replace(Suggestion::default())
    }

    fn replace(&self, next: Suggestion) -> SuggestionDelta {
        let delta = {
            let mut current = self.current.lock().unwrap();
            let old: HashSet<&String> = current.all().collect();
            let new: HashSet<&String> = next.all().collect();
            let delta = SuggestionDelta {
                highlighted: next.all().filter(|id| !old.contains(id)).cloned().collect(),
                unhighlighted: current.all().filter(|id| !new.contains(id)).cloned().collect(),
            };
            *current = next;
            delta
        };
        if !delta.is_empty() {
            log::debug!(
                "[Placement] +{} -{} suggestion(s)",
                delta.highlighted.len(),
                delta.unhighlighted.len()
            );
            self.events.emit(&delta);
        }
        delta
    }

    /// Drop `dragged` at `position`, wiring it to the current suggestion in
    /// one transaction. Ends the gesture.
    pub fn apply_drop(
        &self,
        mediator: &GraphActionMediator,
        dragged: Operator,
        position: Point,
    ) -> Result<bool> {
        let suggestion = self.current();
        self.cancel();
        let links = drop_links(&dragged, &suggestion, &mediator.get_workflow_content());
        log::info!(
            "[Placement] dropping {} with {} suggested link(s)",
            dragged.operator_id,
            links.len()
        );
        mediator.add_operators_and_links(vec![(dragged, position)], links)
    }
}
