//! Per-client undo/redo over the replicated graph.
//!
//! [`HistoryManager`] wraps the yrs [`UndoManager`] of the store's document,
//! scoped to the graph maps and tracking only transactions tagged
//! [`UpdateOrigin::Local`]. Remote, sync and reload transactions never become
//! steps, so each client undoes only its own edits. When another replica has
//! since overwritten a key, yrs keeps the newer remote value.
//!
//! Replays run through [`GraphStore::replay`], which broadcasts them to the
//! room and emits them tagged [`UpdateOrigin::Undo`] or
//! [`UpdateOrigin::Redo`].
//!
//! On top of the yrs stacks this adds a capacity limit, separate
//! `clear_undo`/`clear_redo`, and the workflow modification gate.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use yrs::undo::{Options as UndoOptions, UndoManager};

use super::store::GraphStore;
use super::types::{Collection, StoreChange, UpdateOrigin};
use crate::error::{FlowdeckError, Result};

/// Default maximum number of undo steps kept.
pub const DEFAULT_UNDO_CAPACITY: usize = 100;

/// Which way a step is being replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

/// Clears the replay flag when a replay ends, including on error.
struct ReplayGuard<'a>(&'a AtomicBool);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The yrs undo manager bound to one store.
struct Tracker {
    client_id: u64,
    manager: UndoManager<()>,
    /// Undo items below this index are out of reach
    undo_floor: usize,
    /// Redo items below this index are out of reach
    redo_floor: usize,
}

impl Tracker {
    fn new(store: &GraphStore, scope: &[Collection]) -> Self {
        // Every transaction is its own step
        let options = UndoOptions {
            capture_timeout_millis: 0,
            ..UndoOptions::default()
        };
        let (first, rest) = match scope.split_first() {
            Some((first, rest)) => (*first, rest),
            None => (Collection::Operators, &[][..]),
        };
        let mut manager = UndoManager::with_scope_and_options(store.doc(), store.map(first), options);
        for collection in rest {
            manager.expand_scope(store.map(*collection));
        }
        manager.include_origin(UpdateOrigin::Local);
        Self {
            client_id: store.client_id(),
            manager,
            undo_floor: 0,
            redo_floor: 0,
        }
    }

    fn undo_len(&self) -> usize {
        self.manager.undo_stack().len().saturating_sub(self.undo_floor)
    }

    fn redo_len(&self) -> usize {
        self.manager.redo_stack().len().saturating_sub(self.redo_floor)
    }

    /// Re-align the floors with the yrs stacks after they changed.
    fn settle(&mut self, capacity: usize) {
        let undo = self.manager.undo_stack().len();
        self.undo_floor = self.undo_floor.min(undo).max(undo.saturating_sub(capacity));
        // yrs drops the redo stack on every new local step
        let redo = self.manager.redo_stack().len();
        self.redo_floor = self.redo_floor.min(redo);
    }
}

/// Undo/redo manager scoped to the replicated graph collections.
pub struct HistoryManager {
    tracker: Mutex<Option<Tracker>>,
    capacity: usize,
    scope: Vec<Collection>,
    modification_enabled: AtomicBool,
    replaying: AtomicBool,
}

impl HistoryManager {
    /// Create a manager tracking all four graph collections.
    pub fn new(capacity: usize) -> Self {
        Self::with_scope(capacity, Collection::ALL.to_vec())
    }

    /// Create a manager tracking only the given collections.
    pub fn with_scope(capacity: usize, scope: Vec<Collection>) -> Self {
        let scope = if scope.is_empty() {
            Collection::ALL.to_vec()
        } else {
            scope
        };
        Self {
            tracker: Mutex::new(None),
            capacity: capacity.max(1),
            scope,
            modification_enabled: AtomicBool::new(true),
            replaying: AtomicBool::new(false),
        }
    }

    // ==================== Binding ====================

    /// Start tracking `store`, with empty stacks.
    ///
    /// History recorded against a previously attached store is dropped.
    pub fn attach(&self, store: &GraphStore) {
        *self.tracker.lock().unwrap() = Some(Tracker::new(store, &self.scope));
        log::debug!("[History] tracking store {}", store.client_id());
    }

    fn tracker_for<'a>(&self, slot: &'a mut Option<Tracker>, store: &GraphStore) -> &'a mut Tracker {
        if slot
            .as_ref()
            .is_some_and(|tracker| tracker.client_id != store.client_id())
        {
            *slot = None;
        }
        slot.get_or_insert_with(|| Tracker::new(store, &self.scope))
    }

    // ==================== Recording ====================

    /// Account for a committed store change.
    ///
    /// yrs pushes the step itself; this applies the capacity limit. Only
    /// local changes within scope count. Returns `true` if the change became
    /// a step.
    pub fn record(&self, change: &StoreChange) -> bool {
        if change.origin != UpdateOrigin::Local || self.is_replaying() {
            return false;
        }
        if !change
            .changes
            .iter()
            .any(|c| self.scope.contains(&c.collection))
        {
            return false;
        }

        let mut slot = self.tracker.lock().unwrap();
        let Some(tracker) = slot.as_mut() else {
            return false;
        };
        tracker.settle(self.capacity);
        log::debug!("[History] recorded step, {} undoable", tracker.undo_len());
        true
    }

    // ==================== Undo / Redo ====================

    /// Undo the most recent local step.
    ///
    /// Returns `Ok(false)` without touching anything while modification is
    /// disabled or another replay is in progress, and
    /// [`FlowdeckError::NothingToUndo`] when the stack is empty.
    pub fn undo(&self, store: &GraphStore) -> Result<bool> {
        self.replay(store, Direction::Undo)
    }

    /// Redo the most recently undone step.
    pub fn redo(&self, store: &GraphStore) -> Result<bool> {
        self.replay(store, Direction::Redo)
    }

    fn replay(&self, store: &GraphStore, direction: Direction) -> Result<bool> {
        if !self.is_modification_enabled() {
            log::warn!(
                "[History] {:?} ignored: workflow modification is disabled",
                direction
            );
            return Ok(false);
        }
        if self.replaying.swap(true, Ordering::SeqCst) {
            log::warn!("[History] {:?} ignored: a replay is already running", direction);
            return Ok(false);
        }
        let _guard = ReplayGuard(&self.replaying);

        {
            let mut slot = self.tracker.lock().unwrap();
            let tracker = self.tracker_for(&mut slot, store);
            let available = match direction {
                Direction::Undo => tracker.undo_len(),
                Direction::Redo => tracker.redo_len(),
            };
            if available == 0 {
                return Err(match direction {
                    Direction::Undo => FlowdeckError::NothingToUndo,
                    Direction::Redo => FlowdeckError::NothingToRedo,
                });
            }
        }

        let origin = match direction {
            Direction::Undo => UpdateOrigin::Undo,
            Direction::Redo => UpdateOrigin::Redo,
        };
        // The tracker lock is released before the store announces the
        // replay, so observers may query the history.
        let (applied, change) = store.replay(origin, || {
            let mut slot = self.tracker.lock().unwrap();
            match slot.as_mut() {
                Some(tracker) => match direction {
                    Direction::Undo => tracker.manager.undo_blocking(),
                    Direction::Redo => tracker.manager.redo_blocking(),
                },
                None => false,
            }
        });

        let mut slot = self.tracker.lock().unwrap();
        if let Some(tracker) = slot.as_mut() {
            tracker.settle(self.capacity);
            log::debug!(
                "[History] {:?} applied, {} undoable / {} redoable",
                direction,
                tracker.undo_len(),
                tracker.redo_len()
            );
        }
        if !applied || change.is_empty() {
            log::info!(
                "[History] {:?} changed nothing: collaborators overwrote the step",
                direction
            );
        }
        Ok(applied)
    }

    // ==================== State ====================

    pub fn can_undo(&self) -> bool {
        self.undo_len() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.redo_len() > 0
    }

    pub fn undo_len(&self) -> usize {
        self.tracker
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, Tracker::undo_len)
    }

    pub fn redo_len(&self) -> usize {
        self.tracker
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, Tracker::redo_len)
    }

    /// Drop all undo steps.
    pub fn clear_undo(&self) {
        if let Some(tracker) = self.tracker.lock().unwrap().as_mut() {
            tracker.undo_floor = tracker.manager.undo_stack().len();
        }
    }

    /// Drop all redo steps.
    pub fn clear_redo(&self) {
        if let Some(tracker) = self.tracker.lock().unwrap().as_mut() {
            tracker.redo_floor = tracker.manager.redo_stack().len();
        }
    }

    /// Drop both stacks.
    pub fn clear(&self) {
        if let Some(tracker) = self.tracker.lock().unwrap().as_mut() {
            tracker.manager.clear();
            tracker.undo_floor = 0;
            tracker.redo_floor = 0;
        }
    }

    /// Gate undo/redo on the workflow-modification flag.
    pub fn set_modification_enabled(&self, enabled: bool) {
        self.modification_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_modification_enabled(&self) -> bool {
        self.modification_enabled.load(Ordering::SeqCst)
    }

    /// Whether an undo or redo replay is currently running.
    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("undo_len", &self.undo_len())
            .field("redo_len", &self.redo_len())
            .field("capacity", &self.capacity)
            .field("modification_enabled", &self.is_modification_enabled())
            .finish()
    }
}
