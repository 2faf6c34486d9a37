//! Ephemeral per-client presence: cursor, active flag, element being edited.
//!
//! Awareness state is never written to the [`GraphStore`](super::GraphStore)
//! and never enters undo history. Each client owns its own entry and bumps a
//! clock whenever it changes it; receivers keep the entry with the highest
//! clock. An entry with no state means the client left.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::Result;
use crate::events::{EventChannel, SubscriptionId};
use crate::model::Point;

/// Default time after which a silent remote client is dropped.
pub const DEFAULT_AWARENESS_TIMEOUT_MS: i64 = 30_000;

/// Presence of one connected client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AwarenessState {
    pub user_name: String,
    /// Canvas position of the pointer, if it is over the canvas
    #[serde(default)]
    pub cursor: Option<Point>,
    #[serde(default)]
    pub active: bool,
    /// Id of the element whose properties the user is editing
    #[serde(default)]
    pub editing: Option<String>,
}

impl AwarenessState {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            cursor: None,
            active: true,
            editing: None,
        }
    }
}

/// One entry of an awareness payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AwarenessEntry {
    client_id: u64,
    clock: u64,
    state: Option<AwarenessState>,
}

#[derive(Debug, Clone)]
struct ClientEntry {
    clock: u64,
    state: Option<AwarenessState>,
    last_seen_ms: i64,
}

/// Client ids touched by one awareness update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AwarenessChange {
    pub added: Vec<u64>,
    pub updated: Vec<u64>,
    pub removed: Vec<u64>,
    /// Whether the change came from this client
    pub local: bool,
}

impl AwarenessChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Callback receiving encoded awareness payloads destined for the room.
pub type AwarenessCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Awareness channel for one replica.
pub struct AwarenessChannel {
    client_id: u64,
    timeout_ms: i64,
    clients: RwLock<HashMap<u64, ClientEntry>>,
    events: EventChannel<AwarenessChange>,
    outbound: RwLock<Option<AwarenessCallback>>,
}

impl AwarenessChannel {
    pub fn new(client_id: u64, timeout_ms: i64) -> Self {
        Self {
            client_id,
            timeout_ms,
            clients: RwLock::new(HashMap::new()),
            events: EventChannel::new(),
            outbound: RwLock::new(None),
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    // ==================== Local state ====================

    /// Replace this client's state and broadcast it.
    pub fn set_local_state(&self, state: AwarenessState) {
        self.write_local(Some(state));
    }

    /// Remove this client's state (e.g. when leaving the room).
    pub fn clear_local_state(&self) {
        self.write_local(None);
    }

    /// Modify this client's state in place. Does nothing when no local state is set.
    pub fn update_local<F>(&self, f: F)
    where
        F: FnOnce(&mut AwarenessState),
    {
        let Some(mut state) = self.local_state() else {
            return;
        };
        f(&mut state);
        self.write_local(Some(state));
    }

    pub fn set_cursor(&self, cursor: Option<Point>) {
        self.update_local(|state| state.cursor = cursor);
    }

    pub fn set_active(&self, active: bool) {
        self.update_local(|state| state.active = active);
    }

    pub fn set_editing(&self, element_id: Option<String>) {
        self.update_local(|state| state.editing = element_id);
    }

    fn write_local(&self, state: Option<AwarenessState>) {
        let change = {
            let mut clients = self.clients.write().unwrap();
            let previous = clients.get(&self.client_id).cloned();
            if previous.is_none() && state.is_none() {
                return;
            }
            let clock = previous.as_ref().map(|entry| entry.clock + 1).unwrap_or(0);
            let mut change = AwarenessChange {
                local: true,
                ..Default::default()
            };
            match (&previous, &state) {
                (Some(prev), None) if prev.state.is_some() => change.removed.push(self.client_id),
                (Some(prev), Some(_)) if prev.state.is_some() => {
                    change.updated.push(self.client_id)
                }
                (_, Some(_)) => change.added.push(self.client_id),
                _ => {}
            }
            clients.insert(
                self.client_id,
                ClientEntry {
                    clock,
                    state,
                    last_seen_ms: now_ms(),
                },
            );
            change
        };

        if let Ok(payload) = self.encode_clients(&[self.client_id]) {
            let callback = self.outbound.read().unwrap().clone();
            if let Some(callback) = callback {
                callback(&payload);
            }
        }
        if !change.is_empty() {
            self.events.emit(&change);
        }
    }

    pub fn local_state(&self) -> Option<AwarenessState> {
        self.clients
            .read()
            .unwrap()
            .get(&self.client_id)
            .and_then(|entry| entry.state.clone())
    }

    // ==================== Encoding ====================

    /// Encode the given clients' entries as an awareness payload.
    pub fn encode_clients(&self, client_ids: &[u64]) -> Result<Vec<u8>> {
        let clients = self.clients.read().unwrap();
        let entries: Vec<AwarenessEntry> = client_ids
            .iter()
            .filter_map(|id| {
                clients.get(id).map(|entry| AwarenessEntry {
                    client_id: *id,
                    clock: entry.clock,
                    state: entry.state.clone(),
                })
            })
            .collect();
        Ok(serde_json::to_vec(&entries)?)
    }

    /// Encode this client's own entry.
    pub fn encode_local(&self) -> Result<Vec<u8>> {
        self.encode_clients(&[self.client_id])
    }

    // ==================== Remote updates ====================

    /// Apply a payload received from the room.
    pub fn apply_update(&self, payload: &[u8]) -> Result<AwarenessChange> {
        self.apply_update_at(payload, now_ms())
    }

    /// Apply a payload, treating `now` as the receive time.
    pub fn apply_update_at(&self, payload: &[u8], now: i64) -> Result<AwarenessChange> {
        let entries: Vec<AwarenessEntry> = serde_json::from_slice(payload)?;
        let mut change = AwarenessChange::default();
        {
            let mut clients = self.clients.write().unwrap();
            for entry in entries {
                // Our own entry is authoritative locally
                if entry.client_id == self.client_id {
                    continue;
                }
                let previous = clients.get(&entry.client_id);
                if previous.is_some_and(|prev| prev.clock >= entry.clock) {
                    continue;
                }
                let had_state = previous.is_some_and(|prev| prev.state.is_some());
                match (&entry.state, had_state) {
                    (None, true) => change.removed.push(entry.client_id),
                    (Some(_), true) => change.updated.push(entry.client_id),
                    (Some(_), false) => change.added.push(entry.client_id),
                    (None, false) => {}
                }
                clients.insert(
                    entry.client_id,
                    ClientEntry {
                        clock: entry.clock,
                        state: entry.state,
                        last_seen_ms: now,
                    },
                );
            }
        }

        if !change.is_empty() {
            log::debug!(
                "[Awareness] +{} ~{} -{} client(s)",
                change.added.len(),
                change.updated.len(),
                change.removed.len()
            );
            self.events.emit(&change);
        }
        Ok(change)
    }

    /// Drop remote clients not heard from within the timeout.
    pub fn remove_stale(&self) -> Vec<u64> {
        self.remove_stale_at(now_ms())
    }

    /// Drop remote clients not heard from since `now - timeout`.
    pub fn remove_stale_at(&self, now: i64) -> Vec<u64> {
        let removed: Vec<u64> = {
            let mut clients = self.clients.write().unwrap();
            let stale: Vec<u64> = clients
                .iter()
                .filter(|(id, entry)| {
                    **id != self.client_id
                        && entry.state.is_some()
                        && now - entry.last_seen_ms > self.timeout_ms
                })
                .map(|(id, _)| *id)
                .collect();
            for id in &stale {
                if let Some(entry) = clients.get_mut(id) {
                    entry.state = None;
                }
            }
            stale
        };
        if !removed.is_empty() {
            log::info!("[Awareness] dropped {} stale client(s)", removed.len());
            self.events.emit(&AwarenessChange {
                removed: removed.clone(),
                ..Default::default()
            });
        }
        removed
    }

    // ==================== Queries ====================

    /// States of every present client, this one included, keyed by client id.
    pub fn states(&self) -> BTreeMap<u64, AwarenessState> {
        self.clients
            .read()
            .unwrap()
            .iter()
            .filter_map(|(id, entry)| entry.state.clone().map(|state| (*id, state)))
            .collect()
    }

    /// States of present remote clients.
    pub fn remote_states(&self) -> BTreeMap<u64, AwarenessState> {
        let mut states = self.states();
        states.remove(&self.client_id);
        states
    }

    // ==================== Wiring ====================

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&AwarenessChange) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Set the callback receiving outbound payloads.
    pub fn set_outbound(&self, callback: AwarenessCallback) {
        *self.outbound.write().unwrap() = Some(callback);
    }

    pub fn clear_outbound(&self) {
        *self.outbound.write().unwrap() = None;
    }
}

impl std::fmt::Debug for AwarenessChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwarenessChannel")
            .field("client_id", &self.client_id)
            .field("present", &self.states().len())
            .finish()
    }
}
