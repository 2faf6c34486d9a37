//! Replicated workflow graph document.
//!
//! This module provides [`GraphStore`], which wraps a yrs [`Doc`] holding the
//! workflow graph as four top-level replicated maps:
//!
//! ```text
//! Y.Doc
//! ├── Y.Map "operators"     operator id    → Operator (JSON)
//! ├── Y.Map "links"         link id        → Link (JSON)
//! ├── Y.Map "commentBoxes"  comment box id → CommentBox (JSON)
//! └── Y.Map "positions"     element id     → Point (JSON)
//! ```
//!
//! Positions live in their own map so that a concurrent move and a
//! concurrent property edit of the same operator touch different keys and
//! both survive the merge. Each key merges last-writer-wins.
//!
//! All mutation goes through [`GraphStore::transact`], which groups writes
//! into one yrs transaction, records a [`ChangeRecord`] per touched key, and
//! after commit:
//! 1. hands the incremental update to the outbound callback (local, undo
//!    and redo origins only), and
//! 2. emits a [`StoreChange`] tagged with the origin to every observer.
//!
//! Remote updates enter through [`GraphStore::apply_update`]; they are never
//! sent back out.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, Map, MapRef, ReadTxn, StateVector, Transact, TransactionMut, Update};

use super::types::{ChangeRecord, Collection, StoreChange, UpdateOrigin};
use crate::error::{FlowdeckError, Result};
use crate::events::{EventChannel, SubscriptionId};
use crate::model::{CommentBox, Link, Operator, Point, WorkflowContent};

/// Callback receiving encoded incremental updates destined for the room.
pub type UpdateCallback = Arc<dyn Fn(&[u8], UpdateOrigin) + Send + Sync>;

/// Cached references to the four top-level maps.
struct GraphMaps {
    operators: MapRef,
    links: MapRef,
    comment_boxes: MapRef,
    positions: MapRef,
}

impl GraphMaps {
    fn new(doc: &Doc) -> Self {
        Self {
            operators: doc.get_or_insert_map(Collection::Operators.map_name()),
            links: doc.get_or_insert_map(Collection::Links.map_name()),
            comment_boxes: doc.get_or_insert_map(Collection::CommentBoxes.map_name()),
            positions: doc.get_or_insert_map(Collection::Positions.map_name()),
        }
    }

    fn get(&self, collection: Collection) -> &MapRef {
        match collection {
            Collection::Operators => &self.operators,
            Collection::Links => &self.links,
            Collection::CommentBoxes => &self.comment_boxes,
            Collection::Positions => &self.positions,
        }
    }
}

/// A CRDT document holding one workflow graph.
pub struct GraphStore {
    doc: Doc,
    maps: GraphMaps,
    observers: EventChannel<StoreChange>,
    update_callback: RwLock<Option<UpdateCallback>>,
    outbound_count: AtomicU64,
}

impl GraphStore {
    /// Create a new empty graph store.
    pub fn new() -> Self {
        let doc = Doc::new();
        let maps = GraphMaps::new(&doc);
        Self {
            doc,
            maps,
            observers: EventChannel::new(),
            update_callback: RwLock::new(None),
            outbound_count: AtomicU64::new(0),
        }
    }

    /// Create a detached store pre-loaded with `content`.
    ///
    /// The load is tagged [`UpdateOrigin::Reload`], so it is neither sent to
    /// a room nor recorded as undoable history.
    pub fn from_content(content: &WorkflowContent) -> Result<Self> {
        let store = Self::new();
        store.transact(UpdateOrigin::Reload, |txn| txn.replace_content(content))?;
        Ok(store)
    }

    /// Get the underlying yrs document.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// The yrs client id of this replica.
    pub fn client_id(&self) -> u64 {
        self.doc.client_id()
    }

    // ==================== Transactions ====================

    /// Run `f` as one atomic transaction tagged with `origin`.
    ///
    /// Validation should happen before the first write: yrs cannot roll back,
    /// so if `f` fails after writing, the writes are still committed and
    /// announced, and the error is returned afterwards.
    pub fn transact<F, R>(&self, origin: UpdateOrigin, f: F) -> Result<R>
    where
        F: FnOnce(&mut GraphTxn<'_>) -> Result<R>,
    {
        self.transact_with_changes(origin, f).map(|(result, _)| result)
    }

    /// Like [`transact`](Self::transact), also returning the committed changes.
    pub fn transact_with_changes<F, R>(&self, origin: UpdateOrigin, f: F) -> Result<(R, StoreChange)>
    where
        F: FnOnce(&mut GraphTxn<'_>) -> Result<R>,
    {
        // Get state vector before the change
        let sv_before = {
            let txn = self.doc.transact();
            txn.state_vector()
        };

        let (result, changes) = {
            let mut graph_txn = GraphTxn {
                txn: self.doc.transact_mut_with(origin),
                maps: &self.maps,
                changes: Vec::new(),
            };
            let result = f(&mut graph_txn);
            // Dropping the transaction commits it
            (result, graph_txn.into_changes())
        };

        let change = StoreChange { origin, changes };
        if !change.is_empty() {
            if origin.is_outbound() {
                self.publish_update(&sv_before, origin);
            }
            log::debug!(
                "[GraphStore] committed {} change(s), origin {}",
                change.changes.len(),
                origin
            );
            self.observers.emit(&change);
        }

        result.map(|value| (value, change))
    }

    /// Encode everything committed since `sv_before` and hand it to the
    /// outbound callback.
    fn publish_update(&self, sv_before: &StateVector, origin: UpdateOrigin) {
        let update = {
            let txn = self.doc.transact();
            txn.encode_state_as_update_v1(sv_before)
        };
        if update.is_empty() {
            return;
        }
        self.outbound_count.fetch_add(1, Ordering::SeqCst);
        if let Some(callback) = self.update_callback.read().unwrap().clone() {
            callback(&update, origin);
        }
    }

    /// Number of outbound updates produced by this replica so far.
    pub fn outbound_count(&self) -> u64 {
        self.outbound_count.load(Ordering::SeqCst)
    }

    /// Set the callback receiving outbound updates (typically a room session).
    pub fn set_update_callback(&self, callback: UpdateCallback) {
        *self.update_callback.write().unwrap() = Some(callback);
    }

    /// Remove the outbound update callback.
    pub fn clear_update_callback(&self) {
        *self.update_callback.write().unwrap() = None;
    }

    // ==================== Observers ====================

    /// Subscribe to committed changes of any origin.
    pub fn observe_changes<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Remove a change subscription.
    pub fn unobserve(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ==================== Sync Operations ====================

    /// Encode the current state vector for the sync handshake.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state as an update.
    pub fn encode_state_as_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encode only the updates a remote peer with the given state vector is missing.
    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| FlowdeckError::Crdt(format!("Failed to decode state vector: {}", e)))?;

        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Whether a remote state vector covers exactly what this replica has.
    pub fn is_in_sync_with(&self, remote_state_vector: &[u8]) -> Result<bool> {
        let remote = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| FlowdeckError::Crdt(format!("Failed to decode state vector: {}", e)))?;
        let txn = self.doc.transact();
        Ok(txn.state_vector() == remote)
    }

    /// Apply an update received from another replica.
    ///
    /// The resulting key-level changes are computed by comparing the maps
    /// before and after the merge, and emitted with `origin`. Applying an
    /// update this replica already has yields an empty change.
    pub fn apply_update(&self, update: &[u8], origin: UpdateOrigin) -> Result<StoreChange> {
        let decoded = Update::decode_v1(update)
            .map_err(|e| FlowdeckError::Crdt(format!("Failed to decode update: {}", e)))?;

        let before = self.raw_entries();
        {
            let mut txn = self.doc.transact_mut_with(origin);
            txn.apply_update(decoded)
                .map_err(|e| FlowdeckError::Crdt(format!("Failed to apply update: {}", e)))?;
        }
        let after = self.raw_entries();

        let change = StoreChange {
            origin,
            changes: diff_entries(&before, &after),
        };
        if !change.is_empty() {
            log::debug!(
                "[GraphStore] merged {} change(s) from {} update",
                change.changes.len(),
                origin
            );
            self.observers.emit(&change);
        }
        Ok(change)
    }

    /// Run an undo or redo replay and announce what it changed.
    ///
    /// `replay` commits its own transactions on the document (the yrs undo
    /// manager does). The changes are computed by comparing the maps before
    /// and after, broadcast like a local edit, and emitted with `origin`.
    pub fn replay<F>(&self, origin: UpdateOrigin, replay: F) -> (bool, StoreChange)
    where
        F: FnOnce() -> bool,
    {
        let sv_before = {
            let txn = self.doc.transact();
            txn.state_vector()
        };
        let before = self.raw_entries();
        let applied = replay();
        let after = self.raw_entries();

        let change = StoreChange {
            origin,
            changes: diff_entries(&before, &after),
        };
        if !change.is_empty() {
            if origin.is_outbound() {
                self.publish_update(&sv_before, origin);
            }
            log::debug!(
                "[GraphStore] {} replayed {} change(s)",
                origin,
                change.changes.len()
            );
            self.observers.emit(&change);
        }
        (applied, change)
    }

    /// The replicated map backing `collection`.
    pub(crate) fn map(&self, collection: Collection) -> &MapRef {
        self.maps.get(collection)
    }

    /// Every key of every collection with its raw JSON value.
    fn raw_entries(&self) -> BTreeMap<(Collection, String), String> {
        let txn = self.doc.transact();
        let mut entries = BTreeMap::new();
        for collection in Collection::ALL {
            for (key, value) in self.maps.get(collection).iter(&txn) {
                entries.insert((collection, key.to_string()), value.to_string(&txn));
            }
        }
        entries
    }

    // ==================== Reads ====================

    fn read_one<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Option<T> {
        let txn = self.doc.transact();
        self.maps.get(collection).get(&txn, key).and_then(|value| {
            let json = value.to_string(&txn);
            serde_json::from_str(&json).ok()
        })
    }

    fn read_all<T: DeserializeOwned>(&self, collection: Collection) -> Vec<(String, T)> {
        let txn = self.doc.transact();
        let mut entries: Vec<(String, T)> = self
            .maps
            .get(collection)
            .iter(&txn)
            .filter_map(|(key, value)| {
                let json = value.to_string(&txn);
                let decoded: T = serde_json::from_str(&json).ok()?;
                Some((key.to_string(), decoded))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn get_operator(&self, operator_id: &str) -> Option<Operator> {
        self.read_one(Collection::Operators, operator_id)
    }

    pub fn has_operator(&self, operator_id: &str) -> bool {
        let txn = self.doc.transact();
        self.maps.operators.contains_key(&txn, operator_id)
    }

    /// All operators, ordered by id.
    pub fn operators(&self) -> Vec<Operator> {
        self.read_all(Collection::Operators)
            .into_iter()
            .map(|(_, op)| op)
            .collect()
    }

    pub fn get_link(&self, link_id: &str) -> Option<Link> {
        self.read_one(Collection::Links, link_id)
    }

    /// All links, ordered by id.
    pub fn links(&self) -> Vec<Link> {
        self.read_all(Collection::Links)
            .into_iter()
            .map(|(_, link)| link)
            .collect()
    }

    pub fn get_comment_box(&self, comment_box_id: &str) -> Option<CommentBox> {
        self.read_one(Collection::CommentBoxes, comment_box_id)
    }

    /// All comment boxes, ordered by id.
    pub fn comment_boxes(&self) -> Vec<CommentBox> {
        self.read_all(Collection::CommentBoxes)
            .into_iter()
            .map(|(_, comment_box)| comment_box)
            .collect()
    }

    pub fn get_position(&self, element_id: &str) -> Option<Point> {
        self.read_one(Collection::Positions, element_id)
    }

    /// All element positions, ordered by element id.
    pub fn positions(&self) -> Vec<(String, Point)> {
        self.read_all(Collection::Positions)
    }

    pub fn operator_count(&self) -> usize {
        let txn = self.doc.transact();
        self.maps.operators.len(&txn) as usize
    }

    pub fn link_count(&self) -> usize {
        let txn = self.doc.transact();
        self.maps.links.len(&txn) as usize
    }

    /// A plain snapshot of the whole graph, ordered by id.
    pub fn snapshot(&self) -> WorkflowContent {
        WorkflowContent {
            operators: self.operators(),
            positions: self.positions().into_iter().collect(),
            links: self.links(),
            comment_boxes: self.comment_boxes(),
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("client_id", &self.client_id())
            .field("operator_count", &self.operator_count())
            .field("link_count", &self.link_count())
            .finish()
    }
}

/// The raw map entries a store holding `content` would have.
fn content_entries(content: &WorkflowContent) -> Result<BTreeMap<(Collection, String), String>> {
    let mut entries = BTreeMap::new();
    for op in &content.operators {
        entries.insert(
            (Collection::Operators, op.operator_id.clone()),
            serde_json::to_string(op)?,
        );
    }
    for link in &content.links {
        entries.insert(
            (Collection::Links, link.link_id.clone()),
            serde_json::to_string(link)?,
        );
    }
    for comment_box in &content.comment_boxes {
        entries.insert(
            (Collection::CommentBoxes, comment_box.comment_box_id.clone()),
            serde_json::to_string(comment_box)?,
        );
    }
    for (element_id, position) in &content.positions {
        entries.insert(
            (Collection::Positions, element_id.clone()),
            serde_json::to_string(position)?,
        );
    }
    Ok(entries)
}

/// Key-level changes that turn `before` into `after`.
pub fn content_changes(before: &WorkflowContent, after: &WorkflowContent) -> Result<Vec<ChangeRecord>> {
    Ok(diff_entries(
        &content_entries(before)?,
        &content_entries(after)?,
    ))
}

/// Key-level difference between two raw map dumps.
fn diff_entries(
    before: &BTreeMap<(Collection, String), String>,
    after: &BTreeMap<(Collection, String), String>,
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    for ((collection, key), old_value) in before {
        match after.get(&(*collection, key.clone())) {
            Some(new_value) if new_value == old_value => {}
            new_value => changes.push(ChangeRecord {
                collection: *collection,
                key: key.clone(),
                before: Some(old_value.clone()),
                after: new_value.cloned(),
            }),
        }
    }
    for ((collection, key), new_value) in after {
        if !before.contains_key(&(*collection, key.clone())) {
            changes.push(ChangeRecord {
                collection: *collection,
                key: key.clone(),
                before: None,
                after: Some(new_value.clone()),
            });
        }
    }
    changes
}

/// A mutable view of the graph inside one [`GraphStore::transact`] call.
///
/// Reads through a `GraphTxn` see the writes already made in the same
/// transaction. Store-level read methods must not be called while a
/// `GraphTxn` is alive.
pub struct GraphTxn<'doc> {
    txn: TransactionMut<'doc>,
    maps: &'doc GraphMaps,
    changes: Vec<ChangeRecord>,
}

impl<'doc> GraphTxn<'doc> {
    /// Raw JSON stored under `key`.
    pub fn get_raw(&self, collection: Collection, key: &str) -> Option<String> {
        self.maps
            .get(collection)
            .get(&self.txn, key)
            .map(|value| value.to_string(&self.txn))
    }

    /// Decoded value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Option<T> {
        self.get_raw(collection, key)
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    pub fn contains(&self, collection: Collection, key: &str) -> bool {
        self.maps.get(collection).contains_key(&self.txn, key)
    }

    /// All decoded values of a collection, ordered by key.
    pub fn values<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        let mut entries: Vec<(String, T)> = self
            .maps
            .get(collection)
            .iter(&self.txn)
            .filter_map(|(key, value)| {
                let json = value.to_string(&self.txn);
                let decoded: T = serde_json::from_str(&json).ok()?;
                Some((key.to_string(), decoded))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, value)| value).collect()
    }

    /// All keys of a collection, ordered.
    pub fn keys(&self, collection: Collection) -> Vec<String> {
        let mut keys: Vec<String> = self
            .maps
            .get(collection)
            .keys(&self.txn)
            .map(String::from)
            .collect();
        keys.sort();
        keys
    }

    /// Store raw JSON under `key`, or remove the key when `value` is `None`.
    pub fn put_raw(&mut self, collection: Collection, key: &str, value: Option<String>) {
        let before = self.get_raw(collection, key);
        if before == value {
            return;
        }
        match &value {
            Some(json) => {
                self.maps
                    .get(collection)
                    .insert(&mut self.txn, key, json.clone());
            }
            None => {
                self.maps.get(collection).remove(&mut self.txn, key);
            }
        }
        self.changes.push(ChangeRecord {
            collection,
            key: key.to_string(),
            before,
            after: value,
        });
    }

    /// Serialize and store a value under `key`.
    pub fn put<T: Serialize>(&mut self, collection: Collection, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.put_raw(collection, key, Some(json));
        Ok(())
    }

    /// Remove `key`, returning its previous raw JSON.
    pub fn remove(&mut self, collection: Collection, key: &str) -> Option<String> {
        let before = self.get_raw(collection, key);
        if before.is_some() {
            self.put_raw(collection, key, None);
        }
        before
    }

    // ==================== Typed helpers ====================

    pub fn operator(&self, operator_id: &str) -> Option<Operator> {
        self.get(Collection::Operators, operator_id)
    }

    pub fn put_operator(&mut self, operator: &Operator) -> Result<()> {
        self.put(Collection::Operators, &operator.operator_id, operator)
    }

    pub fn link(&self, link_id: &str) -> Option<Link> {
        self.get(Collection::Links, link_id)
    }

    pub fn links(&self) -> Vec<Link> {
        self.values(Collection::Links)
    }

    pub fn put_link(&mut self, link: &Link) -> Result<()> {
        self.put(Collection::Links, &link.link_id, link)
    }

    pub fn comment_box(&self, comment_box_id: &str) -> Option<CommentBox> {
        self.get(Collection::CommentBoxes, comment_box_id)
    }

    pub fn put_comment_box(&mut self, comment_box: &CommentBox) -> Result<()> {
        self.put(
            Collection::CommentBoxes,
            &comment_box.comment_box_id,
            comment_box,
        )
    }

    pub fn position(&self, element_id: &str) -> Option<Point> {
        self.get(Collection::Positions, element_id)
    }

    pub fn put_position(&mut self, element_id: &str, position: Point) -> Result<()> {
        self.put(Collection::Positions, element_id, &position)
    }

    /// Make the graph equal to `content`, writing only keys that differ.
    pub fn replace_content(&mut self, content: &WorkflowContent) -> Result<()> {
        let desired = content_entries(content)?;

        for collection in Collection::ALL {
            for key in self.keys(collection) {
                if !desired.contains_key(&(collection, key.clone())) {
                    self.remove(collection, &key);
                }
            }
        }
        for ((collection, key), json) in desired {
            if self.get_raw(collection, &key).as_deref() != Some(json.as_str()) {
                self.put_raw(collection, &key, Some(json));
            }
        }
        Ok(())
    }

    /// Collapse the recorded writes into one record per key, in first-touch
    /// order, dropping keys that ended up unchanged.
    fn into_changes(self) -> Vec<ChangeRecord> {
        let mut order: Vec<(Collection, String)> = Vec::new();
        let mut merged: BTreeMap<(Collection, String), ChangeRecord> = BTreeMap::new();
        for change in self.changes {
            let slot = (change.collection, change.key.clone());
            match merged.get_mut(&slot) {
                Some(existing) => existing.after = change.after,
                None => {
                    order.push(slot.clone());
                    merged.insert(slot, change);
                }
            }
        }
        order
            .into_iter()
            .filter_map(|slot| merged.remove(&slot))
            .filter(|change| change.before != change.after)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogicalPort;
    use std::sync::Mutex;

    fn add_operator(store: &GraphStore, id: &str, x: f64) {
        store
            .transact(UpdateOrigin::Local, |txn| {
                txn.put_operator(&Operator::new(id, "Filter", 1, 1))?;
                txn.put_position(id, Point::new(x, 0.0))
            })
            .unwrap();
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = GraphStore::new();
        assert_eq!(store.operator_count(), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_transact_records_changes() {
        let store = GraphStore::new();
        let ((), change) = store
            .transact_with_changes(UpdateOrigin::Local, |txn| {
                txn.put_operator(&Operator::new("a", "Scan", 0, 1))?;
                txn.put_position("a", Point::new(1.0, 2.0))
            })
            .unwrap();

        assert_eq!(change.origin, UpdateOrigin::Local);
        assert_eq!(change.changes.len(), 2);
        assert!(change.changes.iter().all(|c| c.is_insert()));
        assert_eq!(store.get_position("a"), Some(Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_repeated_writes_collapse_to_one_record() {
        let store = GraphStore::new();
        let ((), change) = store
            .transact_with_changes(UpdateOrigin::Local, |txn| {
                txn.put_position("a", Point::new(1.0, 1.0))?;
                txn.put_position("a", Point::new(2.0, 2.0))?;
                txn.put_position("b", Point::new(0.0, 0.0))?;
                txn.remove(Collection::Positions, "b");
                Ok(())
            })
            .unwrap();

        // "b" was inserted and removed within the transaction
        assert_eq!(change.changes.len(), 1);
        let point: Point = change.changes[0].after_as().unwrap();
        assert_eq!(point, Point::new(2.0, 2.0));
    }

    #[test]
    fn test_outbound_only_for_local_origins() {
        let store = GraphStore::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sent_clone = Arc::clone(&sent);
        store.set_update_callback(Arc::new(move |update, origin| {
            sent_clone.lock().unwrap().push((update.to_vec(), origin));
        }));

        add_operator(&store, "a", 0.0);
        assert_eq!(store.outbound_count(), 1);

        store
            .transact(UpdateOrigin::Reload, |txn| {
                txn.put_position("a", Point::new(9.0, 9.0))
            })
            .unwrap();
        assert_eq!(store.outbound_count(), 1);
        assert_eq!(sent.lock().unwrap()[0].1, UpdateOrigin::Local);
    }

    #[test]
    fn test_rewriting_same_value_is_silent() {
        let store = GraphStore::new();
        add_operator(&store, "a", 0.0);
        let before = store.encode_state_vector();

        let ((), change) = store
            .transact_with_changes(UpdateOrigin::Local, |txn| {
                txn.put_position("a", Point::new(0.0, 0.0))
            })
            .unwrap();

        assert!(change.is_empty());
        assert_eq!(store.outbound_count(), 1);
        assert!(store.is_in_sync_with(&before).unwrap());
    }

    #[test]
    fn test_apply_remote_update_emits_changes() {
        let store1 = GraphStore::new();
        let store2 = GraphStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store2.observe_changes(move |change| seen_clone.lock().unwrap().push(change.clone()));

        add_operator(&store1, "a", 0.0);
        let change = store2
            .apply_update(&store1.encode_state_as_update(), UpdateOrigin::Remote)
            .unwrap();

        assert_eq!(change.changes.len(), 2);
        assert!(store2.has_operator("a"));
        assert_eq!(store2.outbound_count(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Applying the same update again changes nothing
        let again = store2
            .apply_update(&store1.encode_state_as_update(), UpdateOrigin::Remote)
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let store1 = GraphStore::new();
        let store2 = GraphStore::new();
        add_operator(&store1, "shared", 0.0);
        store2
            .apply_update(&store1.encode_state_as_update(), UpdateOrigin::Sync)
            .unwrap();

        // Concurrent move on one side, property edit on the other
        store1
            .transact(UpdateOrigin::Local, |txn| {
                txn.put_position("shared", Point::new(50.0, 50.0))
            })
            .unwrap();
        store2
            .transact(UpdateOrigin::Local, |txn| {
                let mut op = txn.operator("shared").unwrap();
                op.operator_properties
                    .insert("predicate".to_string(), serde_json::json!("x > 1"));
                txn.put_operator(&op)
            })
            .unwrap();

        let sv1 = store1.encode_state_vector();
        let sv2 = store2.encode_state_vector();
        let diff_for_1 = store2.encode_diff(&sv1).unwrap();
        let diff_for_2 = store1.encode_diff(&sv2).unwrap();
        store1.apply_update(&diff_for_1, UpdateOrigin::Remote).unwrap();
        store2.apply_update(&diff_for_2, UpdateOrigin::Remote).unwrap();

        assert_eq!(store1.snapshot(), store2.snapshot());
        assert_eq!(store1.get_position("shared"), Some(Point::new(50.0, 50.0)));
        assert!(
            store1
                .get_operator("shared")
                .unwrap()
                .operator_properties
                .contains_key("predicate")
        );
    }

    #[test]
    fn test_replace_content_writes_only_differences() {
        let mut content = WorkflowContent::default();
        content.operators.push(Operator::new("a", "Scan", 0, 1));
        content.operators.push(Operator::new("b", "Sink", 1, 0));
        content.links.push(Link::new(
            "l",
            LogicalPort::new("a", "output-0"),
            LogicalPort::new("b", "input-0"),
        ));
        content.positions.insert("a".to_string(), Point::new(0.0, 0.0));
        content.positions.insert("b".to_string(), Point::new(100.0, 0.0));

        let store = GraphStore::from_content(&content).unwrap();
        assert_eq!(store.snapshot(), content);

        content.links.clear();
        let ((), change) = store
            .transact_with_changes(UpdateOrigin::Local, |txn| txn.replace_content(&content))
            .unwrap();
        assert_eq!(change.changes.len(), 1);
        assert!(change.changes[0].is_remove());
        assert_eq!(store.link_count(), 0);
    }
}
