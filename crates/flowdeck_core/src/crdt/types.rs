//! Core types for the replicated graph store.
//!
//! This module defines the update origins and the change records the store
//! emits after every committed transaction.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Origin of a change, carried from the point a transaction is created
/// through every event derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum UpdateOrigin {
    /// Change originated from a local user action
    Local,

    /// Change received from a remote peer
    Remote,

    /// Change from the initial sync handshake
    Sync,

    /// Replay of an undo step
    Undo,

    /// Replay of a redo step
    Redo,

    /// Content loaded into a detached store (e.g. a historical version)
    Reload,
}

impl UpdateOrigin {
    /// Whether changes with this origin are broadcast to the room.
    ///
    /// Undo and redo replays are new transactions as far as peers are
    /// concerned; remote, sync and reload changes are never sent back out.
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            UpdateOrigin::Local | UpdateOrigin::Undo | UpdateOrigin::Redo
        )
    }

    /// Whether the change arrived from another replica.
    pub fn is_remote(&self) -> bool {
        matches!(self, UpdateOrigin::Remote | UpdateOrigin::Sync)
    }

    /// Whether the change replays recorded history on this replica.
    pub fn is_replay(&self) -> bool {
        matches!(self, UpdateOrigin::Undo | UpdateOrigin::Redo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOrigin::Local => "local",
            UpdateOrigin::Remote => "remote",
            UpdateOrigin::Sync => "sync",
            UpdateOrigin::Undo => "undo",
            UpdateOrigin::Redo => "redo",
            UpdateOrigin::Reload => "reload",
        }
    }
}

impl std::fmt::Display for UpdateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transactions carry their origin into yrs, where the undo manager filters
/// on it.
impl From<UpdateOrigin> for yrs::Origin {
    fn from(origin: UpdateOrigin) -> Self {
        yrs::Origin::from(origin.as_str())
    }
}

impl std::str::FromStr for UpdateOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(UpdateOrigin::Local),
            "remote" => Ok(UpdateOrigin::Remote),
            "sync" => Ok(UpdateOrigin::Sync),
            "undo" => Ok(UpdateOrigin::Undo),
            "redo" => Ok(UpdateOrigin::Redo),
            "reload" => Ok(UpdateOrigin::Reload),
            _ => Err(format!("Unknown update origin: {}", s)),
        }
    }
}

/// The four top-level replicated collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Operators,
    Links,
    CommentBoxes,
    Positions,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Operators,
        Collection::Links,
        Collection::CommentBoxes,
        Collection::Positions,
    ];

    /// Name of the Y.Map backing this collection.
    pub fn map_name(&self) -> &'static str {
        match self {
            Collection::Operators => "operators",
            Collection::Links => "links",
            Collection::CommentBoxes => "commentBoxes",
            Collection::Positions => "positions",
        }
    }
}

/// A single key-level change inside a committed transaction.
///
/// Values are the JSON encodings stored in the replicated map. `before` is
/// `None` for an insertion, `after` is `None` for a removal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub collection: Collection,
    pub key: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl ChangeRecord {
    pub fn is_insert(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    pub fn is_remove(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }

    /// Decode the previous value.
    pub fn before_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.before
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }

    /// Decode the new value.
    pub fn after_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.after
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

/// Everything one committed transaction changed, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub origin: UpdateOrigin,
    pub changes: Vec<ChangeRecord>,
}

impl StoreChange {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes restricted to one collection.
    pub fn in_collection(&self, collection: Collection) -> impl Iterator<Item = &ChangeRecord> {
        self.changes
            .iter()
            .filter(move |change| change.collection == collection)
    }
}
