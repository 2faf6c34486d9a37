//! Replicated workflow graph: the CRDT store, its per-client undo history,
//! presence, and the room protocol that keeps replicas converged.

mod awareness;
mod history;
mod relay;
mod room;
mod store;
mod sync;
mod types;

pub use awareness::{
    AwarenessCallback, AwarenessChange, AwarenessChannel, AwarenessState,
    DEFAULT_AWARENESS_TIMEOUT_MS,
};
pub use history::{DEFAULT_UNDO_CAPACITY, HistoryManager};
pub use relay::{MemberId, MemoryRelay, RelayMember};
pub use room::{RoomId, RoomSession, SyncTransport};
pub use store::{GraphStore, GraphTxn, UpdateCallback, content_changes};
pub use sync::{Frame, SyncMessage};
pub use types::{ChangeRecord, Collection, StoreChange, UpdateOrigin};
