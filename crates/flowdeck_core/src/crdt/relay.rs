//! In-process room relay.
//!
//! [`MemoryRelay`] plays the coordination endpoint: every frame sent by a
//! member is delivered to every connected member of the same room, the sender
//! included. Delivery is synchronous. Frames sent while a delivery is already
//! running (replies to a handshake, say) are queued and drained by the
//! outermost sender, so sessions are never re-entered.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::awareness::AwarenessChannel;
use super::room::{RoomId, RoomSession, SyncTransport};
use super::store::GraphStore;
use crate::error::{FlowdeckError, Result};

/// Identifier of one relay member.
pub type MemberId = u64;

struct Member {
    room: RoomId,
    session: Weak<RoomSession>,
    connected: bool,
}

#[derive(Default)]
struct RelayState {
    members: BTreeMap<MemberId, Member>,
    queue: VecDeque<(MemberId, Vec<u8>)>,
    next_id: MemberId,
    delivered: u64,
}

/// An in-memory hub connecting room sessions.
#[derive(Default)]
pub struct MemoryRelay {
    state: Mutex<RelayState>,
    delivering: AtomicBool,
}

/// A session joined to a [`MemoryRelay`].
#[derive(Debug, Clone)]
pub struct RelayMember {
    pub id: MemberId,
    pub session: Arc<RoomSession>,
}

/// The transport handed to each member's session.
struct RelayPort {
    relay: Weak<MemoryRelay>,
    member: MemberId,
}

impl SyncTransport for RelayPort {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        let relay = self
            .relay
            .upgrade()
            .ok_or_else(|| FlowdeckError::Transport("relay has shut down".to_string()))?;
        relay.publish(self.member, frame)
    }

    fn is_connected(&self) -> bool {
        self.relay
            .upgrade()
            .is_some_and(|relay| relay.is_connected(self.member))
    }
}

impl MemoryRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join `store` to `room` and run the initial handshake.
    pub fn join(
        self: &Arc<Self>,
        room: &RoomId,
        store: Arc<GraphStore>,
        awareness: Arc<AwarenessChannel>,
    ) -> RelayMember {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            state.next_id
        };
        let port = Arc::new(RelayPort {
            relay: Arc::downgrade(self),
            member: id,
        });
        let session = RoomSession::new(room.clone(), store, awareness, port);
        self.state.lock().unwrap().members.insert(
            id,
            Member {
                room: room.clone(),
                session: Arc::downgrade(&session),
                connected: true,
            },
        );
        log::info!("[Y-sync] member {} joined {}", id, room);
        session.reconnect();
        RelayMember { id, session }
    }

    /// Remove a member from its room.
    pub fn leave(&self, member: MemberId) {
        let removed = self.state.lock().unwrap().members.remove(&member);
        if let Some(session) = removed.and_then(|m| m.session.upgrade()) {
            session.leave();
        }
    }

    /// Cut a member off. Its local edits queue up until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, member: MemberId) {
        if let Some(m) = self.state.lock().unwrap().members.get_mut(&member) {
            m.connected = false;
            log::info!("[Y-sync] member {} disconnected", member);
        }
    }

    /// Restore a member's connection and re-run its handshake.
    pub fn reconnect(&self, member: MemberId) {
        let session = {
            let mut state = self.state.lock().unwrap();
            let Some(m) = state.members.get_mut(&member) else {
                return;
            };
            m.connected = true;
            m.session.upgrade()
        };
        if let Some(session) = session {
            session.reconnect();
        }
    }

    pub fn is_connected(&self, member: MemberId) -> bool {
        self.state
            .lock()
            .unwrap()
            .members
            .get(&member)
            .is_some_and(|m| m.connected)
    }

    /// Total number of frame deliveries so far.
    pub fn delivered_count(&self) -> u64 {
        self.state.lock().unwrap().delivered
    }

    fn publish(&self, sender: MemberId, frame: Vec<u8>) -> Result<()> {
        if !self.is_connected(sender) {
            return Err(FlowdeckError::Transport(format!(
                "member {} is not connected",
                sender
            )));
        }
        self.state.lock().unwrap().queue.push_back((sender, frame));
        if self.delivering.swap(true, Ordering::SeqCst) {
            // The outermost publish drains the queue
            return Ok(());
        }
        self.drain();
        self.delivering.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn drain(&self) {
        loop {
            let (recipients, frame) = {
                let mut state = self.state.lock().unwrap();
                let Some((sender, frame)) = state.queue.pop_front() else {
                    return;
                };
                let Some(room) = state.members.get(&sender).map(|m| m.room.clone()) else {
                    continue;
                };
                let recipients: Vec<Arc<RoomSession>> = state
                    .members
                    .values()
                    .filter(|m| m.connected && m.room == room)
                    .filter_map(|m| m.session.upgrade())
                    .collect();
                state.delivered += recipients.len() as u64;
                (recipients, frame)
            };
            for session in recipients {
                if let Err(e) = session.receive(&frame) {
                    log::warn!("[Y-sync] {}: failed to handle frame: {}", session.room(), e);
                }
            }
        }
    }
}

impl std::fmt::Debug for MemoryRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("MemoryRelay")
            .field("members", &state.members.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::awareness::AwarenessState;
    use crate::crdt::types::UpdateOrigin;
    use crate::model::Point;

    fn replica(relay: &Arc<MemoryRelay>, room: &RoomId) -> RelayMember {
        let store = Arc::new(GraphStore::new());
        let awareness = Arc::new(AwarenessChannel::new(store.client_id(), 30_000));
        relay.join(room, store, awareness)
    }

    fn place(member: &RelayMember, id: &str, x: f64) {
        member
            .session
            .store()
            .transact(UpdateOrigin::Local, |txn| txn.put_position(id, Point::new(x, 0.0)))
            .unwrap();
    }

    #[test]
    fn test_updates_reach_other_members() {
        let relay = MemoryRelay::new();
        let room = RoomId::for_workflow(Some("1"));
        let a = replica(&relay, &room);
        let b = replica(&relay, &room);

        place(&a, "op", 10.0);
        assert_eq!(
            b.session.store().get_position("op"),
            Some(Point::new(10.0, 0.0))
        );
        assert_eq!(b.session.store().outbound_count(), 0);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let relay = MemoryRelay::new();
        let a = replica(&relay, &RoomId::for_workflow(Some("1")));
        let b = replica(&relay, &RoomId::for_workflow(Some("2")));
        place(&a, "op", 10.0);
        assert!(b.session.store().get_position("op").is_none());
    }

    #[test]
    fn test_late_joiner_catches_up() {
        let relay = MemoryRelay::new();
        let room = RoomId::for_workflow(Some("1"));
        let a = replica(&relay, &room);
        place(&a, "op", 3.0);

        let b = replica(&relay, &room);
        assert_eq!(b.session.store().snapshot(), a.session.store().snapshot());
    }

    #[test]
    fn test_offline_edits_merge_on_reconnect() {
        let relay = MemoryRelay::new();
        let room = RoomId::for_workflow(Some("1"));
        let a = replica(&relay, &room);
        let b = replica(&relay, &room);

        relay.disconnect(b.id);
        place(&a, "from-a", 1.0);
        place(&b, "from-b", 2.0);
        assert!(b.session.store().get_position("from-a").is_none());
        assert_eq!(b.session.pending_count(), 1);

        relay.reconnect(b.id);
        assert_eq!(a.session.store().snapshot(), b.session.store().snapshot());
        assert!(a.session.store().get_position("from-b").is_some());
    }

    #[test]
    fn test_awareness_travels_through_relay() {
        let relay = MemoryRelay::new();
        let room = RoomId::for_workflow(Some("1"));
        let a = replica(&relay, &room);
        let b = replica(&relay, &room);

        a.session
            .awareness()
            .set_local_state(AwarenessState::new("alice"));
        let remote = b.session.awareness().remote_states();
        assert_eq!(remote.len(), 1);
        assert!(remote.values().any(|s| s.user_name == "alice"));
    }
}
