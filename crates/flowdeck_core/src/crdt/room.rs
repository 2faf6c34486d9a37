//! Room sessions: one replica's connection to a shared-editing room.
//!
//! A [`RoomSession`] sits between a [`GraphStore`] (plus its
//! [`AwarenessChannel`]) and an opaque [`SyncTransport`]. It frames outgoing
//! local updates, queues them while the transport is down, runs the
//! SyncStep1/SyncStep2 handshake on (re)connect, and applies incoming frames
//! with a remote origin so they never bounce back out.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::awareness::AwarenessChannel;
use super::store::GraphStore;
use super::sync::{Frame, SyncMessage};
use super::types::UpdateOrigin;
use crate::error::Result;

/// Identifier of a shared-editing room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    /// Room for a saved workflow, or a fresh ephemeral room for an unsaved one.
    pub fn for_workflow(workflow_id: Option<&str>) -> Self {
        match workflow_id {
            Some(id) => RoomId(format!("workflow-{}", id)),
            None => RoomId(format!("ephemeral-{}", uuid::Uuid::new_v4())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ephemeral(&self) -> bool {
        self.0.starts_with("ephemeral-")
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque duplex byte pipe to the room's coordination endpoint.
///
/// The endpoint delivers every frame to all room members, the sender included.
pub trait SyncTransport: Send + Sync {
    fn send(&self, frame: Vec<u8>) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// One replica's membership in a room.
pub struct RoomSession {
    room: RoomId,
    store: Arc<GraphStore>,
    awareness: Arc<AwarenessChannel>,
    transport: Arc<dyn SyncTransport>,
    /// Local updates produced while the transport was down
    pending: Mutex<Vec<Vec<u8>>>,
}

impl RoomSession {
    /// Create a session and route the store's and awareness channel's
    /// outbound traffic through it.
    pub fn new(
        room: RoomId,
        store: Arc<GraphStore>,
        awareness: Arc<AwarenessChannel>,
        transport: Arc<dyn SyncTransport>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            room,
            store,
            awareness,
            transport,
            pending: Mutex::new(Vec::new()),
        });

        let weak: Weak<RoomSession> = Arc::downgrade(&session);
        session
            .store
            .set_update_callback(Arc::new(move |update, origin| {
                if let Some(session) = weak.upgrade() {
                    session.send_update(update, origin);
                }
            }));

        let weak: Weak<RoomSession> = Arc::downgrade(&session);
        session.awareness.set_outbound(Arc::new(move |payload| {
            if let Some(session) = weak.upgrade() {
                session.send_awareness(payload);
            }
        }));

        session
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn awareness(&self) -> &Arc<AwarenessChannel> {
        &self.awareness
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Number of local updates waiting for the connection to come back.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn send_frame(&self, frame: Vec<u8>) -> bool {
        if !self.transport.is_connected() {
            return false;
        }
        match self.transport.send(frame) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Y-sync] {}: send failed: {}", self.room, e);
                false
            }
        }
    }

    fn send_update(&self, update: &[u8], origin: UpdateOrigin) {
        let frame = SyncMessage::Update(update.to_vec()).encode();
        if !self.send_frame(frame) {
            log::debug!(
                "[Y-sync] {}: queued {} update ({} bytes) while offline",
                self.room,
                origin,
                update.len()
            );
            self.pending.lock().unwrap().push(update.to_vec());
        }
    }

    fn send_awareness(&self, payload: &[u8]) {
        // Presence is ephemeral; nothing is queued while offline
        self.send_frame(Frame::encode_awareness(payload));
    }

    /// Start (or restart) the handshake and flush queued local updates.
    pub fn reconnect(&self) {
        if !self.transport.is_connected() {
            log::debug!("[Y-sync] {}: reconnect skipped, transport is down", self.room);
            return;
        }
        log::info!("[Y-sync] {}: connected, starting handshake", self.room);
        self.send_frame(SyncMessage::SyncStep1(self.store.encode_state_vector()).encode());

        let queued: Vec<Vec<u8>> = std::mem::take(&mut *self.pending.lock().unwrap());
        if !queued.is_empty() {
            let messages: Vec<SyncMessage> = queued.into_iter().map(SyncMessage::Update).collect();
            log::info!(
                "[Y-sync] {}: flushing {} queued update(s)",
                self.room,
                messages.len()
            );
            self.send_frame(SyncMessage::encode_all(&messages));
        }

        if self.awareness.local_state().is_some() {
            match self.awareness.encode_local() {
                Ok(payload) => self.send_awareness(&payload),
                Err(e) => log::warn!("[Awareness] failed to encode local state: {}", e),
            }
        }
    }

    /// Handle one frame delivered by the transport.
    pub fn receive(&self, frame: &[u8]) -> Result<()> {
        let Some(frame) = Frame::decode(frame)? else {
            return Ok(());
        };

        let messages = match frame {
            Frame::Awareness(payload) => {
                self.awareness.apply_update(&payload)?;
                return Ok(());
            }
            Frame::Sync(messages) => messages,
        };

        // A lone SyncStep1 opens a handshake and gets our own SyncStep1 back.
        // A SyncStep1 that arrives with a SyncStep2 is itself a reply.
        let is_reply = messages
            .iter()
            .any(|m| matches!(m, SyncMessage::SyncStep2(_)));
        let mut response = Vec::new();

        for message in messages {
            match message {
                SyncMessage::SyncStep1(remote_sv) => {
                    if self.store.is_in_sync_with(&remote_sv)? {
                        continue;
                    }
                    response.push(SyncMessage::SyncStep2(self.store.encode_diff(&remote_sv)?));
                    if !is_reply {
                        response.push(SyncMessage::SyncStep1(self.store.encode_state_vector()));
                    }
                }
                SyncMessage::SyncStep2(update) => {
                    if !update.is_empty() {
                        self.store.apply_update(&update, UpdateOrigin::Sync)?;
                    }
                }
                SyncMessage::Update(update) => {
                    if !update.is_empty() {
                        self.store.apply_update(&update, UpdateOrigin::Remote)?;
                    }
                }
            }
        }

        if !response.is_empty() {
            self.send_frame(SyncMessage::encode_all(&response));
        }
        Ok(())
    }

    /// Detach the store and awareness channel from this session.
    pub fn leave(&self) {
        self.awareness.clear_local_state();
        self.store.clear_update_callback();
        self.awareness.clear_outbound();
        log::info!("[Y-sync] {}: left room", self.room);
    }
}

impl fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomSession")
            .field("room", &self.room)
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowdeckError;
    use crate::model::Point;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct CapturingTransport {
        connected: AtomicBool,
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl SyncTransport for CapturingTransport {
        fn send(&self, frame: Vec<u8>) -> Result<()> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(FlowdeckError::Transport("offline".to_string()));
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    fn session(connected: bool) -> (Arc<RoomSession>, Arc<CapturingTransport>) {
        let transport = Arc::new(CapturingTransport::default());
        transport.connected.store(connected, Ordering::SeqCst);
        let store = Arc::new(GraphStore::new());
        let awareness = Arc::new(AwarenessChannel::new(store.client_id(), 30_000));
        let session = RoomSession::new(
            RoomId::for_workflow(Some("42")),
            store,
            awareness,
            transport.clone(),
        );
        (session, transport)
    }

    fn local_move(session: &RoomSession) {
        session
            .store()
            .transact(UpdateOrigin::Local, |txn| {
                txn.put_position("op", Point::new(1.0, 1.0))
            })
            .unwrap();
    }

    #[test]
    fn test_room_ids() {
        assert_eq!(RoomId::for_workflow(Some("42")).as_str(), "workflow-42");
        let ephemeral = RoomId::for_workflow(None);
        assert!(ephemeral.is_ephemeral());
        assert_ne!(ephemeral, RoomId::for_workflow(None));
    }

    #[test]
    fn test_local_update_is_framed_and_sent() {
        let (session, transport) = session(true);
        local_move(&session);
        let frames = transport.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(matches!(
            SyncMessage::decode_all(&frames[0]).unwrap()[..],
            [SyncMessage::Update(_)]
        ));
    }

    #[test]
    fn test_offline_updates_are_queued_and_flushed() {
        let (session, transport) = session(false);
        local_move(&session);
        assert_eq!(session.pending_count(), 1);

        transport.connected.store(true, Ordering::SeqCst);
        session.reconnect();
        assert_eq!(session.pending_count(), 0);

        let frames = transport.frames.lock().unwrap();
        assert!(matches!(
            SyncMessage::decode_all(&frames[0]).unwrap()[..],
            [SyncMessage::SyncStep1(_)]
        ));
        assert!(matches!(
            SyncMessage::decode_all(&frames[1]).unwrap()[..],
            [SyncMessage::Update(_)]
        ));
    }

    #[test]
    fn test_step1_gets_step2_and_step1_back() {
        let (session, transport) = session(true);
        local_move(&session);
        transport.frames.lock().unwrap().clear();

        let stranger = GraphStore::new();
        session
            .receive(&SyncMessage::SyncStep1(stranger.encode_state_vector()).encode())
            .unwrap();

        let frames = transport.frames.lock().unwrap();
        let reply = SyncMessage::decode_all(&frames[0]).unwrap();
        assert!(matches!(
            reply[..],
            [SyncMessage::SyncStep2(_), SyncMessage::SyncStep1(_)]
        ));
    }

    #[test]
    fn test_own_step1_is_not_answered() {
        let (session, transport) = session(true);
        let own = SyncMessage::SyncStep1(session.store().encode_state_vector()).encode();
        session.receive(&own).unwrap();
        assert!(transport.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remote_update_is_not_echoed() {
        let (session, transport) = session(true);
        let peer = GraphStore::new();
        peer.transact(UpdateOrigin::Local, |txn| {
            txn.put_position("remote", Point::new(5.0, 5.0))
        })
        .unwrap();

        session
            .receive(&SyncMessage::Update(peer.encode_state_as_update()).encode())
            .unwrap();
        assert_eq!(session.store().get_position("remote"), Some(Point::new(5.0, 5.0)));
        assert_eq!(session.store().outbound_count(), 0);
        assert!(transport.frames.lock().unwrap().is_empty());
    }
}
