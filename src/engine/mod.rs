//! Room Engine (§4.2): owns the set of live rooms, serializes access to each
//! room's state, and drives the persistence and lifecycle timers.

pub mod doc;

use crate::config::{FLUSH_DEBOUNCE_MS, IDLE_GRACE_MS, MAINT_TICK_MS};
use crate::errors::EngineError;
use crate::store::SnapshotStore;
use chrono::{DateTime, Utc};
use doc::DocState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::Duration;

/// Outbound channel capacity per session. A full channel means a slow
/// receiver; per spec.md §5 the Engine does not queue beyond the socket's
/// own buffer, so a full channel simply drops the message (implementation
/// choice recorded in DESIGN.md).
const SESSION_OUTBOX_CAPACITY: usize = 256;

struct Session {
    tx: mpsc::Sender<Vec<u8>>,
}

struct RoomInner {
    doc: DocState,
    sessions: HashMap<String, Session>,
    dirty: bool,
    closed: bool,
    flush_generation: u64,
    idle_generation: u64,
    last_activity: DateTime<Utc>,
}

/// Read-only observability snapshot, per the Engine's `stats()` contract.
#[derive(Debug, Clone)]
pub struct RoomStats {
    pub active_sessions: usize,
    pub last_activity: DateTime<Utc>,
    pub dirty: bool,
}

pub struct Room {
    pub id: String,
    store: Arc<SnapshotStore>,
    inner: AsyncMutex<RoomInner>,
}

impl Room {
    fn new(id: String, seed: Option<&[u8]>, store: Arc<SnapshotStore>) -> Arc<Self> {
        println!("room {id} created");
        Arc::new(Self {
            id,
            store,
            inner: AsyncMutex::new(RoomInner {
                doc: DocState::new(seed),
                sessions: HashMap::new(),
                dirty: false,
                closed: false,
                flush_generation: 0,
                idle_generation: 0,
                last_activity: Utc::now(),
            }),
        })
    }

    /// Installs a new Session, cancelling any pending idle-close, and
    /// replays the Room's current document state into the new Session's
    /// outbox before handing back the receiver — without this, a Session
    /// that joins after prior changes were applied would only observe
    /// changes made after it connects (spec.md §8 invariant 8, scenario S2).
    /// Fails with `RoomClosed` if the Room closed between `obtain_room` and
    /// this call — the Gateway maps that to WebSocket close code 1011.
    pub async fn attach_session(
        self: &Arc<Self>,
        session_id: String,
    ) -> Result<mpsc::Receiver<Vec<u8>>, EngineError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(EngineError::RoomClosed);
        }
        // Bump the generation so any pending idle-close timer observes a
        // mismatch and becomes a no-op: this is the "cancel" half of the
        // at-most-one-pending-timer invariant (spec.md §3/§9).
        inner.idle_generation += 1;
        let (tx, rx) = mpsc::channel(SESSION_OUTBOX_CAPACITY);
        // Seed the new session with the document as it stands right now,
        // read atomically with registration so no concurrent change can
        // slip in between the snapshot and the insert.
        let snapshot = inner.doc.snapshot();
        let _ = tx.try_send(snapshot);
        inner.sessions.insert(session_id, Session { tx });
        inner.last_activity = Utc::now();
        Ok(rx)
    }

    /// Apply an inbound change from `session_id` and rebroadcast it to every
    /// other attached Session. A malformed change is a per-Session
    /// `ProtocolError`: the Room and its other Sessions are unaffected.
    pub async fn handle_message(
        self: &Arc<Self>,
        session_id: &str,
        msg: Vec<u8>,
    ) -> Result<(), EngineError> {
        let (flush_generation, targets) = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(EngineError::RoomClosed);
            }
            inner.doc.apply_change(&msg)?;
            inner.dirty = true;
            inner.last_activity = Utc::now();
            inner.flush_generation += 1;
            let targets: Vec<mpsc::Sender<Vec<u8>>> = inner
                .sessions
                .iter()
                .filter(|(id, _)| id.as_str() != session_id)
                .map(|(_, s)| s.tx.clone())
                .collect();
            (inner.flush_generation, targets)
        };

        for tx in targets {
            // Non-blocking: a full outbox means a slow receiving Session, and
            // the Engine does not queue beyond the socket's own buffer.
            let _ = tx.try_send(msg.clone());
        }

        self.schedule_flush(flush_generation);
        Ok(())
    }

    /// Removes a Session. If it was the last one, arms the idle-grace timer.
    pub async fn remove_session(self: &Arc<Self>, session_id: &str) {
        let (arm, generation) = {
            let mut inner = self.inner.lock().await;
            inner.sessions.remove(session_id);
            if inner.sessions.is_empty() && !inner.closed {
                inner.idle_generation += 1;
                (true, inner.idle_generation)
            } else {
                (false, 0)
            }
        };
        if arm {
            let room = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(IDLE_GRACE_MS)).await;
                room.fire_idle_close(generation).await;
            });
        }
    }

    async fn fire_idle_close(self: Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.closed || inner.idle_generation != generation || !inner.sessions.is_empty() {
            return;
        }
        inner.closed = true;
        println!("room {} closed (idle grace elapsed)", self.id);
        if inner.dirty {
            let snapshot = inner.doc.snapshot();
            drop(inner);
            if let Err(e) = self.store.write_room(&self.id, &snapshot) {
                eprintln!("snapshot flush failed for room {}: {e}", self.id);
            }
        }
    }

    /// Renders the Room terminal immediately, with a best-effort terminal
    /// flush if dirty. Used on process shutdown (spec.md Design Notes:
    /// "fire-and-forget → supervised") and is idempotent.
    pub async fn close(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;
        println!("room {} closed", self.id);
        if inner.dirty {
            let snapshot = inner.doc.snapshot();
            drop(inner);
            if let Err(e) = self.store.write_room(&self.id, &snapshot) {
                eprintln!("terminal flush failed for room {}: {e}", self.id);
            }
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    pub async fn stats(&self) -> RoomStats {
        let inner = self.inner.lock().await;
        RoomStats {
            active_sessions: inner.sessions.len(),
            last_activity: inner.last_activity,
            dirty: inner.dirty,
        }
    }

    fn schedule_flush(self: &Arc<Self>, generation: u64) {
        let room = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(FLUSH_DEBOUNCE_MS)).await;
            room.fire_flush(generation).await;
        });
    }

    async fn fire_flush(self: Arc<Self>, generation: u64) {
        let should_run = {
            let inner = self.inner.lock().await;
            !inner.closed && inner.flush_generation == generation && inner.dirty
        };
        if should_run {
            self.flush().await;
        }
    }

    /// Snapshot the current state and write it through the Snapshot Store.
    /// Clears `dirty` only if no further change arrived during the write
    /// (spec.md §4.2 Debounced persistence).
    async fn flush(self: &Arc<Self>) {
        let (snapshot, captured_generation) = {
            let inner = self.inner.lock().await;
            if !inner.dirty {
                return;
            }
            (inner.doc.snapshot(), inner.flush_generation)
        };

        match self.store.write_room(&self.id, &snapshot) {
            Ok(()) => {
                let mut inner = self.inner.lock().await;
                if inner.flush_generation == captured_generation {
                    inner.dirty = false;
                }
            }
            Err(e) => {
                // Not rescheduled immediately; the next change or maintenance
                // tick retries.
                eprintln!("snapshot flush failed for room {}: {e}", self.id);
            }
        }
    }

    /// Periodic backup flush and self-deregistration, one task per Room.
    fn spawn_maintenance(self: Arc<Self>, engine: Weak<Engine>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(MAINT_TICK_MS));
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let (dirty, closed) = {
                    let inner = self.inner.lock().await;
                    (inner.dirty, inner.closed)
                };
                if dirty {
                    self.flush().await;
                }
                if closed {
                    if let Some(engine) = engine.upgrade() {
                        engine.deregister(&self.id);
                    }
                    break;
                }
            }
        });
    }
}

/// Registry of live Rooms, keyed by room id. A separate concurrency domain
/// from any single Room's serialization (spec.md §4.2).
pub struct Engine {
    registry: StdMutex<HashMap<String, Arc<Room>>>,
    store: Arc<SnapshotStore>,
}

impl Engine {
    pub fn new(store: Arc<SnapshotStore>) -> Arc<Self> {
        Arc::new(Self {
            registry: StdMutex::new(HashMap::new()),
            store,
        })
    }

    /// Returns a live Room for `id`, loading its snapshot on first touch.
    /// Concurrent calls for the same id produce exactly one Room: the
    /// second caller observes the first's registration via the re-check
    /// under lock.
    pub fn obtain_room(self: &Arc<Self>, id: &str) -> Arc<Room> {
        if let Some(room) = self.registry.lock().unwrap().get(id) {
            return room.clone();
        }

        // Snapshot-read failure at load time is "no prior state": the Room
        // is created empty (spec.md §4.2 Failure semantics).
        let seed = self.store.read_room(id).ok();
        let room = Room::new(id.to_string(), seed.as_deref(), self.store.clone());

        let mut registry = self.registry.lock().unwrap();
        if let Some(existing) = registry.get(id) {
            return existing.clone();
        }
        registry.insert(id.to_string(), room.clone());
        room.clone().spawn_maintenance(Arc::downgrade(self));
        room
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Room>> {
        self.registry.lock().unwrap().get(id).cloned()
    }

    pub fn deregister(&self, id: &str) {
        self.registry.lock().unwrap().remove(id);
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.registry.lock().unwrap().keys().cloned().collect()
    }

    /// Used by the Retention Sweeper: a room snapshot may be evicted if no
    /// live Room is registered for it, or the registered Room has no
    /// attached Sessions (spec.md §4.6).
    pub async fn is_room_evictable(&self, id: &str) -> bool {
        match self.lookup(id) {
            None => true,
            Some(room) => room.is_closed().await || room.stats().await.active_sessions == 0,
        }
    }

    /// Sum of active Sessions across every registered Room, for the
    /// `/api/health` and `/api/stats` observability endpoints.
    pub async fn total_active_sessions(&self) -> usize {
        let rooms: Vec<Arc<Room>> = self.registry.lock().unwrap().values().cloned().collect();
        let mut total = 0;
        for room in rooms {
            total += room.stats().await.active_sessions;
        }
        total
    }

    /// Closes every live Room with a best-effort terminal flush. Called on
    /// process shutdown.
    pub async fn shutdown(&self) {
        let rooms: Vec<Arc<Room>> = self.registry.lock().unwrap().values().cloned().collect();
        for room in rooms {
            room.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FLUSH_DEBOUNCE_MS, IDLE_GRACE_MS, MAINT_TICK_MS};

    fn engine() -> (Arc<Engine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(
            dir.path().join("rooms"),
            dir.path().join("assets"),
        ));
        (Engine::new(store), dir)
    }

    #[tokio::test]
    async fn obtain_room_is_idempotent_for_the_same_id() {
        let (engine, _dir) = engine();
        let a = engine.obtain_room("alpha");
        let b = engine.obtain_room("alpha");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn change_then_flush_persists_a_snapshot() {
        let (engine, dir) = engine();
        let room = engine.obtain_room("alpha");
        let mut rx = room.attach_session("s1".into()).await.unwrap();
        let msg = DocState::new(None).snapshot(); // a well-formed empty update
        room.handle_message("s1", msg).await.unwrap();
        tokio::time::sleep(Duration::from_millis(FLUSH_DEBOUNCE_MS + 200)).await;
        assert!(dir.path().join("rooms").join("alpha").exists());
        drop(rx);
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let (engine, _dir) = engine();
        let room = engine.obtain_room("beta");
        let mut rx_a = room.attach_session("a".into()).await.unwrap();
        let mut rx_b = room.attach_session("b".into()).await.unwrap();
        // Each attach replays the current (empty) document state first.
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();
        let msg = DocState::new(None).snapshot();
        room.handle_message("a", msg.clone()).await.unwrap();
        assert_eq!(rx_b.try_recv().unwrap(), msg);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_session_is_seeded_with_existing_document_state() {
        let (engine, _dir) = engine();
        let room = engine.obtain_room("eta");
        let mut rx_a = room.attach_session("a".into()).await.unwrap();
        rx_a.try_recv().unwrap(); // initial (empty) replay

        let change = DocState::new(None).snapshot();
        room.handle_message("a", change).await.unwrap();

        // A session attaching after the change was applied (spec.md §8
        // invariant 8 / scenario S2) must see the document's current state
        // without waiting for a further peer message.
        let mut rx_c = room.attach_session("c".into()).await.unwrap();
        let replayed = rx_c.try_recv().unwrap();
        assert_eq!(replayed, room.inner.lock().await.doc.snapshot());
    }

    #[tokio::test]
    async fn malformed_message_is_contained_to_the_sender() {
        let (engine, _dir) = engine();
        let room = engine.obtain_room("gamma");
        let _rx = room.attach_session("a".into()).await.unwrap();
        let err = room.handle_message("a", b"not a real update".to_vec()).await;
        assert!(err.is_err());
        assert!(!room.is_closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_grace_closes_room_after_last_session_departs() {
        let (engine, _dir) = engine();
        let room = engine.obtain_room("delta");
        let rx = room.attach_session("a".into()).await.unwrap();
        room.remove_session("a").await;
        tokio::time::advance(Duration::from_millis(IDLE_GRACE_MS + 50)).await;
        tokio::task::yield_now().await;
        assert!(room.is_closed().await);
        drop(rx);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_within_grace_keeps_room_open() {
        let (engine, _dir) = engine();
        let room = engine.obtain_room("epsilon");
        let rx = room.attach_session("a".into()).await.unwrap();
        room.remove_session("a").await;
        tokio::time::advance(Duration::from_millis(IDLE_GRACE_MS / 2)).await;
        tokio::task::yield_now().await;
        let _rx2 = room.attach_session("b".into()).await.unwrap();
        tokio::time::advance(Duration::from_millis(IDLE_GRACE_MS)).await;
        tokio::task::yield_now().await;
        assert!(!room.is_closed().await);
        drop(rx);
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_tick_deregisters_closed_rooms() {
        let (engine, _dir) = engine();
        let room = engine.obtain_room("zeta");
        room.close().await;
        tokio::time::advance(Duration::from_millis(MAINT_TICK_MS * 2)).await;
        tokio::task::yield_now().await;
        assert!(engine.lookup("zeta").is_none());
    }
}
