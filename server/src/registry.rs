//! Shared presence directory arbitrating room capacity across
//! the fleet.
use async_trait::async_trait;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crevice_protocol::{NodeId, RoomId};

use crate::Result;

/// Outcome of a room admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The room now has its first participant.
    First,
    /// The room now has its second participant.
    Second,
    /// The room already has two participants; nothing was
    /// changed.
    Rejected,
}

/// The sole arbiter of room capacity and participant location.
///
/// A backing store implementation must make [join](RoomRegistry::join)
/// a single indivisible read-check-write; two nodes racing to
/// admit a third participant must never both succeed.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Attempt to admit a participant hosted by `node_id`.
    ///
    /// Atomically reads the current participant count; if the
    /// room is full returns [JoinOutcome::Rejected] without any
    /// mutation, otherwise records the participant and refreshes
    /// the entry's time-to-live.
    async fn join(
        &self,
        room_id: &RoomId,
        node_id: NodeId,
    ) -> Result<JoinOutcome>;

    /// Release a participant hosted by `node_id`.
    ///
    /// Deletes the entry when the room becomes empty; returns
    /// the number of participants remaining anywhere.
    async fn leave(
        &self,
        room_id: &RoomId,
        node_id: NodeId,
    ) -> Result<usize>;

    /// Point-in-time set of nodes hosting a participant of the
    /// room. May be briefly stale; a missing destination only
    /// causes a dropped message.
    async fn members(&self, room_id: &RoomId)
        -> Result<Vec<NodeId>>;

    /// Re-assert membership, extending the entry's time-to-live.
    async fn refresh(
        &self,
        room_id: &RoomId,
        node_id: NodeId,
    ) -> Result<()>;
}

/// Participants hosted per node with an expiry deadline.
struct RegistryEntry {
    hosts: HashMap<NodeId, usize>,
    deadline: Instant,
}

impl RegistryEntry {
    fn total(&self) -> usize {
        self.hosts.values().sum()
    }
}

/// In-process registry implementation.
///
/// Backs a single-process deployment and the multi-node
/// simulation tests; a fleet deployment implements
/// [RoomRegistry] against an external store with the same
/// atomicity guarantee.
pub struct MemoryRegistry {
    ttl: Duration,
    rooms: Mutex<HashMap<RoomId, RegistryEntry>>,
}

impl MemoryRegistry {
    /// Create a registry whose entries expire after `ttl`
    /// without a refresh.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Treat an expired entry as absent.
    fn purge(
        rooms: &mut HashMap<RoomId, RegistryEntry>,
        room_id: &RoomId,
    ) {
        if let Some(entry) = rooms.get(room_id) {
            if entry.deadline <= Instant::now() {
                rooms.remove(room_id);
                tracing::debug!(room = %room_id, "registry entry expired");
            }
        }
    }
}

#[async_trait]
impl RoomRegistry for MemoryRegistry {
    async fn join(
        &self,
        room_id: &RoomId,
        node_id: NodeId,
    ) -> Result<JoinOutcome> {
        let mut rooms = self.rooms.lock().await;
        Self::purge(&mut rooms, room_id);

        let deadline = Instant::now() + self.ttl;
        let entry = rooms
            .entry(room_id.clone())
            .or_insert_with(|| RegistryEntry {
                hosts: HashMap::new(),
                deadline,
            });

        let outcome = match entry.total() {
            0 => JoinOutcome::First,
            1 => JoinOutcome::Second,
            _ => return Ok(JoinOutcome::Rejected),
        };

        *entry.hosts.entry(node_id).or_insert(0) += 1;
        entry.deadline = deadline;
        Ok(outcome)
    }

    async fn leave(
        &self,
        room_id: &RoomId,
        node_id: NodeId,
    ) -> Result<usize> {
        let mut rooms = self.rooms.lock().await;
        Self::purge(&mut rooms, room_id);

        let Some(entry) = rooms.get_mut(room_id) else {
            return Ok(0);
        };

        if let Some(count) = entry.hosts.get_mut(&node_id) {
            *count -= 1;
            if *count == 0 {
                entry.hosts.remove(&node_id);
            }
        }

        let remaining = entry.total();
        if remaining == 0 {
            rooms.remove(room_id);
        }
        Ok(remaining)
    }

    async fn members(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<NodeId>> {
        let mut rooms = self.rooms.lock().await;
        Self::purge(&mut rooms, room_id);
        Ok(rooms
            .get(room_id)
            .map(|entry| entry.hosts.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn refresh(
        &self,
        room_id: &RoomId,
        node_id: NodeId,
    ) -> Result<()> {
        let mut rooms = self.rooms.lock().await;
        Self::purge(&mut rooms, room_id);
        if let Some(entry) = rooms.get_mut(room_id) {
            if entry.hosts.contains_key(&node_id) {
                entry.deadline = Instant::now() + self.ttl;
            }
        }
        Ok(())
    }
}
