use std::sync::Arc;
use uuid::Uuid;

use crevice_protocol::{BusMessage, ClientMessage, RoomId};

use crate::{
    bus::RelayBus,
    registry::{JoinOutcome, RoomRegistry},
    server::{LocalParticipant, State},
    websocket::Connection,
    Result,
};

/// Relay semantics for a single node: admission follow-up,
/// payload forwarding and teardown.
pub struct RelayService {
    state: State,
    registry: Arc<dyn RoomRegistry>,
    bus: Arc<dyn RelayBus>,
}

impl RelayService {
    pub(crate) fn new(
        state: State,
        registry: Arc<dyn RoomRegistry>,
        bus: Arc<dyn RelayBus>,
    ) -> Self {
        Self {
            state,
            registry,
            bus,
        }
    }

    pub(crate) fn registry(&self) -> &Arc<dyn RoomRegistry> {
        &self.registry
    }

    /// Register local membership for an admitted connection and
    /// emit the admission signal.
    pub(crate) async fn connected(
        &self,
        conn: Connection,
        outcome: JoinOutcome,
    ) -> Result<()> {
        let (id, room_id) = {
            let reader = conn.read().await;
            (reader.id, reader.room_id.clone())
        };

        {
            let mut writer = self.state.write().await;
            writer
                .rooms
                .entry(room_id.clone())
                .or_default()
                .push(LocalParticipant {
                    id,
                    conn: Arc::clone(&conn),
                });
        }

        tracing::debug!(room = %room_id, "client connected");

        match outcome {
            JoinOutcome::First => {
                // Announce the room id so a generated id can be
                // learned by the caller
                let frame = serde_json::to_string(
                    &ClientMessage::room(&room_id),
                )?;
                let mut writer = conn.write().await;
                writer.send(frame).await?;
            }
            JoinOutcome::Second => {
                let frame =
                    serde_json::to_string(&ClientMessage::ready())?;
                self.forward(&room_id, Some(id), frame).await?;
            }
            // Full rooms are refused before the upgrade completes
            JoinOutcome::Rejected => unreachable!(),
        }
        Ok(())
    }

    /// Relay an opaque frame to the other participant of the
    /// sender's room.
    pub(crate) async fn handle_message(
        &self,
        conn: Connection,
        frame: String,
    ) -> Result<()> {
        let (id, room_id) = {
            let reader = conn.read().await;
            (reader.id, reader.room_id.clone())
        };
        tracing::trace!(
            room = %room_id,
            len = frame.len(),
            "relay");
        self.forward(&room_id, Some(id), frame).await
    }

    /// Fan an inbound bus payload out to this node's local
    /// participants of the room.
    pub(crate) async fn handle_bus_message(
        &self,
        message: BusMessage,
    ) -> Result<()> {
        let conns: Vec<Connection> = {
            let reader = self.state.read().await;
            reader
                .rooms
                .get(&message.room_id)
                .map(|participants| {
                    participants
                        .iter()
                        .map(|p| Arc::clone(&p.conn))
                        .collect()
                })
                .unwrap_or_default()
        };

        for conn in conns {
            let mut writer = conn.write().await;
            writer.send(message.payload.clone()).await?;
        }
        Ok(())
    }

    /// Release local membership and tell the registry; signal
    /// the remaining participant when the room survives.
    pub(crate) async fn disconnected(
        &self,
        conn: Connection,
    ) -> Result<()> {
        let (id, room_id) = {
            let reader = conn.read().await;
            (reader.id, reader.room_id.clone())
        };

        let node_id = {
            let mut writer = self.state.write().await;
            let node_id = writer.node_id;
            let Some(participants) = writer.rooms.get_mut(&room_id)
            else {
                return Ok(());
            };
            let before = participants.len();
            participants.retain(|p| p.id != id);
            if participants.len() == before {
                // Already removed by the other socket task
                return Ok(());
            }
            if participants.is_empty() {
                writer.rooms.remove(&room_id);
            }
            node_id
        };

        tracing::debug!(room = %room_id, "client disconnected");

        let remaining =
            self.registry.leave(&room_id, node_id).await?;
        if remaining == 0 {
            tracing::debug!(room = %room_id, "room destroyed");
        } else {
            let frame =
                serde_json::to_string(&ClientMessage::end())?;
            self.forward(&room_id, None, frame).await?;
        }
        Ok(())
    }

    /// Deliver a frame to a participant of the room other than
    /// `exclude`: directly when one is hosted here, otherwise
    /// published to the other hosting node's queue.
    ///
    /// With no destination the frame is dropped; there is no
    /// buffering.
    async fn forward(
        &self,
        room_id: &RoomId,
        exclude: Option<Uuid>,
        frame: String,
    ) -> Result<()> {
        let (node_id, peer) = {
            let reader = self.state.read().await;
            let peer =
                reader.rooms.get(room_id).and_then(|participants| {
                    participants
                        .iter()
                        .find(|p| Some(p.id) != exclude)
                        .map(|p| Arc::clone(&p.conn))
                });
            (reader.node_id, peer)
        };

        if let Some(peer) = peer {
            let mut writer = peer.write().await;
            writer.send(frame).await?;
            return Ok(());
        }

        let members = self.registry.members(room_id).await?;
        if let Some(target) =
            members.into_iter().find(|node| *node != node_id)
        {
            self.bus
                .publish(
                    target,
                    BusMessage {
                        room_id: room_id.clone(),
                        payload: frame,
                    },
                )
                .await?;
        } else {
            tracing::debug!(
                room = %room_id,
                "no recipient, message dropped");
        }
        Ok(())
    }
}
