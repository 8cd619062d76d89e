use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::StatusCode,
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use serde::Deserialize;

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::{
    registry::JoinOutcome,
    server::{Service, State},
    Error, Result,
};
use crevice_protocol::RoomId;

pub type Connection = Arc<RwLock<WebSocketConnection>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketQuery {
    pub room_id: Option<String>,
}

/// State for the websocket connection for a single participant.
pub struct WebSocketConnection {
    /// Unique identifier for the socket connection.
    pub(crate) id: Uuid,
    /// Room this connection belongs to for its lifetime.
    pub(crate) room_id: RoomId,
    /// Outgoing channel for frames sent to the client.
    pub(crate) outgoing: mpsc::Sender<String>,
}

impl WebSocketConnection {
    /// Send a frame to the client at this socket.
    pub async fn send(&mut self, frame: String) -> Result<()> {
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Upgrade to a websocket connection.
///
/// Admission happens before the upgrade completes so a capacity
/// rejection closes the socket without creating any state.
pub async fn upgrade(
    Extension(state): Extension<State>,
    Extension(service): Extension<Service>,
    Query(query): Query<WebSocketQuery>,
    ws: WebSocketUpgrade,
) -> std::result::Result<Response, StatusCode> {
    tracing::debug!("websocket upgrade request");

    let room_id = query
        .room_id
        .map(RoomId::from)
        .unwrap_or_else(RoomId::generate);
    let node_id = {
        let reader = state.read().await;
        reader.node_id
    };

    // Fail closed: admission requires the registry's verdict
    let outcome =
        match service.registry().join(&room_id, node_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "registry unavailable, refusing admission");
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
        };

    if let JoinOutcome::Rejected = outcome {
        tracing::debug!(room = %room_id, "room is full");
        return Err(StatusCode::CONFLICT);
    }

    let id = Uuid::new_v4();
    let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(32);
    let conn = Arc::new(RwLock::new(WebSocketConnection {
        id,
        room_id,
        outgoing: outgoing_tx,
    }));

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, service, conn, outcome, outgoing_rx)
    }))
}

async fn disconnect(service: Service, conn: Connection) {
    if let Err(e) = service.disconnected(conn).await {
        tracing::warn!(error = %e, "disconnect cleanup failed");
    }
}

async fn handle_socket(
    socket: WebSocket,
    service: Service,
    conn: Connection,
    outcome: JoinOutcome,
    outgoing: mpsc::Receiver<String>,
) {
    let (writer, reader) = socket.split();

    if let Err(e) =
        service.connected(Arc::clone(&conn), outcome).await
    {
        tracing::error!(error = %e, "connection setup failed");
    }

    tokio::spawn(write(
        writer,
        Arc::clone(&service),
        Arc::clone(&conn),
        outgoing,
    ));
    tokio::spawn(read(reader, service, conn));
}

async fn read(
    mut receiver: SplitStream<WebSocket>,
    service: Service,
    conn: Connection,
) -> Result<()> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(msg) => match msg {
                Message::Text(frame) => {
                    // Payload bytes are never interpreted here
                    if let Err(e) = service
                        .handle_message(Arc::clone(&conn), frame)
                        .await
                    {
                        tracing::warn!(error = %e, "relay failed");
                    }
                }
                Message::Binary(_) => {}
                Message::Ping(_) => {}
                Message::Pong(_) => {}
                Message::Close(_) => {
                    disconnect(service, conn).await;
                    return Ok(());
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "ws_server::read_error");
                disconnect(service, conn).await;
                return Err(e.into());
            }
        }
    }
    // Stream ended without a close frame
    disconnect(service, conn).await;
    Ok(())
}

async fn write(
    mut sender: SplitSink<WebSocket, Message>,
    service: Service,
    conn: Connection,
    mut outgoing: mpsc::Receiver<String>,
) -> Result<()> {
    while let Some(frame) = outgoing.recv().await {
        if sender.send(Message::Text(frame)).await.is_err() {
            disconnect(service, conn).await;
            return Ok(());
        }
    }
    Ok(())
}
