use anyhow::{bail, Result};
use axum_server::Handle;
use futures::StreamExt;
use std::{net::SocketAddr, sync::Arc};

use crevice_client::{
    ClientOptions, Event, EventStream, NativeClient,
};
use crevice_protocol::RoomId;
use crevice_relay_server::{
    MemoryBus, MemoryRegistry, RelayServer, ServerConfig,
};

/// Start a relay node on an ephemeral port and return its
/// websocket endpoint.
pub async fn spawn_server(
    registry: Arc<MemoryRegistry>,
    bus: Arc<MemoryBus>,
) -> Result<String> {
    let server =
        RelayServer::new(ServerConfig::default(), registry, bus);
    let handle = Handle::new();
    let listening = handle.clone();
    tokio::spawn(async move {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        server.start(addr, listening).await
    });
    let Some(addr) = handle.listening().await else {
        bail!("server failed to bind");
    };
    Ok(format!("ws://{}", addr))
}

/// Connect a client that creates a new room; returns the client,
/// its running event stream and the announced room id.
pub async fn connect_first(
    server: &str,
) -> Result<(NativeClient, EventStream, RoomId)> {
    let (client, event_loop) =
        NativeClient::new(server, ClientOptions::default())
            .await?;
    let mut events = event_loop.run();
    match events.next().await {
        Some(Ok(Event::RoomCreated { room_id })) => {
            Ok((client, events, room_id))
        }
        event => {
            bail!("expected room announcement, got {:?}", event)
        }
    }
}

/// Drive the room creator: send a ping once the channel opens,
/// expect the pong back, then wait for the peer to hang up.
pub async fn initiator_client(
    client: NativeClient,
    mut events: EventStream,
) -> Result<()> {
    let mut got_pong = false;
    while let Some(event) = events.next().await {
        match event? {
            Event::ChannelOpen { .. } => {
                client.send("ping").await?;
            }
            Event::MessageReceived { message } => {
                if message == "pong" {
                    got_pong = true;
                }
            }
            Event::Close => break,
            _ => {}
        }
    }
    if !got_pong {
        bail!("initiator never received the pong");
    }
    Ok(())
}

/// Drive the joining peer: answer the ping with a pong and
/// disconnect.
pub async fn participant_client(
    client: NativeClient,
    mut events: EventStream,
) -> Result<()> {
    while let Some(event) = events.next().await {
        match event? {
            Event::MessageReceived { message } => {
                if message == "ping" {
                    client.send("pong").await?;
                    client.close()?;
                }
            }
            Event::Close => break,
            _ => {}
        }
    }
    Ok(())
}
