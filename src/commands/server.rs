//! Start the websocket relay server.
use anyhow::Result;
use axum_server::Handle;
use crevice_relay_server::{
    MemoryBus, MemoryRegistry, RelayServer, ServerConfig,
};
use std::{
    net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc,
    time::Duration,
};

/// Run a relay node.
pub async fn run(
    room_ttl: Option<u64>,
    refresh_interval: Option<u64>,
    bind: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => ServerConfig::load(&path).await?,
        None => ServerConfig::default(),
    };

    if let Some(room_ttl) = room_ttl {
        config.room.ttl = room_ttl;
    }

    if let Some(refresh_interval) = refresh_interval {
        config.room.refresh_interval = refresh_interval;
    }

    config.validate()?;

    // Single process deployment; a fleet wires registry and bus
    // implementations backed by an external store behind the
    // same traits
    let registry = Arc::new(MemoryRegistry::new(
        Duration::from_secs(config.room.ttl),
    ));
    let bus = Arc::new(MemoryBus::new());

    let handle = Handle::new();
    let addr = SocketAddr::from_str(&bind)?;
    let server = RelayServer::new(config, registry, bus);
    server.start(addr, handle).await?;
    Ok(())
}
