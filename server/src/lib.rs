//! Websocket relay server that pairs two anonymous clients into
//! an ephemeral room and forwards their frames without ever
//! seeing plaintext or key material.
//!
//! Nodes share no memory; room capacity and participant location
//! are arbitrated by a [RoomRegistry] and frames between nodes
//! travel over a [RelayBus].

#![deny(missing_docs)]

mod bus;
mod config;
mod error;
mod registry;
mod server;
mod service;
mod websocket;

pub use bus::{MemoryBus, RelayBus};
pub use config::{CorsConfig, RoomConfig, ServerConfig, TlsConfig};
pub use error::Error;
pub use registry::{JoinOutcome, MemoryRegistry, RoomRegistry};
pub use server::RelayServer;

pub use axum;

/// Result type for the relay service.
pub type Result<T> = std::result::Result<T, Error>;
