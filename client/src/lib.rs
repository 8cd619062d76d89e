//! Client for the crevice pairing relay.
//!
//! Connects to a relay node, joins or creates a room and runs
//! the key exchange with the peer over the relayed channel; all
//! application messages are encrypted end to end so the relay
//! only ever sees opaque bytes.
#![deny(missing_docs)]

mod error;
mod event_loop;
mod native;
mod session;

pub use error::Error;
pub use event_loop::{Event, EventLoop, EventStream};
pub use native::NativeClient;
pub use session::ClientSession;

use crevice_protocol::RoomId;
use std::sync::Arc;
use tokio::sync::RwLock;

pub(crate) type Session = Arc<RwLock<ClientSession>>;

/// Options used to create a new websocket client.
#[derive(Debug, Default, Clone)]
pub struct ClientOptions {
    /// Room to join; a new room is created when absent.
    pub room_id: Option<RoomId>,
}

impl ClientOptions {
    /// Compute the websocket endpoint URL for these options.
    pub fn url(&self, server: &str) -> String {
        match &self.room_id {
            Some(room_id) => {
                format!("{}?roomId={}", server, room_id)
            }
            None => server.to_owned(),
        }
    }
}

/// Result type for the relay client.
pub type Result<T> = std::result::Result<T, Error>;
