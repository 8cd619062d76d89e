//! Wire protocol types for the crevice pairing relay.
//!
//! A room pairs exactly two anonymous participants; the relay
//! forwards their frames without inspecting anything except the
//! `system` messages it originates itself.
#![deny(missing_docs)]

mod constants;
mod error;
mod protocol;

pub use constants::*;
pub use error::Error;
pub use protocol::*;

pub use uuid;

/// Result type for the relay protocol.
pub type Result<T> = std::result::Result<T, Error>;
