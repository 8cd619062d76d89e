//! Constants used by the relay library.

/// System signal sent to the first participant when the
/// second participant has joined the room.
pub const SYSTEM_READY: &str = "ready";

/// System signal sent to the remaining participant when the
/// other participant has disconnected.
pub const SYSTEM_END: &str = "end";

/// Number of characters in a generated room identifier.
pub const ROOM_ID_LENGTH: usize = 6;
