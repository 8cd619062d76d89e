//! Identifiers and message envelopes exchanged over the relay.
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{
    constants::{ROOM_ID_LENGTH, SYSTEM_END, SYSTEM_READY},
    Result,
};

const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Identifier for a room pairing exactly two participants.
///
/// Either supplied by the first participant or generated by the
/// node that admits it.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Generate a short random room identifier.
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let id = (0..ROOM_ID_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0..ROOM_ID_ALPHABET.len());
                ROOM_ID_ALPHABET[index] as char
            })
            .collect();
        Self(id)
    }

    /// String slice of this room identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a relay node process.
///
/// Unique per process instance; used as the registry membership
/// token and as the bus queue address.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random node identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message envelope exchanged over the relayed channel.
///
/// Only the `system` variant is ever originated (or inspected) by
/// the relay; the other variants travel between the participants
/// as opaque payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Control signal from the relay to a client; either a ready
    /// or end signal or the room identifier announcement.
    System {
        /// The signal payload.
        message: String,
    },
    /// Key exchange payload, opaque to the relay.
    PublicKey {
        /// Base64 encoded compressed elliptic curve point.
        key: String,
    },
    /// Application payload, opaque to the relay.
    EncryptedMessage {
        /// JSON string containing a [SealedEnvelope].
        content: String,
    },
}

impl ClientMessage {
    /// System message announcing the room identifier to the
    /// first participant.
    pub fn room(room_id: &RoomId) -> Self {
        Self::System {
            message: room_id.to_string(),
        }
    }

    /// System message signalling the peer has joined.
    pub fn ready() -> Self {
        Self::System {
            message: SYSTEM_READY.to_owned(),
        }
    }

    /// System message signalling the peer has left.
    pub fn end() -> Self {
        Self::System {
            message: SYSTEM_END.to_owned(),
        }
    }
}

/// Envelope for a single authenticated encrypted message.
///
/// Each message carries its own nonce and authentication tag so
/// it can be decrypted independently of any other message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedEnvelope {
    /// Base64 encoded nonce.
    pub iv: String,
    /// Base64 encoded ciphertext.
    pub encrypted_data: String,
    /// Base64 encoded authentication tag.
    pub auth_tag: String,
}

impl SealedEnvelope {
    /// Serialize this envelope to the JSON string carried in an
    /// encrypted message frame.
    pub fn to_content(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize an envelope from the content of an encrypted
    /// message frame.
    pub fn from_content(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Record forwarded over the cross-node bus when the two
/// participants of a room are hosted by different nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    /// Room the payload belongs to.
    pub room_id: RoomId,
    /// Verbatim client frame, opaque to the relay.
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn room_id_shape() {
        let id = RoomId::generate();
        assert_eq!(ROOM_ID_LENGTH, id.as_str().len());
        assert!(id
            .as_str()
            .bytes()
            .all(|b| ROOM_ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn system_wire_format() -> Result<()> {
        let message = ClientMessage::ready();
        assert_eq!(
            json!({"type": "system", "message": "ready"}),
            serde_json::to_value(&message)?,
        );

        let message = ClientMessage::room(&"abc123".into());
        assert_eq!(
            json!({"type": "system", "message": "abc123"}),
            serde_json::to_value(&message)?,
        );
        Ok(())
    }

    #[test]
    fn public_key_wire_format() -> Result<()> {
        let message = ClientMessage::PublicKey {
            key: "AicK".to_owned(),
        };
        assert_eq!(
            json!({"type": "publicKey", "key": "AicK"}),
            serde_json::to_value(&message)?,
        );
        Ok(())
    }

    #[test]
    fn envelope_content_round_trip() -> Result<()> {
        let envelope = SealedEnvelope {
            iv: "aXY=".to_owned(),
            encrypted_data: "ZGF0YQ==".to_owned(),
            auth_tag: "dGFn".to_owned(),
        };
        let content = envelope.to_content()?;
        let value: serde_json::Value =
            serde_json::from_str(&content)?;
        assert_eq!("aXY=", value["iv"]);
        assert_eq!("ZGF0YQ==", value["encryptedData"]);
        assert_eq!("dGFn", value["authTag"]);
        assert_eq!(
            envelope,
            SealedEnvelope::from_content(&content)?
        );
        Ok(())
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(
            r#"{"type": "broadcast", "message": "hi"}"#,
        );
        assert!(result.is_err());
    }
}
