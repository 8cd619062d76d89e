//! Key exchange and transport encryption state for one room.
use aes_gcm::{aead::Aead, Aes256Gcm, Key, KeyInit, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use p256::{
    ecdh::EphemeralSecret, elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crevice_protocol::{RoomId, SealedEnvelope};

use crate::{Error, Result};

/// Domain separation for the derived encryption key.
const KEY_INFO: &[u8] = b"crevice-aes256gcm";

/// Nonce length for AES-GCM.
const NONCE_LENGTH: usize = 12;

/// Authentication tag length for AES-GCM.
const TAG_LENGTH: usize = 16;

/// Client-side crypto session for a single room.
///
/// Owns the ephemeral key pair and the derived shared secret;
/// tracks whether this side has sent and received a public key
/// independently because the triggering events can arrive in
/// either order. Performs no network operations.
pub struct ClientSession {
    secret: EphemeralSecret,
    public_key: String,
    shared: Option<[u8; 32]>,
    sent_public_key: bool,
    received_public_key: bool,
    room_id: Option<RoomId>,
}

impl ClientSession {
    /// Create a session with a fresh ephemeral key pair.
    pub fn new(room_id: Option<RoomId>) -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(true);
        let public_key = STANDARD.encode(point.as_bytes());
        Self {
            secret,
            public_key,
            shared: None,
            sent_public_key: false,
            received_public_key: false,
            room_id,
        }
    }

    /// Base64 encoded compressed public key for the handshake.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Identifier of the room, once known.
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Record the room identifier announced by the relay.
    pub fn set_room_id(&mut self, room_id: RoomId) {
        self.room_id = Some(room_id);
    }

    /// Whether this side has sent its public key.
    pub fn key_sent(&self) -> bool {
        self.sent_public_key
    }

    /// Record that this side has sent its public key.
    pub fn mark_key_sent(&mut self) {
        self.sent_public_key = true;
    }

    /// Process the peer's public key and derive the shared
    /// encryption key.
    ///
    /// The secret is derived exactly once per session; a
    /// duplicate key announcement leaves it untouched.
    pub fn receive_peer_key(&mut self, key: &str) -> Result<()> {
        let bytes = STANDARD.decode(key)?;
        let peer = PublicKey::from_sec1_bytes(&bytes)
            .map_err(|_| Error::InvalidPeerKey)?;

        if self.shared.is_none() {
            let secret = self.secret.diffie_hellman(&peer);
            let hkdf = Hkdf::<Sha256>::new(
                None,
                secret.raw_secret_bytes().as_slice(),
            );
            let mut shared = [0u8; 32];
            hkdf.expand(KEY_INFO, &mut shared)
                .map_err(|_| Error::KeyDerivation)?;
            self.shared = Some(shared);
        }
        self.received_public_key = true;
        Ok(())
    }

    /// Whether the key exchange has completed in both
    /// directions.
    pub fn is_established(&self) -> bool {
        self.sent_public_key
            && self.received_public_key
            && self.shared.is_some()
    }

    /// Encrypt a message with a fresh random nonce.
    pub fn encrypt(&self, message: &str) -> Result<SealedEnvelope> {
        let shared =
            self.shared.ok_or(Error::KeyExchangeIncomplete)?;
        let cipher =
            Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&shared));

        let mut iv = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = cipher
            .encrypt(Nonce::from_slice(&iv), message.as_bytes())
            .map_err(|_| Error::Encrypt)?;
        let tag = buffer.split_off(buffer.len() - TAG_LENGTH);

        Ok(SealedEnvelope {
            iv: STANDARD.encode(iv),
            encrypted_data: STANDARD.encode(buffer),
            auth_tag: STANDARD.encode(tag),
        })
    }

    /// Authenticate and decrypt an envelope.
    pub fn decrypt(
        &self,
        envelope: &SealedEnvelope,
    ) -> Result<String> {
        let shared =
            self.shared.ok_or(Error::KeyExchangeIncomplete)?;

        let iv = STANDARD.decode(&envelope.iv)?;
        let tag = STANDARD.decode(&envelope.auth_tag)?;
        if iv.len() != NONCE_LENGTH || tag.len() != TAG_LENGTH {
            return Err(Error::MalformedEnvelope);
        }

        let mut buffer =
            STANDARD.decode(&envelope.encrypted_data)?;
        buffer.extend_from_slice(&tag);

        let cipher =
            Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&shared));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), buffer.as_ref())
            .map_err(|_| Error::Decrypt)?;
        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn established_pair() -> (ClientSession, ClientSession) {
        let mut alice = ClientSession::new(None);
        let mut bob =
            ClientSession::new(Some(RoomId::from("abc123")));

        // Alice saw the ready signal before the peer key
        alice.mark_key_sent();
        alice
            .receive_peer_key(&bob.public_key().to_owned())
            .unwrap();

        // Bob learned the peer key before any ready signal
        bob.receive_peer_key(&alice.public_key().to_owned())
            .unwrap();
        bob.mark_key_sent();

        (alice, bob)
    }

    #[test]
    fn handshake_converges_in_either_order() {
        let (alice, bob) = established_pair();
        assert!(alice.is_established());
        assert!(bob.is_established());
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (alice, bob) = established_pair();
        let envelope = alice.encrypt("hello").unwrap();
        assert_eq!("hello", bob.decrypt(&envelope).unwrap());
        // Envelopes are self contained; a redelivered duplicate
        // decrypts again
        assert_eq!("hello", bob.decrypt(&envelope).unwrap());
    }

    #[test]
    fn nonces_are_unique_per_message() {
        let (alice, _) = established_pair();
        let first = alice.encrypt("hello").unwrap();
        let second = alice.encrypt("hello").unwrap();
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.encrypted_data, second.encrypted_data);
    }

    #[test]
    fn tampering_fails_authentication() {
        let (alice, bob) = established_pair();
        let envelope = alice.encrypt("hello").unwrap();

        for field in 0..3 {
            let mut copy = envelope.clone();
            let target = match field {
                0 => &mut copy.iv,
                1 => &mut copy.encrypted_data,
                _ => &mut copy.auth_tag,
            };
            let mut bytes =
                STANDARD.decode(target.as_bytes()).unwrap();
            bytes[0] ^= 0x01;
            *target = STANDARD.encode(bytes);
            assert!(bob.decrypt(&copy).is_err());
        }
    }

    #[test]
    fn sending_requires_key_exchange() {
        let session = ClientSession::new(None);
        assert!(matches!(
            session.encrypt("hello"),
            Err(Error::KeyExchangeIncomplete)
        ));
    }

    #[test]
    fn malformed_envelope_is_an_error() {
        let (alice, bob) = established_pair();
        let mut envelope = alice.encrypt("hello").unwrap();
        // Valid base64, wrong nonce length
        envelope.iv = STANDARD.encode([0u8; 3]);
        assert!(matches!(
            bob.decrypt(&envelope),
            Err(Error::MalformedEnvelope)
        ));
    }
}
