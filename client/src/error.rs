use http::StatusCode;
use thiserror::Error;

/// Errors generated by the relay client.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when the websocket connection was
    /// refused.
    #[error("could not connect, got status code {0} {1}")]
    ConnectError(StatusCode, String),

    /// Error generated when a frame could not be sent over
    /// the websocket.
    #[error("failed to send websocket message")]
    WebSocketSend,

    /// Error generated when the stream halves cannot be
    /// reunited to close the connection.
    #[error("could not reunite stream halves")]
    StreamReunite,

    /// Error generated when the event loop has stopped.
    #[error("event loop is closed")]
    EventLoopClosed,

    /// Error generated attempting to send or decrypt before the
    /// key exchange has completed.
    #[error("cannot send message, key exchange not completed")]
    KeyExchangeIncomplete,

    /// Error generated when the peer's public key is not a
    /// valid curve point.
    #[error("peer public key is not a valid curve point")]
    InvalidPeerKey,

    /// Error generated when the shared encryption key cannot
    /// be derived.
    #[error("could not derive the shared encryption key")]
    KeyDerivation,

    /// Error generated when a message could not be encrypted.
    #[error("message encryption failed")]
    Encrypt,

    /// Error generated when an envelope fails authentication.
    #[error("message decryption failed")]
    Decrypt,

    /// Error generated when an envelope field has the wrong
    /// shape.
    #[error("message envelope is malformed")]
    MalformedEnvelope,

    /// Error generated when decrypted bytes are not valid
    /// UTF-8.
    #[error(transparent)]
    PlaintextEncoding(#[from] std::string::FromUtf8Error),

    /// Error generated decoding base64 fields.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// Error generated serializing or deserializing JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error generated by the protocol library.
    #[error(transparent)]
    Protocol(#[from] crevice_protocol::Error),

    /// Error generated by the websocket transport.
    #[error(transparent)]
    WebSocket(
        #[from] tokio_tungstenite::tungstenite::Error,
    ),
}
