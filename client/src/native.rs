use futures::{
    stream::{SplitSink, SplitStream},
    StreamExt,
};
use http::StatusCode;
use std::sync::Arc;
use tokio::{
    net::TcpStream,
    sync::{mpsc, RwLock},
};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream,
    WebSocketStream,
};

use crevice_protocol::{ClientMessage, RoomId};

use crate::{
    event_loop::{EventLoop, InternalMessage},
    ClientOptions, ClientSession, Error, Result, Session,
};

pub(crate) type WsReadStream =
    SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
pub(crate) type WsWriteStream = SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    Message,
>;

/// Relay service websocket client.
#[derive(Clone)]
pub struct NativeClient {
    outbound_tx: mpsc::UnboundedSender<InternalMessage>,
    session: Session,
}

impl NativeClient {
    /// Create a new native client.
    pub async fn new(
        server: &str,
        options: ClientOptions,
    ) -> Result<(Self, EventLoop)> {
        let url = options.url(server);
        let (stream, response) = connect_async(&url).await?;

        let status: u16 = response.status().into();
        if status != StatusCode::SWITCHING_PROTOCOLS.as_u16() {
            return Err(Error::ConnectError(
                StatusCode::from_u16(status).unwrap(),
                response.status().to_string(),
            ));
        }

        let (ws_writer, ws_reader) = stream.split();

        let session = Arc::new(RwLock::new(ClientSession::new(
            options.room_id,
        )));

        // Channel for writing outbound frames to the socket
        let (outbound_tx, outbound_rx) =
            mpsc::unbounded_channel::<InternalMessage>();

        let client = Self {
            outbound_tx: outbound_tx.clone(),
            session: Arc::clone(&session),
        };

        let event_loop = EventLoop {
            ws_reader,
            ws_writer,
            outbound_tx,
            outbound_rx,
            session,
        };

        Ok((client, event_loop))
    }

    /// Encrypt a message and queue it for sending.
    ///
    /// Fails fast when the key exchange has not completed.
    pub async fn send(&self, message: &str) -> Result<()> {
        let envelope = {
            let session = self.session.read().await;
            session.encrypt(message)?
        };
        let frame = serde_json::to_string(
            &ClientMessage::EncryptedMessage {
                content: envelope.to_content()?,
            },
        )?;
        self.outbound_tx
            .send(InternalMessage::Frame(frame))
            .map_err(|_| Error::EventLoopClosed)
    }

    /// Whether the key exchange has completed and sending is
    /// legal.
    pub async fn is_established(&self) -> bool {
        let session = self.session.read().await;
        session.is_established()
    }

    /// Identifier of this client's room, once known.
    pub async fn room_id(&self) -> Option<RoomId> {
        let session = self.session.read().await;
        session.room_id().cloned()
    }

    /// Close the connection.
    pub fn close(&self) -> Result<()> {
        self.outbound_tx
            .send(InternalMessage::Close)
            .map_err(|_| Error::EventLoopClosed)
    }
}
