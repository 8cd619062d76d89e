use async_stream::stream;
use futures::{
    sink::SinkExt, stream::BoxStream, StreamExt,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

use crevice_protocol::{
    ClientMessage, RoomId, SealedEnvelope, SYSTEM_END,
    SYSTEM_READY,
};

use crate::{
    native::{WsReadStream, WsWriteStream},
    session::ClientSession,
    Error, Result, Session,
};

/// Stream of events emitted by an event loop.
pub type EventStream = BoxStream<'static, Result<Event>>;

/// Internal message used to communicate between
/// the client and event loop.
#[doc(hidden)]
#[derive(Debug)]
pub enum InternalMessage {
    /// Send a frame over the socket.
    Frame(String),
    /// Close the connection.
    Close,
}

/// Events dispatched by the event loop stream.
#[derive(Debug)]
pub enum Event {
    /// Event dispatched when the relay announces the room
    /// identifier after admitting the first participant.
    RoomCreated {
        /// Identifier of the room.
        room_id: RoomId,
    },
    /// Event dispatched when the key exchange has completed
    /// in both directions and sending becomes legal.
    ChannelOpen {
        /// Identifier of the room.
        room_id: RoomId,
    },
    /// Decrypted message received from the peer.
    MessageReceived {
        /// The plaintext.
        message: String,
    },
    /// Event dispatched when the channel has been closed.
    Close,
}

/// Event loop for a websocket client.
pub struct EventLoop {
    pub(crate) ws_reader: WsReadStream,
    pub(crate) ws_writer: WsWriteStream,
    pub(crate) outbound_tx:
        mpsc::UnboundedSender<InternalMessage>,
    pub(crate) outbound_rx:
        mpsc::UnboundedReceiver<InternalMessage>,
    pub(crate) session: Session,
}

impl EventLoop {
    /// Send a frame to the socket and flush the stream.
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        self.ws_writer
            .send(Message::Text(frame))
            .await
            .map_err(|_| Error::WebSocketSend)?;
        self.ws_writer
            .flush()
            .await
            .map_err(|_| Error::WebSocketSend)
    }

    async fn handle_close_message(self) -> Result<()> {
        let mut websocket = self
            .ws_reader
            .reunite(self.ws_writer)
            .map_err(|_| Error::StreamReunite)?;
        websocket.close(None).await?;
        Ok(())
    }

    /// Stream of events from the event loop.
    pub fn run(mut self) -> EventStream {
        let session = Arc::clone(&self.session);
        let s = stream! {
            loop {
                tokio::select!(
                    biased;
                    Some(message_out) = self.outbound_rx.recv() => {
                        match message_out {
                            InternalMessage::Frame(frame) => {
                                if let Err(e) = self.send_frame(frame).await {
                                    tracing::warn!(error = %e);
                                    yield Err(e);
                                }
                            }
                            InternalMessage::Close => {
                                if let Err(e) = self.handle_close_message().await {
                                    yield Err(e);
                                }
                                yield Ok(Event::Close);
                                break;
                            }
                        }
                    },
                    Some(message_in) = self.ws_reader.next() => {
                        match message_in {
                            Ok(Message::Text(frame)) => {
                                match handle_frame(
                                    &session,
                                    &self.outbound_tx,
                                    &frame,
                                ).await {
                                    Ok(Some(Event::Close)) => {
                                        let _ = self.ws_writer.close().await;
                                        yield Ok(Event::Close);
                                        break;
                                    }
                                    Ok(Some(event)) => {
                                        yield Ok(event);
                                    }
                                    Ok(None) => {}
                                    // A single bad frame or failed
                                    // decrypt is reported without
                                    // tearing the connection down
                                    Err(e) => {
                                        yield Err(e);
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => {
                                yield Ok(Event::Close);
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                yield Err(e.into());
                                break;
                            }
                        }
                    },
                    else => break,
                );
            }
        };
        Box::pin(s)
    }
}

/// Process an inbound frame, driving the handshake state
/// machine.
async fn handle_frame(
    session: &Session,
    outbound_tx: &mpsc::UnboundedSender<InternalMessage>,
    frame: &str,
) -> Result<Option<Event>> {
    let message: ClientMessage = serde_json::from_str(frame)?;
    match message {
        ClientMessage::System { message } => {
            match message.as_str() {
                SYSTEM_READY => {
                    let mut session = session.write().await;
                    if !session.key_sent() {
                        send_public_key(&mut session, outbound_tx)?;
                    }
                    Ok(None)
                }
                SYSTEM_END => Ok(Some(Event::Close)),
                room_id => {
                    let room_id = RoomId::from(room_id);
                    let mut session = session.write().await;
                    session.set_room_id(room_id.clone());
                    Ok(Some(Event::RoomCreated { room_id }))
                }
            }
        }
        ClientMessage::PublicKey { key } => {
            let mut session = session.write().await;
            session.receive_peer_key(&key)?;

            // The peer's key can arrive before any ready signal;
            // answer with our own key so the handshake converges
            // in either order
            if !session.key_sent() {
                send_public_key(&mut session, outbound_tx)?;
            }

            if session.is_established() {
                if let Some(room_id) = session.room_id().cloned() {
                    tracing::debug!(room = %room_id, "channel open");
                    return Ok(Some(Event::ChannelOpen {
                        room_id,
                    }));
                }
            }
            Ok(None)
        }
        ClientMessage::EncryptedMessage { content } => {
            let envelope = SealedEnvelope::from_content(&content)?;
            let session = session.read().await;
            let message = session.decrypt(&envelope)?;
            Ok(Some(Event::MessageReceived { message }))
        }
    }
}

fn send_public_key(
    session: &mut ClientSession,
    outbound_tx: &mpsc::UnboundedSender<InternalMessage>,
) -> Result<()> {
    let frame =
        serde_json::to_string(&ClientMessage::PublicKey {
            key: session.public_key().to_owned(),
        })?;
    outbound_tx
        .send(InternalMessage::Frame(frame))
        .map_err(|_| Error::EventLoopClosed)?;
    session.mark_key_sent();
    Ok(())
}
