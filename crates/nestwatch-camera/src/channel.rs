//! Signaling channel: one WebSocket connection to the relay.
//!
//! The channel owns the physical connection for one generation. Inbound
//! messages are decoded and handed out strictly in arrival order through
//! [`SignalingChannel::next_message`]; all outbound messages, whether
//! from the session controller or from engine candidate callbacks, are
//! serialized through one bounded outbox drained by a single writer task.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use nestwatch_common::{Error, Result};
use nestwatch_core::{DeviceIdentity, MessageKind, SignalMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const OUTBOX_CAPACITY: usize = 64;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct SignalingChannel {
    inbound: WsStream,
    outbound: mpsc::Sender<SignalMessage>,
    writer: JoinHandle<()>,
}

impl SignalingChannel {
    /// Open the WebSocket connection and start the writer task. The
    /// channel is not usable for signaling until [`register`] succeeds.
    ///
    /// [`register`]: SignalingChannel::register
    pub async fn connect(url: &str) -> Result<Self> {
        info!(%url, "connecting to relay");
        let (ws, _) = connect_async(url).await.map_err(Error::transport)?;
        let (sink, inbound) = ws.split();

        let (outbound, outbox) = mpsc::channel(OUTBOX_CAPACITY);
        let writer = tokio::spawn(write_loop(sink, outbox));

        Ok(Self {
            inbound,
            outbound,
            writer,
        })
    }

    /// Perform the registration handshake: send the `register` message
    /// and await exactly one reply, which must be `camera-register-ack`.
    pub async fn register(&mut self, identity: &DeviceIdentity) -> Result<()> {
        let register = SignalMessage::register(&identity.camera_id, identity.token());
        self.send(register).await?;

        let reply = match self.next_message().await? {
            Some(reply) => reply,
            None => return Err(Error::handshake("connection closed before ack")),
        };
        if reply.kind != MessageKind::CameraRegisterAck {
            return Err(Error::handshake(format!(
                "expected camera-register-ack, got {:?}",
                reply.kind.as_str()
            )));
        }

        info!(camera = %identity.camera_id, "registered with relay");
        Ok(())
    }

    /// Queue one outbound message.
    pub async fn send(&self, msg: SignalMessage) -> Result<()> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| Error::transport("outbound queue closed"))
    }

    /// Clone of the outbox sender, for the session controller and for
    /// engine candidate callbacks.
    pub fn sender(&self) -> mpsc::Sender<SignalMessage> {
        self.outbound.clone()
    }

    /// Next inbound signaling message, in arrival order.
    ///
    /// Returns `Ok(None)` when the relay closes the connection cleanly.
    /// A frame that fails to decode as a [`SignalMessage`] is a protocol
    /// violation: the channel is desynchronized and the caller must tear
    /// the connection down rather than skip the message.
    pub async fn next_message(&mut self) -> Result<Option<SignalMessage>> {
        while let Some(frame) = self.inbound.next().await {
            let frame = frame.map_err(Error::transport)?;
            match frame {
                Message::Text(text) => {
                    let msg: SignalMessage = serde_json::from_str(text.as_str())
                        .map_err(|e| Error::protocol(format!("undecodable message: {e}")))?;
                    return Ok(Some(msg));
                }
                Message::Binary(_) => {
                    return Err(Error::protocol("unexpected binary frame"));
                }
                Message::Close(_) => {
                    debug!("relay sent close frame");
                    return Ok(None);
                }
                // Ping/pong are transport keepalive, handled by tungstenite.
                _ => continue,
            }
        }
        Ok(None)
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

async fn write_loop(mut sink: WsSink, mut outbox: mpsc::Receiver<SignalMessage>) {
    while let Some(msg) = outbox.recv().await {
        let text = match serde_json::to_string(&msg) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode outbound message: {e}");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            debug!("outbound send failed: {e}");
            break;
        }
    }
    let _ = sink.close().await;
}
