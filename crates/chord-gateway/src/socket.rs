//! Gateway WebSocket
//!
//! The socket is split into a read half, polled by the shard runner, and a
//! writer task fed by two queues. Heartbeats travel on the priority queue and
//! bypass the outbound command limiter; everything else is limited to the
//! service's per-connection command budget.

use crate::protocol::GatewayMessage;
use chord_common::{ClientError, ClientResult};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel buffer size for outgoing messages
const OUTBOUND_BUFFER: usize = 100;

/// Commands per minute kept free for heartbeats
const HEARTBEAT_HEADROOM: u32 = 3;

/// Close code that keeps the session resumable
pub const CLOSE_RESUMABLE: u16 = 4000;

/// Close code that ends the session
pub const CLOSE_NORMAL: u16 = 1000;

/// Connection URL with the version and encoding query the gateway expects
///
/// URLs that already carry a query are used unchanged.
#[must_use]
pub fn gateway_url(base: &str, api_version: u8) -> String {
    if base.contains('?') {
        return base.to_string();
    }
    format!("{}/?v={api_version}&encoding=json", base.trim_end_matches('/'))
}

/// What the read half produced
#[derive(Debug)]
pub enum SocketEvent {
    Frame(GatewayMessage),
    /// A frame that could not be decoded; the connection stays up
    Violation(ClientError),
    Closed { code: Option<u16>, reason: String },
}

#[derive(Debug)]
enum Outbound {
    Frame(GatewayMessage),
    Close(u16),
}

/// Cloneable handle to the writer task
#[derive(Debug, Clone)]
pub struct SocketSender {
    normal: mpsc::Sender<Outbound>,
    priority: mpsc::Sender<Outbound>,
}

impl SocketSender {
    /// Queue a frame behind the command limiter
    pub async fn send(&self, message: GatewayMessage) -> ClientResult<()> {
        self.normal
            .send(Outbound::Frame(message))
            .await
            .map_err(|_| ClientError::connectivity("socket writer closed"))
    }

    /// Queue a frame ahead of everything else
    pub async fn send_priority(&self, message: GatewayMessage) -> ClientResult<()> {
        self.priority
            .send(Outbound::Frame(message))
            .await
            .map_err(|_| ClientError::connectivity("socket writer closed"))
    }

    async fn close(&self, code: u16) {
        let _ = self.priority.send(Outbound::Close(code)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.normal.is_closed()
    }

    /// Sender whose frames land in plain receivers instead of a socket
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::Receiver<GatewayMessage>) {
        let (normal_tx, mut normal_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (priority_tx, mut priority_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        tokio::spawn(async move {
            loop {
                let outbound = tokio::select! {
                    biased;
                    Some(m) = priority_rx.recv() => m,
                    Some(m) = normal_rx.recv() => m,
                    else => break,
                };
                match outbound {
                    Outbound::Frame(frame) => {
                        if out_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Outbound::Close(_) => break,
                }
            }
        });
        (
            Self {
                normal: normal_tx,
                priority: priority_tx,
            },
            out_rx,
        )
    }
}

/// One open gateway connection
pub struct GatewaySocket {
    stream: SplitStream<WsStream>,
    sender: SocketSender,
    writer: JoinHandle<()>,
    shard_id: u32,
}

impl GatewaySocket {
    /// Open a connection to `url`
    pub async fn connect(url: &str, shard_id: u32, commands_per_minute: u32) -> ClientResult<Self> {
        debug!(shard_id, url = %url, "Connecting to gateway");

        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::connectivity(format!("websocket connect to {url} failed: {e}")))?;
        let (sink, stream) = ws.split();

        let (normal_tx, normal_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (priority_tx, priority_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let per_minute = NonZeroU32::new(commands_per_minute.saturating_sub(HEARTBEAT_HEADROOM))
            .unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));
        let writer = tokio::spawn(write_loop(sink, priority_rx, normal_rx, limiter, shard_id));

        Ok(Self {
            stream,
            sender: SocketSender {
                normal: normal_tx,
                priority: priority_tx,
            },
            writer,
            shard_id,
        })
    }

    pub fn sender(&self) -> SocketSender {
        self.sender.clone()
    }

    /// Next inbound event; after `Closed` the socket is done
    pub async fn recv(&mut self) -> SocketEvent {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return SocketEvent::Closed {
                        code: None,
                        reason: e.to_string(),
                    }
                }
                None => {
                    return SocketEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    }
                }
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => return SocketEvent::Violation(ClientError::protocol("binary frame is not UTF-8")),
                },
                Message::Close(frame) => {
                    let (code, reason) = frame.map_or((None, String::new()), |f| {
                        (Some(u16::from(f.code)), f.reason.into_owned())
                    });
                    debug!(shard_id = self.shard_id, code = ?code, reason = %reason, "Gateway closed connection");
                    return SocketEvent::Closed { code, reason };
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            trace!(shard_id = self.shard_id, len = text.len(), "Frame received");
            return match GatewayMessage::from_json(&text) {
                Ok(frame) => SocketEvent::Frame(frame),
                Err(e) => SocketEvent::Violation(e),
            };
        }
    }

    /// Send a close frame and stop the writer
    pub async fn close(mut self, code: u16) {
        self.sender.close(code).await;
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), &mut self.writer).await;
    }
}

impl Drop for GatewaySocket {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut priority: mpsc::Receiver<Outbound>,
    mut normal: mpsc::Receiver<Outbound>,
    limiter: DefaultDirectRateLimiter,
    shard_id: u32,
) {
    loop {
        let outbound = tokio::select! {
            biased;
            Some(outbound) = priority.recv() => outbound,
            Some(outbound) = normal.recv() => {
                // Heartbeats keep flowing while a command waits for budget
                loop {
                    tokio::select! {
                        biased;
                        Some(urgent) = priority.recv() => {
                            if !write(&mut sink, urgent, shard_id).await {
                                return;
                            }
                        }
                        () = limiter.until_ready() => break,
                    }
                }
                outbound
            }
            else => break,
        };

        if !write(&mut sink, outbound, shard_id).await {
            return;
        }
    }
    let _ = sink.close().await;
}

/// Write one frame; false once the socket is done
async fn write(sink: &mut SplitSink<WsStream, Message>, outbound: Outbound, shard_id: u32) -> bool {
    match outbound {
        Outbound::Frame(frame) => {
            let text = match frame.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(shard_id, error = %e, "Dropping unserializable frame");
                    return true;
                }
            };
            trace!(shard_id, op = %frame.op, "Sending frame");
            if let Err(e) = sink.send(Message::Text(text)).await {
                warn!(shard_id, error = %e, "Failed to write to gateway");
                return false;
            }
            true
        }
        Outbound::Close(code) => {
            let frame = CloseFrame {
                code: WsCloseCode::from(code),
                reason: "".into(),
            };
            let _ = sink.send(Message::Close(Some(frame))).await;
            let _ = sink.close().await;
            false
        }
    }
}
