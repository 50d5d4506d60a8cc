//! Test helpers for integration tests
//!
//! A scripted gateway speaking the real WebSocket protocol and a throwaway
//! REST API built from an axum router. Both bind an ephemeral local port.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::Router;
use chord_gateway::{GatewayMessage, OpCode};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Upper bound for any single wait in a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Heartbeat interval announced by the mock gateway; long enough that no
/// heartbeat goes unanswered during a test
pub const HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// Local gateway accepting any number of connections
pub struct MockGateway {
    url: String,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(MockConnection { ws }).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            url: format!("ws://{addr}"),
            connections: rx,
            _handle: handle,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the next client connection
    pub async fn accept(&mut self) -> Result<MockConnection> {
        tokio::time::timeout(TEST_TIMEOUT, self.connections.recv())
            .await
            .context("no connection in time")?
            .context("mock gateway stopped")
    }
}

/// One accepted client connection
pub struct MockConnection {
    ws: WebSocketStream<TcpStream>,
}

impl MockConnection {
    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        self.ws.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    pub async fn hello(&mut self) -> Result<()> {
        self.send(&GatewayMessage::hello(HEARTBEAT_INTERVAL_MS)).await
    }

    pub async fn dispatch(&mut self, event: &str, seq: u64, data: serde_json::Value) -> Result<()> {
        self.send(&GatewayMessage::dispatch(event, seq, data)).await
    }

    /// Next command from the client; heartbeats are acknowledged and skipped
    pub async fn recv_command(&mut self) -> Result<GatewayMessage> {
        loop {
            let frame = tokio::time::timeout(TEST_TIMEOUT, self.ws.next())
                .await
                .context("no frame in time")?
                .context("client hung up")??;

            match frame {
                Message::Text(text) => {
                    let message = GatewayMessage::from_json(&text)?;
                    if message.op == OpCode::Heartbeat {
                        self.send(&GatewayMessage::heartbeat_ack()).await?;
                        continue;
                    }
                    return Ok(message);
                }
                Message::Close(frame) => bail!("client closed the connection: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Acknowledge every heartbeat for `period`; returns how many arrived
    pub async fn answer_heartbeats(&mut self, period: Duration) -> Result<usize> {
        let deadline = tokio::time::Instant::now() + period;
        let mut beats = 0;
        loop {
            let frame = match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return Ok(beats),
                Ok(frame) => frame.context("client hung up")??,
            };
            match frame {
                Message::Text(text) => {
                    if GatewayMessage::from_json(&text)?.op == OpCode::Heartbeat {
                        beats += 1;
                        self.send(&GatewayMessage::heartbeat_ack()).await?;
                    }
                }
                Message::Close(frame) => bail!("client closed the connection: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Close code the client sends when it leaves
    pub async fn recv_close(&mut self) -> Result<Option<u16>> {
        loop {
            let frame = tokio::time::timeout(TEST_TIMEOUT, self.ws.next())
                .await
                .context("no frame in time")?;
            match frame {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }

    pub async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.ws.close(Some(frame)).await?;
        Ok(())
    }
}

/// REST API served from an axum router
pub struct MockApi {
    pub addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl MockApi {
    pub async fn start(app: Router) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, _handle: handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}
