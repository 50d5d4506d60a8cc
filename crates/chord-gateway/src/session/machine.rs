//! Session state machine
//!
//! Pure transition logic for one shard. The runner feeds it [`Input`]s (socket
//! events, timer expiries, owner requests) and performs the [`Action`]s it
//! returns. Nothing in here touches the network or the clock, which keeps every
//! lifecycle path testable without a server.

use super::{Backoff, ConnectionState, Session};
use crate::events::Event;
use crate::protocol::{
    CloseAction, CloseCode, GatewayMessage, IdentifyPayload, IdentifyProperties, OpCode,
    PresenceUpdatePayload, ReadyPayload, ResumePayload,
};
use crate::socket::{CLOSE_NORMAL, CLOSE_RESUMABLE};
use chord_common::ClientError;
use chord_core::{Intents, ShardInfo};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Consecutive undecodable frames tolerated before the connection is recycled
pub const MAX_CONSECUTIVE_VIOLATIONS: u32 = 5;

/// Wait range after a non-resumable invalid session, in milliseconds
const INVALID_SESSION_WAIT_MS: std::ops::RangeInclusive<u64> = 1_000..=5_000;

/// Everything that goes into an Identify besides the shard
#[derive(Debug, Clone)]
pub struct IdentifyOptions {
    pub token: String,
    pub intents: Intents,
    pub large_threshold: u8,
    pub presence: Option<PresenceUpdatePayload>,
    pub properties: IdentifyProperties,
}

impl IdentifyOptions {
    #[must_use]
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            large_threshold: 50,
            presence: None,
            properties: IdentifyProperties::current(),
        }
    }
}

#[derive(Debug)]
pub enum Input {
    /// Owner asked the shard to come online
    Start,
    SocketOpened,
    ConnectFailed(ClientError),
    Frame(GatewayMessage),
    /// Undecodable frame
    Violation(ClientError),
    SocketClosed { code: Option<u16>, reason: String },
    HelloTimeout,
    /// A heartbeat went unacknowledged
    HeartbeatTimeout,
    /// The reconnect wait is over
    BackoffElapsed,
    Shutdown,
}

#[derive(Debug)]
pub enum Action {
    Connect { url: String },
    StartHeartbeat { interval: Duration },
    StopHeartbeat,
    AckHeartbeat,
    HeartbeatNow,
    /// Send once the identify queue admits this shard
    Identify(GatewayMessage),
    Send(GatewayMessage),
    Dispatch(Event),
    /// Close and drop the current socket
    Disconnect { code: u16 },
    /// Feed [`Input::BackoffElapsed`] after `delay`
    Wait { delay: Duration },
    /// The shard stopped for good with this error
    Fail(ClientError),
}

pub struct SessionStateMachine {
    state: ConnectionState,
    session: Session,
    gateway_url: String,
    identify: IdentifyOptions,
    backoff: Backoff,
    violations: u32,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new(shard: ShardInfo, gateway_url: impl Into<String>, identify: IdentifyOptions, backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: Session::new(shard),
            gateway_url: gateway_url.into(),
            identify,
            backoff,
            violations: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn shard(&self) -> ShardInfo {
        self.session.shard
    }

    fn shard_id(&self) -> u32 {
        self.session.shard.id()
    }

    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        if self.state.is_closed() {
            debug!(shard_id = self.shard_id(), input = ?input, "Ignoring input after close");
            return Vec::new();
        }

        match input {
            Input::Start => self.on_start(),
            Input::SocketOpened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::AwaitingHello;
                }
                Vec::new()
            }
            Input::ConnectFailed(error) => {
                warn!(shard_id = self.shard_id(), error = %error, "Gateway connection failed");
                if self.state == ConnectionState::Connecting {
                    self.reconnect(None)
                } else {
                    Vec::new()
                }
            }
            Input::Frame(frame) => self.on_frame(frame),
            Input::Violation(error) => self.on_violation(&error),
            Input::SocketClosed { code, reason } => self.on_close(code, &reason),
            Input::HelloTimeout => {
                if self.state == ConnectionState::AwaitingHello {
                    warn!(shard_id = self.shard_id(), "No Hello received in time");
                    self.reconnect(Some(CLOSE_RESUMABLE))
                } else {
                    Vec::new()
                }
            }
            Input::HeartbeatTimeout => {
                if self.state.has_socket() {
                    warn!(shard_id = self.shard_id(), "Zombied connection, reconnecting");
                    self.reconnect(Some(CLOSE_RESUMABLE))
                } else {
                    Vec::new()
                }
            }
            Input::BackoffElapsed => {
                if self.state == ConnectionState::Reconnecting {
                    self.connect()
                } else {
                    Vec::new()
                }
            }
            Input::Shutdown => {
                info!(shard_id = self.shard_id(), "Shard shutting down");
                self.state = ConnectionState::ClosedPermanently;
                vec![
                    Action::StopHeartbeat,
                    Action::Disconnect { code: CLOSE_NORMAL },
                ]
            }
        }
    }

    fn on_start(&mut self) -> Vec<Action> {
        if self.state == ConnectionState::Disconnected {
            self.connect()
        } else {
            Vec::new()
        }
    }

    fn connect(&mut self) -> Vec<Action> {
        self.state = ConnectionState::Connecting;
        let url = match &self.session.resume_url {
            Some(url) if self.session.can_resume() => url.clone(),
            _ => self.gateway_url.clone(),
        };
        vec![Action::Connect { url }]
    }

    fn on_frame(&mut self, frame: GatewayMessage) -> Vec<Action> {
        if frame.op.sent_by_gateway() {
            self.violations = 0;
        }

        match frame.op {
            OpCode::Dispatch => self.on_dispatch(frame),
            OpCode::Hello => self.on_hello(&frame),
            OpCode::HeartbeatAck => vec![Action::AckHeartbeat],
            OpCode::Heartbeat => vec![Action::HeartbeatNow],
            OpCode::Reconnect => {
                info!(shard_id = self.shard_id(), "Gateway requested reconnect");
                self.reconnect(Some(CLOSE_RESUMABLE))
            }
            OpCode::InvalidSession => {
                let resumable = frame.as_invalid_session().unwrap_or(false);
                if resumable && self.session.can_resume() {
                    info!(shard_id = self.shard_id(), "Session invalidated, resuming");
                    self.reconnect(Some(CLOSE_RESUMABLE))
                } else {
                    info!(shard_id = self.shard_id(), "Session invalidated, identifying again");
                    self.session.invalidate();
                    let wait = rand::thread_rng().gen_range(INVALID_SESSION_WAIT_MS);
                    self.reconnect_after(Some(CLOSE_NORMAL), Duration::from_millis(wait))
                }
            }
            op => {
                let kind = if op.sent_by_gateway() { "unexpected" } else { "client-only" };
                self.on_violation(&ClientError::protocol(format!("{kind} opcode {op} from gateway")))
            }
        }
    }

    fn on_hello(&mut self, frame: &GatewayMessage) -> Vec<Action> {
        if self.state != ConnectionState::AwaitingHello {
            debug!(shard_id = self.shard_id(), state = %self.state, "Ignoring duplicate Hello");
            return Vec::new();
        }
        let Some(hello) = frame.as_hello() else {
            return self.on_violation(&ClientError::protocol("malformed Hello"));
        };
        let interval = Duration::from_millis(hello.heartbeat_interval);

        let mut actions = vec![Action::StartHeartbeat { interval }];
        match (&self.session.session_id, self.session.sequence) {
            (Some(session_id), Some(seq)) => {
                let payload = ResumePayload {
                    token: self.identify.token.clone(),
                    session_id: session_id.clone(),
                    seq,
                };
                match GatewayMessage::resume(&payload) {
                    Ok(message) => {
                        debug!(shard_id = self.shard_id(), seq, "Resuming session");
                        self.state = ConnectionState::Resuming;
                        actions.push(Action::Send(message));
                    }
                    Err(e) => return self.fail(e),
                }
            }
            _ => {
                let payload = IdentifyPayload {
                    token: self.identify.token.clone(),
                    properties: self.identify.properties.clone(),
                    compress: false,
                    large_threshold: self.identify.large_threshold,
                    shard: self.session.shard,
                    presence: self.identify.presence.clone(),
                    intents: self.identify.intents,
                };
                match GatewayMessage::identify(&payload) {
                    Ok(message) => {
                        debug!(shard_id = self.shard_id(), "Identifying");
                        self.state = ConnectionState::Identifying;
                        actions.push(Action::Identify(message));
                    }
                    Err(e) => return self.fail(e),
                }
            }
        }
        actions
    }

    fn on_dispatch(&mut self, frame: GatewayMessage) -> Vec<Action> {
        if let Some(seq) = frame.s {
            self.session.update_sequence(seq);
        }
        let name = frame.t.unwrap_or_default();

        match name.as_str() {
            "READY" => match serde_json::from_value::<ReadyPayload>(frame.d.clone()) {
                Ok(ready) => {
                    info!(
                        shard_id = self.shard_id(),
                        session_id = %ready.session_id,
                        guilds = ready.guilds.len(),
                        "Shard ready"
                    );
                    self.session.record_ready(ready.session_id, ready.resume_gateway_url);
                    self.mark_connected();
                }
                Err(e) => return self.on_violation(&ClientError::protocol(format!("malformed READY: {e}"))),
            },
            "RESUMED" => {
                info!(shard_id = self.shard_id(), seq = ?self.session.sequence, "Session resumed");
                self.mark_connected();
            }
            _ => {}
        }

        vec![Action::Dispatch(Event {
            shard_id: self.shard_id(),
            name,
            seq: frame.s,
            data: frame.d,
        })]
    }

    fn mark_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.backoff.reset();
    }

    fn on_violation(&mut self, error: &ClientError) -> Vec<Action> {
        self.violations += 1;
        warn!(
            shard_id = self.shard_id(),
            error = %error,
            consecutive = self.violations,
            "Protocol violation"
        );
        if self.violations >= MAX_CONSECUTIVE_VIOLATIONS && self.state.has_socket() {
            self.reconnect(Some(CLOSE_RESUMABLE))
        } else {
            Vec::new()
        }
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) -> Vec<Action> {
        if !self.state.has_socket() {
            return Vec::new();
        }
        match CloseCode::classify(code) {
            CloseAction::Fatal => {
                let error = code
                    .and_then(CloseCode::from_u16)
                    .and_then(|close| close.fatal_error(self.shard_id()))
                    .unwrap_or(ClientError::ConnectionClosed {
                        shard_id: self.shard_id(),
                        code: code.unwrap_or_default(),
                        reason: reason.to_string(),
                    });
                self.fail(error)
            }
            CloseAction::Reidentify => {
                info!(shard_id = self.shard_id(), code = ?code, reason, "Session closed, identifying again");
                self.session.invalidate();
                self.reconnect(Some(CLOSE_NORMAL))
            }
            CloseAction::Resume => {
                info!(shard_id = self.shard_id(), code = ?code, reason, "Connection closed, resuming");
                self.reconnect(Some(CLOSE_RESUMABLE))
            }
        }
    }

    fn reconnect(&mut self, close: Option<u16>) -> Vec<Action> {
        let delay = self.backoff.next_delay();
        self.reconnect_after(close, delay)
    }

    fn reconnect_after(&mut self, close: Option<u16>, delay: Duration) -> Vec<Action> {
        self.state = ConnectionState::Reconnecting;
        self.violations = 0;

        let mut actions = vec![Action::StopHeartbeat];
        if let Some(code) = close {
            actions.push(Action::Disconnect { code });
        }
        debug!(shard_id = self.shard_id(), delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        actions.push(Action::Wait { delay });
        actions
    }

    fn fail(&mut self, error: ClientError) -> Vec<Action> {
        warn!(shard_id = self.shard_id(), error = %error, "Shard stopped");
        self.state = ConnectionState::ClosedPermanently;
        vec![
            Action::StopHeartbeat,
            Action::Disconnect { code: CLOSE_NORMAL },
            Action::Fail(error),
        ]
    }
}
