//! Shard runner
//!
//! Drives one shard's [`SessionStateMachine`] against a real socket: it waits
//! on the socket, the heartbeat's zombie signal, the Hello deadline, the
//! reconnect timer, the identify queue and the owner's shutdown flag, turns
//! whichever fires first into an [`Input`], and performs the resulting actions.
//!
//! Dispatched events wait in a local backlog until the event channel has room,
//! so a slow consumer never stops the runner from reading heartbeat acks.

use super::IdentifyQueue;
use crate::events::Event;
use crate::heartbeat::HeartbeatMonitor;
use crate::protocol::GatewayMessage;
use crate::session::{Action, ConnectionState, Input, SessionStateMachine};
use crate::socket::{gateway_url, GatewaySocket, SocketEvent};
use chord_common::{ClientError, ClientResult};
use chord_core::ShardInfo;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Buffer for commands queued through a [`ShardHandle`]
const COMMAND_BUFFER: usize = 64;

/// Backlog size that triggers a slow-consumer warning
const BACKLOG_WARN: usize = 1_000;

/// Settings shared by every runner of a manager
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub hello_timeout: Duration,
    pub commands_per_minute: u32,
    pub api_version: u8,
}

/// Owner's view of a running shard
#[derive(Debug, Clone)]
pub struct ShardHandle {
    info: ShardInfo,
    commands: mpsc::Sender<GatewayMessage>,
    state: watch::Receiver<ConnectionState>,
    shutdown: Arc<watch::Sender<bool>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl ShardHandle {
    #[must_use]
    pub fn info(&self) -> ShardInfo {
        self.info
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.info.id()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }

    /// Send a gateway command on this shard's connection
    pub async fn send(&self, message: GatewayMessage) -> ClientResult<()> {
        let state = self.state();
        if state.is_closed() {
            return Err(ClientError::Closed);
        }
        if state != ConnectionState::Connected {
            return Err(ClientError::connectivity(format!("shard {} is {state}", self.id())));
        }
        self.commands.send(message).await.map_err(|_| ClientError::Closed)
    }

    /// Wait until the shard reaches `target`; fails if the runner is gone first
    pub async fn wait_for(&self, target: ConnectionState) -> ClientResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Closed)
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// A live socket and what belongs to it
struct Connection {
    socket: GatewaySocket,
    heartbeat: Option<HeartbeatMonitor>,
    zombie: Option<oneshot::Receiver<()>>,
    hello_deadline: Option<Instant>,
}

impl Connection {
    fn new(socket: GatewaySocket, hello_deadline: Instant) -> Self {
        Self {
            socket,
            heartbeat: None,
            zombie: None,
            hello_deadline: Some(hello_deadline),
        }
    }

    async fn next_input(&mut self) -> Input {
        tokio::select! {
            event = self.socket.recv() => match event {
                SocketEvent::Frame(frame) => Input::Frame(frame),
                SocketEvent::Violation(error) => Input::Violation(error),
                SocketEvent::Closed { code, reason } => Input::SocketClosed { code, reason },
            },
            () = zombie_signal(&mut self.zombie) => Input::HeartbeatTimeout,
            () = sleep_opt(self.hello_deadline) => {
                self.hello_deadline = None;
                Input::HelloTimeout
            }
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        self.zombie = None;
    }

    async fn close(mut self, code: u16) {
        self.stop_heartbeat();
        self.socket.close(code).await;
    }
}

struct PendingIdentify {
    message: GatewayMessage,
    turn: Pin<Box<dyn Future<Output = ()> + Send>>,
}

/// Per-shard event loop
pub struct ShardRunner {
    machine: SessionStateMachine,
    options: RunnerOptions,
    identify_queue: Arc<IdentifyQueue>,
    events: mpsc::Sender<Event>,
    commands: mpsc::Receiver<GatewayMessage>,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<ConnectionState>,
    sequence: watch::Sender<Option<u64>>,
    latency: Arc<Mutex<Option<Duration>>>,

    conn: Option<Connection>,
    reconnect_at: Option<Instant>,
    identify: Option<PendingIdentify>,
    pending: VecDeque<Input>,
    backlog: VecDeque<Event>,
    failure: Option<ClientError>,
}

impl ShardRunner {
    pub fn new(
        machine: SessionStateMachine,
        options: RunnerOptions,
        identify_queue: Arc<IdentifyQueue>,
        events: mpsc::Sender<Event>,
    ) -> (Self, ShardHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(machine.state());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sequence_tx, _) = watch::channel(None);
        let latency = Arc::new(Mutex::new(None));

        let handle = ShardHandle {
            info: machine.shard(),
            commands: command_tx,
            state: state_rx,
            shutdown: Arc::new(shutdown_tx),
            latency: latency.clone(),
        };

        let runner = Self {
            machine,
            options,
            identify_queue,
            events,
            commands: command_rx,
            shutdown: shutdown_rx,
            state: state_tx,
            sequence: sequence_tx,
            latency,
            conn: None,
            reconnect_at: None,
            identify: None,
            pending: VecDeque::new(),
            backlog: VecDeque::new(),
            failure: None,
        };
        (runner, handle)
    }

    fn shard_id(&self) -> u32 {
        self.machine.shard().id()
    }

    /// Run until shutdown (`Ok`) or a fatal error (`Err`)
    pub async fn run(mut self) -> ClientResult<()> {
        info!(shard_id = self.shard_id(), shard = ?self.machine.shard(), "Starting shard");
        self.pending.push_back(Input::Start);

        loop {
            while let Some(input) = self.pending.pop_front() {
                for action in self.machine.handle(input) {
                    self.perform(action).await;
                }
                self.publish();
            }

            if self.machine.state().is_closed() {
                if let Some(conn) = self.conn.take() {
                    conn.close(crate::socket::CLOSE_NORMAL).await;
                }
                self.flush_backlog();
                info!(shard_id = self.shard_id(), "Shard stopped");
                return self.failure.take().map_or(Ok(()), Err);
            }

            let events = self.events.clone();
            let input = tokio::select! {
                biased;
                () = wait_shutdown(&mut self.shutdown) => Input::Shutdown,
                slot = reserve_slot(&events, !self.backlog.is_empty()) => {
                    match slot {
                        Ok(permit) => {
                            if let Some(event) = self.backlog.pop_front() {
                                permit.send(event);
                            }
                        }
                        Err(_) => {
                            debug!(shard_id = self.shard_id(), dropped = self.backlog.len(), "Event receiver dropped");
                            self.backlog.clear();
                        }
                    }
                    continue;
                }
                input = next_input(&mut self.conn) => input,
                () = sleep_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    Input::BackoffElapsed
                }
                () = identify_turn(&mut self.identify) => {
                    if let Some(identify) = self.identify.take() {
                        self.send(identify.message).await;
                    }
                    continue;
                }
                Some(command) = self.commands.recv() => {
                    if self.machine.state() == ConnectionState::Connected {
                        self.send(command).await;
                    } else {
                        warn!(shard_id = self.shard_id(), op = %command.op, "Dropping command, shard not connected");
                    }
                    continue;
                }
            };
            self.pending.push_back(input);
        }
    }

    async fn perform(&mut self, action: Action) {
        match action {
            Action::Connect { url } => self.connect(&url).await,
            Action::StartHeartbeat { interval } => {
                let shard_id = self.shard_id();
                let sequence = self.sequence.subscribe();
                if let Some(conn) = self.conn.as_mut() {
                    conn.hello_deadline = None;
                    let (monitor, zombie) = HeartbeatMonitor::start(
                        shard_id,
                        interval,
                        HeartbeatMonitor::jittered(interval),
                        sequence,
                        conn.socket.sender(),
                    );
                    conn.heartbeat = Some(monitor);
                    conn.zombie = Some(zombie);
                }
            }
            Action::StopHeartbeat => {
                if let Some(conn) = self.conn.as_mut() {
                    conn.stop_heartbeat();
                }
            }
            Action::AckHeartbeat => {
                if let Some(heartbeat) = self.conn.as_ref().and_then(|c| c.heartbeat.as_ref()) {
                    heartbeat.ack();
                    *self.latency.lock() = heartbeat.latency();
                }
            }
            Action::HeartbeatNow => {
                if let Some(heartbeat) = self.conn.as_ref().and_then(|c| c.heartbeat.as_ref()) {
                    heartbeat.request_now();
                }
            }
            Action::Identify(message) => {
                let queue = self.identify_queue.clone();
                let shard = self.machine.shard();
                self.identify = Some(PendingIdentify {
                    message,
                    turn: Box::pin(async move { queue.wait_turn(shard).await }),
                });
            }
            Action::Send(message) => self.send(message).await,
            Action::Dispatch(event) => self.enqueue(event),
            Action::Disconnect { code } => {
                self.identify = None;
                if let Some(conn) = self.conn.take() {
                    conn.close(code).await;
                }
            }
            Action::Wait { delay } => {
                self.reconnect_at = Some(Instant::now() + delay);
            }
            Action::Fail(error) => {
                self.failure = Some(error);
            }
        }
    }

    async fn connect(&mut self, url: &str) {
        let shard_id = self.shard_id();
        let url = gateway_url(url, self.options.api_version);
        let connect = tokio::time::timeout(
            self.options.hello_timeout,
            GatewaySocket::connect(&url, shard_id, self.options.commands_per_minute),
        );

        let input = tokio::select! {
            biased;
            () = wait_shutdown(&mut self.shutdown) => Input::Shutdown,
            result = connect => match result {
                Ok(Ok(socket)) => {
                    self.conn = Some(Connection::new(socket, Instant::now() + self.options.hello_timeout));
                    Input::SocketOpened
                }
                Ok(Err(error)) => Input::ConnectFailed(error),
                Err(_) => Input::ConnectFailed(ClientError::connectivity(format!("connect to {url} timed out"))),
            },
        };
        self.pending.push_back(input);
    }

    async fn send(&mut self, message: GatewayMessage) {
        let Some(conn) = self.conn.as_ref() else {
            debug!(shard_id = self.shard_id(), op = %message.op, "No connection, dropping frame");
            return;
        };
        if let Err(error) = conn.socket.sender().send(message).await {
            warn!(shard_id = self.shard_id(), error = %error, "Failed to queue frame");
        }
    }

    fn enqueue(&mut self, event: Event) {
        if self.backlog.is_empty() {
            match self.events.try_send(event) {
                Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => return,
                Err(mpsc::error::TrySendError::Full(event)) => self.backlog.push_back(event),
            }
        } else {
            self.backlog.push_back(event);
        }
        if self.backlog.len() % BACKLOG_WARN == 0 {
            warn!(shard_id = self.shard_id(), backlog = self.backlog.len(), "Event consumer is falling behind");
        }
    }

    /// Hand over what fits once the shard has stopped
    fn flush_backlog(&mut self) {
        while let Some(event) = self.backlog.pop_front() {
            if let Err(e) = self.events.try_send(event) {
                let dropped = self.backlog.len() + 1;
                debug!(shard_id = self.shard_id(), dropped, error = %e, "Dropping undelivered events");
                self.backlog.clear();
            }
        }
    }

    fn publish(&self) {
        let next = self.machine.state();
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(shard_id = self.shard_id(), from = %previous, to = %next, "Shard state changed");
        }
        self.sequence.send_replace(self.machine.session().sequence);
    }
}

async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped handle also stops the shard
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn reserve_slot(
    events: &mpsc::Sender<Event>,
    ready: bool,
) -> Result<mpsc::Permit<'_, Event>, mpsc::error::SendError<()>> {
    if ready {
        events.reserve().await
    } else {
        std::future::pending().await
    }
}

async fn next_input(conn: &mut Option<Connection>) -> Input {
    match conn {
        Some(conn) => conn.next_input().await,
        None => std::future::pending().await,
    }
}

async fn identify_turn(identify: &mut Option<PendingIdentify>) {
    match identify {
        Some(pending) => pending.turn.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn zombie_signal(zombie: &mut Option<oneshot::Receiver<()>>) {
    if let Some(rx) = zombie.as_mut() {
        let fired = rx.await.is_ok();
        *zombie = None;
        if fired {
            return;
        }
    }
    std::future::pending().await
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
