//! Heartbeat monitor
//!
//! Keeps one connection alive. The first beat waits a random fraction of the
//! interval, then beats follow on a fixed schedule. A scheduled beat that finds
//! the previous scheduled one still unacknowledged marks the connection as a
//! zombie: the monitor fires its signal once and stops beating. Beats the
//! gateway asks for are sent in between and never count toward that check.

use crate::socket::SocketSender;
use crate::protocol::GatewayMessage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

/// Heartbeat bookkeeping for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatState {
    pub interval: Duration,
    pub last_sent: Option<Instant>,
    pub last_ack: Option<Instant>,
    /// A scheduled beat is still unacknowledged
    pub awaiting_ack: bool,
    /// A requested beat is still unacknowledged
    pub awaiting_requested: bool,
    pub missed_acks: u32,
    /// Round trip of the last acknowledged beat
    pub latency: Option<Duration>,
}

impl HeartbeatState {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            last_ack: None,
            awaiting_ack: false,
            awaiting_requested: false,
            missed_acks: 0,
            latency: None,
        }
    }

    pub fn record_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
        self.awaiting_ack = true;
    }

    /// A beat sent because the gateway asked for one
    pub fn record_requested(&mut self, now: Instant) {
        self.last_sent = Some(now);
        self.awaiting_requested = true;
    }

    pub fn record_ack(&mut self, now: Instant) {
        if self.awaiting_ack || self.awaiting_requested {
            self.latency = self.last_sent.map(|sent| now.saturating_duration_since(sent));
        }
        self.last_ack = Some(now);
        self.awaiting_ack = false;
        self.awaiting_requested = false;
        self.missed_acks = 0;
    }

    /// Called when the next beat is due; true if the previous beat was never acked
    pub fn check_zombie(&mut self) -> bool {
        if self.awaiting_ack {
            self.missed_acks += 1;
            true
        } else {
            false
        }
    }
}

/// Drives heartbeats for one connection
pub struct HeartbeatMonitor {
    state: Arc<Mutex<HeartbeatState>>,
    beat_now: Arc<Notify>,
    task: JoinHandle<()>,
}

impl HeartbeatMonitor {
    /// Start beating on `sender`
    ///
    /// `sequence` always holds the last sequence number the session saw. The
    /// returned receiver resolves once if the connection turns zombie.
    pub fn start(
        shard_id: u32,
        interval: Duration,
        first_delay: Duration,
        sequence: watch::Receiver<Option<u64>>,
        sender: SocketSender,
    ) -> (Self, oneshot::Receiver<()>) {
        let state = Arc::new(Mutex::new(HeartbeatState::new(interval)));
        let beat_now = Arc::new(Notify::new());
        let (zombie_tx, zombie_rx) = oneshot::channel();

        debug!(shard_id, interval_ms = interval.as_millis() as u64, "Starting heartbeat");

        let task = tokio::spawn(beat_loop(
            shard_id,
            first_delay,
            state.clone(),
            beat_now.clone(),
            sequence,
            sender,
            zombie_tx,
        ));

        (
            Self {
                state,
                beat_now,
                task,
            },
            zombie_rx,
        )
    }

    /// Random first delay in `[0, interval)`
    #[must_use]
    pub fn jittered(interval: Duration) -> Duration {
        interval.mul_f64(rand::random::<f64>())
    }

    /// Record an acknowledgement
    pub fn ack(&self) {
        self.state.lock().record_ack(Instant::now());
    }

    /// Beat immediately without moving the schedule
    pub fn request_now(&self) {
        self.beat_now.notify_one();
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.state.lock().latency
    }

    #[must_use]
    pub fn state(&self) -> HeartbeatState {
        self.state.lock().clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn beat_loop(
    shard_id: u32,
    first_delay: Duration,
    state: Arc<Mutex<HeartbeatState>>,
    beat_now: Arc<Notify>,
    sequence: watch::Receiver<Option<u64>>,
    sender: SocketSender,
    zombie: oneshot::Sender<()>,
) {
    let interval = state.lock().interval;
    let mut next = Instant::now() + first_delay;

    loop {
        let scheduled = tokio::select! {
            () = sleep_until(next) => {
                if state.lock().check_zombie() {
                    warn!(shard_id, "Heartbeat not acknowledged, connection is a zombie");
                    let _ = zombie.send(());
                    return;
                }
                next += interval;
                true
            }
            () = beat_now.notified() => {
                trace!(shard_id, "Heartbeat requested");
                false
            }
        };

        let seq = *sequence.borrow();
        if sender.send_priority(GatewayMessage::heartbeat(seq)).await.is_err() {
            debug!(shard_id, "Socket gone, stopping heartbeat");
            return;
        }
        let now = Instant::now();
        if scheduled {
            state.lock().record_sent(now);
        } else {
            state.lock().record_requested(now);
        }
        trace!(shard_id, seq = ?seq, scheduled, "Heartbeat sent");
    }
}
