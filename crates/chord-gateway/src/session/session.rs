//! Session data
//!
//! What a shard remembers between connections so it can resume instead of
//! identifying again.

use chord_core::ShardInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub shard: ShardInfo,
    pub session_id: Option<String>,
    /// Last dispatch sequence seen
    pub sequence: Option<u64>,
    /// Gateway URL to use when resuming
    pub resume_url: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(shard: ShardInfo) -> Self {
        Self {
            shard,
            session_id: None,
            sequence: None,
            resume_url: None,
        }
    }

    /// Record a dispatch sequence number; the stored value never decreases
    pub fn update_sequence(&mut self, seq: u64) {
        self.sequence = Some(self.sequence.map_or(seq, |current| current.max(seq)));
    }

    pub fn record_ready(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        if resume_url.is_some() {
            self.resume_url = resume_url;
        }
    }

    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Forget the session; the next handshake is a fresh Identify
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.sequence = None;
        self.resume_url = None;
    }
}
