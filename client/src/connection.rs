//! Two-phase join handshake: `Idle -> Pending -> Joined`, or `Failed`.

use log::{info, warn};
use shared::SessionId;
use std::time::{Duration, Instant};

pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinState {
    Idle,
    Pending {
        started: Instant,
        last_sent: Instant,
        attempts: u32,
    },
    Joined {
        session_id: SessionId,
    },
    Failed {
        reason: String,
    },
}

/// What the caller should do after polling the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    Wait,
    SendJoin,
    /// The handshake just failed; partial state must be released.
    Abort,
}

#[derive(Debug, Clone)]
pub struct JoinHandshake {
    state: JoinState,
    resend_interval: Duration,
    timeout: Duration,
}

impl JoinHandshake {
    pub fn new(resend_interval: Duration, timeout: Duration) -> Self {
        Self {
            state: JoinState::Idle,
            resend_interval,
            timeout,
        }
    }

    /// Starts (or restarts) the handshake. The caller sends the first `Join`.
    pub fn begin(&mut self, now: Instant) {
        self.state = JoinState::Pending {
            started: now,
            last_sent: now,
            attempts: 1,
        };
    }

    pub fn poll(&mut self, now: Instant) -> HandshakeAction {
        let JoinState::Pending {
            started,
            last_sent,
            attempts,
        } = &mut self.state
        else {
            return HandshakeAction::Wait;
        };

        if now.duration_since(*started) >= self.timeout {
            warn!("Join timed out after {} attempts", attempts);
            self.state = JoinState::Failed {
                reason: "Join timed out".to_string(),
            };
            return HandshakeAction::Abort;
        }

        if now.duration_since(*last_sent) >= self.resend_interval {
            *last_sent = now;
            *attempts += 1;
            return HandshakeAction::SendJoin;
        }

        HandshakeAction::Wait
    }

    /// Returns false if no join was pending.
    pub fn on_joined(&mut self, session_id: SessionId) -> bool {
        if !self.is_pending() {
            return false;
        }
        info!("Joined as {}", session_id);
        self.state = JoinState::Joined { session_id };
        true
    }

    pub fn on_rejected(&mut self, reason: &str) -> bool {
        if !self.is_pending() {
            return false;
        }
        warn!("Join rejected: {}", reason);
        self.state = JoinState::Failed {
            reason: reason.to_string(),
        };
        true
    }

    /// Aborts a pending join or forgets an established one.
    pub fn cancel(&mut self) {
        self.state = if self.is_pending() {
            JoinState::Failed {
                reason: "Cancelled".to_string(),
            }
        } else {
            JoinState::Idle
        };
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self.state {
            JoinState::Joined { session_id } => Some(session_id),
            _ => None,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.session_id().is_some()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, JoinState::Pending { .. })
    }
}

impl Default for JoinHandshake {
    fn default() -> Self {
        Self::new(DEFAULT_RESEND_INTERVAL, DEFAULT_JOIN_TIMEOUT)
    }
}
