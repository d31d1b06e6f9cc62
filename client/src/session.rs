//! Drives the handshake, replica and presentation state from packets and
//! frames. Returns the packets to send instead of touching a socket, so the
//! whole client flow can run without a network or a window.

use crate::connection::{HandshakeAction, JoinHandshake, JoinState};
use crate::game::ClientGameState;
use crate::replica::Replica;
use log::{debug, info, warn};
use shared::{
    FixedTimestep, Input, Packet, SessionId, INTERPOLATION_FACTOR, PROTOCOL_VERSION, TICK_RATE,
    VELOCITY,
};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Units moved per predicted step.
    pub velocity: f32,
    /// Blend factor applied to remote entities every frame.
    pub lerp_factor: f32,
    pub tick_rate: u32,
    pub join_resend_interval: Duration,
    pub join_timeout: Duration,
    /// Minimum spacing between two `Resync` requests.
    pub resync_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            velocity: VELOCITY,
            lerp_factor: INTERPOLATION_FACTOR,
            tick_rate: TICK_RATE,
            join_resend_interval: crate::connection::DEFAULT_RESEND_INTERVAL,
            join_timeout: crate::connection::DEFAULT_JOIN_TIMEOUT,
            resync_interval: Duration::from_millis(250),
        }
    }
}

pub struct ClientSession {
    handshake: JoinHandshake,
    replica: Replica,
    game: ClientGameState,
    clock: FixedTimestep,
    resync_interval: Duration,
    last_resync: Option<Instant>,
}

impl ClientSession {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            handshake: JoinHandshake::new(config.join_resend_interval, config.join_timeout),
            replica: Replica::new(),
            game: ClientGameState::new(config.velocity, config.lerp_factor),
            clock: FixedTimestep::from_rate(config.tick_rate),
            resync_interval: config.resync_interval,
            last_resync: None,
        }
    }

    /// Begins the join handshake.
    pub fn start(&mut self, now: Instant) -> Vec<Packet> {
        info!("Joining room...");
        self.reset();
        self.handshake.begin(now);
        vec![Self::join_packet()]
    }

    fn join_packet() -> Packet {
        Packet::Join {
            client_version: PROTOCOL_VERSION,
        }
    }

    /// Processes one packet from the server; returns any replies.
    pub fn handle_packet(&mut self, packet: Packet, now: Instant) -> Vec<Packet> {
        match packet {
            Packet::Joined { session_id } => {
                if self.handshake.on_joined(session_id) {
                    self.game.set_local(Some(session_id));
                    self.clock.reset();
                    // Give the first snapshot one resync interval to arrive
                    self.last_resync = Some(now);
                } else {
                    debug!("Duplicate join confirmation for {}", session_id);
                }
                Vec::new()
            }

            Packet::Rejected { reason } => {
                if self.handshake.on_rejected(&reason) {
                    self.release();
                }
                Vec::new()
            }

            Packet::Sync {
                seq,
                tick,
                full,
                events,
            } => {
                if !self.handshake.is_joined() {
                    debug!("Sync {} received before join, ignored", seq);
                    return Vec::new();
                }

                match self.replica.apply_sync(seq, tick, full, &events) {
                    Ok(changes) => {
                        for change in &changes {
                            self.game.apply_replica_event(change);
                        }
                        if full {
                            self.last_resync = None;
                        }
                        Vec::new()
                    }
                    Err(e) => {
                        warn!("{}", e);
                        self.request_resync(now)
                    }
                }
            }

            other => {
                warn!("Unexpected packet from server: {:?}", other);
                Vec::new()
            }
        }
    }

    fn request_resync(&mut self, now: Instant) -> Vec<Packet> {
        let due = self
            .last_resync
            .map_or(true, |sent| now.duration_since(sent) >= self.resync_interval);
        if !due {
            return Vec::new();
        }

        self.last_resync = Some(now);
        vec![Packet::Resync]
    }

    /// Runs one render frame: polls the handshake, runs every due fixed step
    /// (send input, predict) and blends remote entities once.
    pub fn frame(&mut self, delta: Duration, input: Input, now: Instant) -> Vec<Packet> {
        let mut outgoing = Vec::new();

        match self.handshake.poll(now) {
            HandshakeAction::SendJoin => outgoing.push(Self::join_packet()),
            HandshakeAction::Abort => self.release(),
            HandshakeAction::Wait => {}
        }

        if self.handshake.is_joined() && !self.replica.is_synced() {
            outgoing.extend(self.request_resync(now));
        }

        if self.handshake.is_joined() {
            let steps = self.clock.advance(delta);
            for _ in 0..steps {
                outgoing.push(Packet::Input(input.into()));
                self.game.predict(&input);
            }
        }

        self.game.interpolate();
        outgoing
    }

    /// Leaves the room, returning the packet to notify the server with.
    pub fn leave(&mut self) -> Option<Packet> {
        let was_joined = self.handshake.is_joined();
        self.handshake.cancel();
        self.release();
        was_joined.then_some(Packet::Leave)
    }

    fn release(&mut self) {
        self.replica.clear();
        self.game.clear();
        self.clock.reset();
        self.last_resync = None;
    }

    fn reset(&mut self) {
        self.release();
        self.handshake.cancel();
    }

    pub fn join_state(&self) -> &JoinState {
        self.handshake.state()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.handshake.session_id()
    }

    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    pub fn game(&self) -> &ClientGameState {
        &self.game
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
