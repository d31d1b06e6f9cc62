//! A single game room: owns the authoritative world, advances it on a fixed
//! timestep and manages the session lifecycle.
//!
//! Everything a room needs lives in this struct and is reached through
//! `&mut self`, so message handling (enqueue) and simulation (drain + apply)
//! can never interleave for the same room. Separate rooms share nothing.

use crate::config::RoomConfig;
use crate::error::{Result, RoomError};
use crate::input_queue::EnqueueOutcome;
use crate::sync::{Outgoing, Synchronizer};
use crate::world::WorldState;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{EntityState, FixedTimestep, Input, SessionId, PROTOCOL_VERSION};
use std::time::Duration;

pub struct Room {
    config: RoomConfig,
    world: WorldState,
    clock: FixedTimestep,
    sync: Synchronizer,
    rng: StdRng,
    next_session_id: u32,
    tick: u32,
    disposed: bool,
}

impl Room {
    pub fn new(config: RoomConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let clock =
            FixedTimestep::from_rate(config.tick_rate).with_max_steps(config.max_catch_up_steps);
        let world = WorldState::new(
            config.initial_status.clone(),
            config.max_queue_depth,
            config.overflow_policy,
        );
        let sync = Synchronizer::new(config.initial_status.clone());

        info!(
            "Room created: {} Hz, max {} clients, {}x{} map",
            config.tick_rate, config.max_clients, config.map_width, config.map_height
        );

        Self {
            config,
            world,
            clock,
            sync,
            rng,
            next_session_id: 1,
            tick: 0,
            disposed: false,
        }
    }

    /// Validates a join request's protocol version before `join`.
    pub fn check_version(client_version: u32) -> Result<()> {
        if client_version == PROTOCOL_VERSION {
            Ok(())
        } else {
            Err(RoomError::VersionMismatch {
                client: client_version,
                server: PROTOCOL_VERSION,
            })
        }
    }

    /// Admits a new session and spawns its entity at a random position
    /// inside the map. The entity reaches every subscriber, including the
    /// new one, as an `Add` on the next flush.
    pub fn join(&mut self) -> Result<SessionId> {
        if self.disposed {
            return Err(RoomError::Disposed);
        }
        if self.world.len() >= self.config.max_clients {
            return Err(RoomError::RoomFull {
                max_clients: self.config.max_clients,
            });
        }

        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;

        let spawn = self.spawn_position();
        self.world.insert(id, spawn);
        self.sync.subscribe(id);

        info!("{} joined at ({:.1}, {:.1})", id, spawn.x, spawn.y);
        Ok(id)
    }

    /// Removes a session's entity and discards its queued inputs. Returns
    /// false for unknown or already removed sessions.
    pub fn leave(&mut self, id: &SessionId) -> bool {
        self.sync.unsubscribe(id);
        match self.world.remove(id) {
            Some(entity) => {
                if !entity.inputs.is_empty() {
                    debug!("{} left with {} queued inputs", id, entity.inputs.len());
                }
                info!("{} left", id);
                true
            }
            None => false,
        }
    }

    /// Queues an input for the next tick. Never touches position directly.
    pub fn enqueue_input(&mut self, id: &SessionId, input: Input) -> bool {
        if self.disposed {
            return false;
        }

        match self.world.enqueue(id, input) {
            Some(EnqueueOutcome::Queued) => true,
            Some(EnqueueOutcome::DroppedOldest(_)) => {
                warn!("Input queue full for {}, dropped oldest input", id);
                true
            }
            Some(EnqueueOutcome::Rejected) => {
                warn!("Input queue full for {}, rejected input", id);
                false
            }
            None => {
                debug!("Input for unknown session {} ignored", id);
                false
            }
        }
    }

    /// Handles a free-form message on a named channel.
    pub fn handle_message(&mut self, id: &SessionId, channel: &str, body: &str) -> bool {
        if !self.world.contains(id) {
            debug!("Message from unknown session {} ignored", id);
            return false;
        }
        info!("{} sent '{}' message ({} bytes)", id, channel, body.len());
        true
    }

    /// Feeds real elapsed time into the accumulator and runs every step that
    /// became due. Returns the number of steps run.
    pub fn update(&mut self, delta: Duration) -> u32 {
        if self.disposed {
            return 0;
        }

        let steps = self.clock.advance(delta);
        let dropped = self.clock.dropped_last_advance();
        if dropped > 0 {
            warn!(
                "Simulation fell behind by {:?}, ran {} steps and dropped {}",
                delta, steps, dropped
            );
        }

        for _ in 0..steps {
            self.fixed_tick();
        }
        steps
    }

    /// One simulation step: every live entity drains its own queue and
    /// applies the inputs oldest first.
    pub fn fixed_tick(&mut self) {
        let velocity = self.config.velocity;
        let mut applied = 0;
        for entity in self.world.entities_mut() {
            applied += entity.apply_pending(velocity);
        }

        self.tick = self.tick.wrapping_add(1);
        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: {} entities, {} inputs applied",
                self.tick,
                self.world.len(),
                applied
            );
        }
    }

    /// Packets carrying everything that changed since the previous flush.
    pub fn collect_sync(&mut self) -> Vec<Outgoing> {
        if self.disposed {
            return Vec::new();
        }
        self.sync.flush(&self.world, self.tick)
    }

    /// Schedules a full snapshot for a session whose replica fell out of step.
    pub fn request_resync(&mut self, id: &SessionId) -> bool {
        let scheduled = self.sync.request_snapshot(id);
        if scheduled {
            debug!("Full snapshot scheduled for {}", id);
        }
        scheduled
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.world.set_status(status);
    }

    /// Releases all state; no further ticks or packets are produced.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        info!("Room disposing after {} ticks", self.tick);
        self.world.clear();
        self.sync.clear();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    fn spawn_position(&mut self) -> EntityState {
        let x = self.rng.gen_range(0.0..self.config.map_width);
        let y = self.rng.gen_range(0.0..self.config.map_height);
        EntityState::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_queue::OverflowPolicy;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Packet, StateEvent};

    fn room() -> Room {
        Room::new(RoomConfig {
            seed: Some(7),
            ..RoomConfig::default()
        })
    }

    fn left() -> Input {
        Input {
            left: true,
            ..Input::default()
        }
    }

    fn step(room: &Room) -> Duration {
        room.clock.step()
    }

    #[test]
    fn test_join_spawns_inside_map() {
        let mut room = room();
        for _ in 0..4 {
            let id = room.join().unwrap();
            let state = room.world().get(&id).unwrap().state;
            assert!((0.0..800.0).contains(&state.x));
            assert!((0.0..600.0).contains(&state.y));
        }
    }

    #[test]
    fn test_session_ids_never_reused() {
        let mut room = room();
        let first = room.join().unwrap();
        assert!(room.leave(&first));
        let second = room.join().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_room_full() {
        let mut room = room();
        for _ in 0..4 {
            room.join().unwrap();
        }
        assert_eq!(room.join(), Err(RoomError::RoomFull { max_clients: 4 }));
    }

    #[test]
    fn test_version_check() {
        assert!(Room::check_version(PROTOCOL_VERSION).is_ok());
        assert_eq!(
            Room::check_version(99),
            Err(RoomError::VersionMismatch {
                client: 99,
                server: PROTOCOL_VERSION
            })
        );
    }

    #[test]
    fn test_enqueue_does_not_move_entity() {
        let mut room = room();
        let id = room.join().unwrap();
        let before = room.world().get(&id).unwrap().state;

        assert!(room.enqueue_input(&id, left()));
        assert_eq!(room.world().get(&id).unwrap().state, before);
    }

    #[test]
    fn test_queued_inputs_all_applied_next_tick() {
        let mut room = room();
        let id = room.join().unwrap();
        let before = room.world().get(&id).unwrap().state;

        for _ in 0..3 {
            room.enqueue_input(&id, left());
        }
        let delta = step(&room);
        assert_eq!(room.update(delta), 1);

        let after = room.world().get(&id).unwrap().state;
        assert_approx_eq!(after.x, before.x - 6.0, 1e-3);
        assert_approx_eq!(after.y, before.y, 1e-3);
    }

    #[test]
    fn test_same_result_regardless_of_delta_chunking() {
        let mut single = room();
        let mut split = room();
        let a = single.join().unwrap();
        let b = split.join().unwrap();

        for _ in 0..2 {
            single.enqueue_input(&a, left());
            split.enqueue_input(&b, left());
        }

        assert_eq!(single.update(Duration::from_micros(33_400)), 2);
        let steps =
            split.update(Duration::from_micros(16_700)) + split.update(Duration::from_micros(16_700));
        assert_eq!(steps, 2);

        assert_eq!(
            single.world().get(&a).unwrap().state,
            split.world().get(&b).unwrap().state
        );
        assert_eq!(single.tick(), split.tick());
    }

    #[test]
    fn test_no_step_without_enough_time() {
        let mut room = room();
        let id = room.join().unwrap();
        room.enqueue_input(&id, left());
        assert_eq!(room.update(Duration::from_millis(5)), 0);
        assert_eq!(room.world().get(&id).unwrap().inputs.len(), 1);
    }

    #[test]
    fn test_catch_up_cap_counts_only_discarded_steps() {
        let mut room = Room::new(RoomConfig {
            seed: Some(7),
            max_catch_up_steps: Some(3),
            ..RoomConfig::default()
        });

        let delta = step(&room) * 3;
        assert_eq!(room.update(delta), 3);
        assert_eq!(room.clock.dropped_last_advance(), 0);

        let delta = step(&room) * 5;
        assert_eq!(room.update(delta), 3);
        assert_eq!(room.clock.dropped_last_advance(), 2);
        assert_eq!(room.tick(), 6);
    }

    #[test]
    fn test_input_for_departed_session_is_ignored() {
        let mut room = room();
        let id = room.join().unwrap();
        room.enqueue_input(&id, left());
        room.leave(&id);

        assert!(!room.enqueue_input(&id, left()));
        let delta = step(&room);
        assert_eq!(room.update(delta), 1);
        assert!(!room.leave(&id));
    }

    #[test]
    fn test_overflow_reject_policy() {
        let mut room = Room::new(RoomConfig {
            seed: Some(1),
            max_queue_depth: Some(2),
            overflow_policy: OverflowPolicy::RejectNewest,
            ..RoomConfig::default()
        });
        let id = room.join().unwrap();
        assert!(room.enqueue_input(&id, left()));
        assert!(room.enqueue_input(&id, left()));
        assert!(!room.enqueue_input(&id, left()));
    }

    #[test]
    fn test_flush_after_join_and_leave() {
        let mut room = room();
        let a = room.join().unwrap();
        room.collect_sync();

        let b = room.join().unwrap();
        let out = room.collect_sync();
        assert_eq!(out.len(), 2);

        room.leave(&b);
        let out = room.collect_sync();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, a);
        match &out[0].packet {
            Packet::Sync { events, .. } => {
                assert_eq!(events, &vec![StateEvent::Remove { id: b }]);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_named_message() {
        let mut room = room();
        let id = room.join().unwrap();
        assert!(room.handle_message(&id, "type", "hello"));
        assert!(!room.handle_message(&SessionId(99), "type", "hello"));
    }

    #[test]
    fn test_dispose_stops_everything() {
        let mut room = room();
        let id = room.join().unwrap();
        room.enqueue_input(&id, left());
        room.dispose();

        assert!(room.is_disposed());
        assert!(room.is_empty());
        assert_eq!(room.update(Duration::from_secs(1)), 0);
        assert!(room.collect_sync().is_empty());
        assert_eq!(room.join(), Err(RoomError::Disposed));
        assert!(!room.enqueue_input(&id, left()));
    }
}
