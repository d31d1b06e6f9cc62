//! State synchronization: turns room state into per-subscriber packets.
//!
//! Every flush compares the current world against the baseline captured at
//! the previous flush and emits `Add`, `Change` (changed fields only) and
//! `Remove` events. A subscriber that has not yet seen the world, or that
//! asked for a resync, receives a full snapshot instead of the delta, so no
//! `Change` ever reaches a client before the matching `Add`.

use crate::world::WorldState;
use log::debug;
use shared::{EntityState, Packet, SessionId, StateEvent};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Subscriber {
    next_seq: u32,
    needs_snapshot: bool,
}

/// A packet addressed to one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: SessionId,
    pub packet: Packet,
}

#[derive(Debug, Clone)]
pub struct Synchronizer {
    baseline: BTreeMap<SessionId, EntityState>,
    baseline_status: String,
    subscribers: BTreeMap<SessionId, Subscriber>,
}

impl Synchronizer {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            baseline: BTreeMap::new(),
            baseline_status: status.into(),
            subscribers: BTreeMap::new(),
        }
    }

    /// Starts delivering state to `id`. Its first packet is a full snapshot.
    pub fn subscribe(&mut self, id: SessionId) {
        self.subscribers.insert(
            id,
            Subscriber {
                next_seq: 0,
                needs_snapshot: true,
            },
        );
    }

    pub fn unsubscribe(&mut self, id: &SessionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// Schedules a full snapshot for a subscriber whose replica lost track.
    pub fn request_snapshot(&mut self, id: &SessionId) -> bool {
        match self.subscribers.get_mut(id) {
            Some(subscriber) => {
                subscriber.needs_snapshot = true;
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, id: &SessionId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Events describing how `world` differs from the last flushed baseline.
    pub fn pending_changes(&self, world: &WorldState) -> Vec<StateEvent> {
        let mut events = diff_states(&self.baseline, &world.snapshot());
        if world.status() != self.baseline_status {
            events.push(StateEvent::Status {
                text: world.status().to_string(),
            });
        }
        events
    }

    /// Builds this flush's packets and advances the baseline to `world`.
    ///
    /// Subscribers awaiting a snapshot get a full packet; everyone else gets
    /// the delta, or nothing when nothing changed.
    pub fn flush(&mut self, world: &WorldState, tick: u32) -> Vec<Outgoing> {
        let delta = self.pending_changes(world);
        let mut snapshot: Option<Vec<StateEvent>> = None;
        let mut outgoing = Vec::new();

        for (id, subscriber) in self.subscribers.iter_mut() {
            let (full, events) = if subscriber.needs_snapshot {
                let events = snapshot
                    .get_or_insert_with(|| world.snapshot_events())
                    .clone();
                subscriber.needs_snapshot = false;
                (true, events)
            } else if !delta.is_empty() {
                (false, delta.clone())
            } else {
                continue;
            };

            let seq = subscriber.next_seq;
            subscriber.next_seq = subscriber.next_seq.wrapping_add(1);
            debug!(
                "Sync to {}: seq {} full {} ({} events)",
                id,
                seq,
                full,
                events.len()
            );

            outgoing.push(Outgoing {
                to: *id,
                packet: Packet::Sync {
                    seq,
                    tick,
                    full,
                    events,
                },
            });
        }

        self.baseline = world.snapshot();
        self.baseline_status = world.status().to_string();
        outgoing
    }

    pub fn clear(&mut self) {
        self.baseline.clear();
        self.subscribers.clear();
    }
}

/// Removals first, then additions and field changes in id order.
pub fn diff_states(
    previous: &BTreeMap<SessionId, EntityState>,
    current: &BTreeMap<SessionId, EntityState>,
) -> Vec<StateEvent> {
    let mut events: Vec<StateEvent> = previous
        .keys()
        .filter(|id| !current.contains_key(id))
        .map(|id| StateEvent::Remove { id: *id })
        .collect();

    for (id, state) in current {
        match previous.get(id) {
            None => events.push(StateEvent::Add {
                id: *id,
                state: *state,
            }),
            Some(before) => {
                if let Some(patch) = state.diff(before) {
                    events.push(StateEvent::Change { id: *id, patch });
                }
            }
        }
    }

    events
}
