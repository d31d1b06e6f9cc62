//! Read-only mirror of the room state, rebuilt from `Sync` packets
//!
//! Packets are applied strictly in sequence order. A full snapshot resets
//! the sequence and reconciles the key set; a delta is only applied when it
//! directly follows the last accepted packet. Anything older is a duplicate
//! and is ignored.

use log::debug;
use shared::{EntityState, SessionId, StateEvent, INITIAL_STATUS};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("Sequence gap: expected {expected}, received {received}")]
    SequenceGap { expected: u32, received: u32 },

    #[error("Delta {seq} received while waiting for a full snapshot")]
    AwaitingSnapshot { seq: u32 },
}

/// What changed in the replica, in the order it was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicaEvent {
    Added { id: SessionId, state: EntityState },
    Changed { id: SessionId, state: EntityState },
    Removed { id: SessionId },
    StatusChanged { text: String },
}

#[derive(Debug, Clone)]
pub struct Replica {
    entities: BTreeMap<SessionId, EntityState>,
    status: String,
    /// `None` until the first full snapshot, and again after a gap.
    next_seq: Option<u32>,
    last_tick: u32,
}

impl Replica {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            status: INITIAL_STATUS.to_string(),
            next_seq: None,
            last_tick: 0,
        }
    }

    /// Applies one `Sync` packet and returns the resulting changes.
    pub fn apply_sync(
        &mut self,
        seq: u32,
        tick: u32,
        full: bool,
        events: &[StateEvent],
    ) -> Result<Vec<ReplicaEvent>, ReplicaError> {
        if full {
            return Ok(self.apply_snapshot(seq, tick, events));
        }

        let expected = self.next_seq.ok_or(ReplicaError::AwaitingSnapshot { seq })?;
        if seq < expected {
            debug!("Ignoring stale delta {} (expected {})", seq, expected);
            return Ok(Vec::new());
        }
        if seq > expected {
            self.next_seq = None;
            return Err(ReplicaError::SequenceGap {
                expected,
                received: seq,
            });
        }

        let mut changes = Vec::with_capacity(events.len());
        for event in events {
            self.apply_event(event, &mut changes);
        }

        self.next_seq = Some(seq.wrapping_add(1));
        self.last_tick = tick;
        Ok(changes)
    }

    fn apply_snapshot(&mut self, seq: u32, tick: u32, events: &[StateEvent]) -> Vec<ReplicaEvent> {
        if let Some(expected) = self.next_seq {
            if seq < expected {
                debug!("Ignoring stale snapshot {} (expected {})", seq, expected);
                return Vec::new();
            }
        }

        let mut entities = BTreeMap::new();
        let mut status = None;
        for event in events {
            match event {
                StateEvent::Add { id, state } => {
                    entities.insert(*id, *state);
                }
                StateEvent::Status { text } => status = Some(text.clone()),
                other => debug!("Unexpected event in snapshot: {:?}", other),
            }
        }

        let mut changes = Vec::new();
        let removed: Vec<SessionId> = self
            .entities
            .keys()
            .filter(|id| !entities.contains_key(id))
            .copied()
            .collect();
        for id in removed {
            self.entities.remove(&id);
            changes.push(ReplicaEvent::Removed { id });
        }

        for (id, state) in entities {
            match self.entities.insert(id, state) {
                None => changes.push(ReplicaEvent::Added { id, state }),
                Some(previous) if previous != state => {
                    changes.push(ReplicaEvent::Changed { id, state })
                }
                Some(_) => {}
            }
        }

        if let Some(text) = status {
            if text != self.status {
                self.status = text.clone();
                changes.push(ReplicaEvent::StatusChanged { text });
            }
        }

        self.next_seq = Some(seq.wrapping_add(1));
        self.last_tick = tick;
        changes
    }

    fn apply_event(&mut self, event: &StateEvent, changes: &mut Vec<ReplicaEvent>) {
        match event {
            StateEvent::Add { id, state } => match self.entities.insert(*id, *state) {
                None => changes.push(ReplicaEvent::Added {
                    id: *id,
                    state: *state,
                }),
                Some(_) => changes.push(ReplicaEvent::Changed {
                    id: *id,
                    state: *state,
                }),
            },
            StateEvent::Change { id, patch } => match self.entities.get_mut(id) {
                Some(state) => {
                    state.apply(patch);
                    changes.push(ReplicaEvent::Changed {
                        id: *id,
                        state: *state,
                    });
                }
                None => debug!("Change for unknown entity {} ignored", id),
            },
            StateEvent::Remove { id } => {
                if self.entities.remove(id).is_some() {
                    changes.push(ReplicaEvent::Removed { id: *id });
                } else {
                    debug!("Remove for unknown entity {} ignored", id);
                }
            }
            StateEvent::Status { text } => {
                if *text != self.status {
                    self.status = text.clone();
                    changes.push(ReplicaEvent::StatusChanged { text: text.clone() });
                }
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&EntityState> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> &BTreeMap<SessionId, EntityState> {
        &self.entities
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// True once a snapshot has been applied and no gap is outstanding.
    pub fn is_synced(&self) -> bool {
        self.next_seq.is_some()
    }

    pub fn last_tick(&self) -> u32 {
        self.last_tick
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}
