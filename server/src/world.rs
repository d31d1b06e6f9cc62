//! Authoritative room state: one entity per connected session plus the
//! world-scoped status text.

use crate::input_queue::{EnqueueOutcome, InputQueue, OverflowPolicy};
use shared::{EntityState, Input, SessionId, StateEvent};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: SessionId,
    pub state: EntityState,
    pub inputs: InputQueue,
}

impl Entity {
    pub fn new(id: SessionId, state: EntityState, inputs: InputQueue) -> Self {
        Self { id, state, inputs }
    }

    /// Drains the queue and applies every input in order. Returns how many
    /// inputs were applied.
    pub fn apply_pending(&mut self, velocity: f32) -> usize {
        let inputs = self.inputs.drain_all();
        for input in &inputs {
            self.state.translate(input, velocity);
        }
        inputs.len()
    }
}

/// Session ids are allocated in increasing order, so iterating the map
/// visits entities in join order and snapshots serialize reproducibly.
#[derive(Debug, Clone)]
pub struct WorldState {
    entities: BTreeMap<SessionId, Entity>,
    status: String,
    max_queue_depth: Option<usize>,
    overflow_policy: OverflowPolicy,
}

impl WorldState {
    pub fn new(status: impl Into<String>, max_queue_depth: Option<usize>, overflow_policy: OverflowPolicy) -> Self {
        Self {
            entities: BTreeMap::new(),
            status: status.into(),
            max_queue_depth,
            overflow_policy,
        }
    }

    /// Inserts a fresh entity. Returns false if the id is already present.
    pub fn insert(&mut self, id: SessionId, state: EntityState) -> bool {
        if self.entities.contains_key(&id) {
            return false;
        }

        let inputs = InputQueue::new(self.max_queue_depth, self.overflow_policy);
        self.entities.insert(id, Entity::new(id, state, inputs));
        true
    }

    /// Removes an entity together with its pending inputs.
    pub fn remove(&mut self, id: &SessionId) -> Option<Entity> {
        self.entities.remove(id)
    }

    /// Queues an input for `id`; `None` when the entity no longer exists.
    pub fn enqueue(&mut self, id: &SessionId, input: Input) -> Option<EnqueueOutcome> {
        self.entities
            .get_mut(id)
            .map(|entity| entity.inputs.enqueue(input))
    }

    pub fn get(&self, id: &SessionId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Synchronized fields of every live entity, in join order.
    pub fn snapshot(&self) -> BTreeMap<SessionId, EntityState> {
        self.entities
            .iter()
            .map(|(id, entity)| (*id, entity.state))
            .collect()
    }

    /// Full-state events: status first, then an `Add` per live entity.
    pub fn snapshot_events(&self) -> Vec<StateEvent> {
        let mut events = Vec::with_capacity(self.entities.len() + 1);
        events.push(StateEvent::Status {
            text: self.status.clone(),
        });
        events.extend(self.entities.iter().map(|(id, entity)| StateEvent::Add {
            id: *id,
            state: entity.state,
        }));
        events
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
