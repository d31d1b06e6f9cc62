//! Client-side presentation state: prediction for the local entity,
//! smoothing for everyone else.

use crate::replica::ReplicaEvent;
use log::debug;
use shared::{lerp, Input, SessionId};
use std::collections::BTreeMap;

/// One entity as it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderEntity {
    pub id: SessionId,
    /// Displayed position.
    pub x: f32,
    pub y: f32,
    /// Last position reported by the server.
    pub server_x: f32,
    pub server_y: f32,
}

impl RenderEntity {
    pub fn new(id: SessionId, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            server_x: x,
            server_y: y,
        }
    }
}

pub struct ClientGameState {
    entities: BTreeMap<SessionId, RenderEntity>,
    local_id: Option<SessionId>,
    velocity: f32,
    lerp_factor: f32,
}

impl ClientGameState {
    pub fn new(velocity: f32, lerp_factor: f32) -> Self {
        Self {
            entities: BTreeMap::new(),
            local_id: None,
            velocity,
            lerp_factor: lerp_factor.clamp(0.0, 1.0),
        }
    }

    pub fn set_local(&mut self, id: Option<SessionId>) {
        self.local_id = id;
    }

    pub fn local_id(&self) -> Option<SessionId> {
        self.local_id
    }

    /// Mirrors a replica change. Server positions only move the target;
    /// the displayed position is left to prediction or interpolation.
    /// Returns true if the event released an entity.
    pub fn apply_replica_event(&mut self, event: &ReplicaEvent) -> bool {
        match event {
            ReplicaEvent::Added { id, state } => {
                self.entities
                    .entry(*id)
                    .and_modify(|entity| {
                        entity.server_x = state.x;
                        entity.server_y = state.y;
                    })
                    .or_insert_with(|| RenderEntity::new(*id, state.x, state.y));
                false
            }
            ReplicaEvent::Changed { id, state } => {
                if let Some(entity) = self.entities.get_mut(id) {
                    entity.server_x = state.x;
                    entity.server_y = state.y;
                }
                false
            }
            ReplicaEvent::Removed { id } => {
                let released = self.entities.remove(id).is_some();
                if released {
                    debug!("Released render entity {}", id);
                }
                released
            }
            ReplicaEvent::StatusChanged { .. } => false,
        }
    }

    /// Applies one fixed step of local input to the local entity.
    pub fn predict(&mut self, input: &Input) {
        let Some(id) = self.local_id else {
            return;
        };

        if let Some(entity) = self.entities.get_mut(&id) {
            let (dx, dy) = input.displacement(self.velocity);
            entity.x += dx;
            entity.y += dy;
        }
    }

    /// Moves every remote entity one blend step toward its server position.
    pub fn interpolate(&mut self) {
        let t = self.lerp_factor;
        for entity in self.entities.values_mut() {
            if Some(entity.id) == self.local_id {
                continue;
            }
            entity.x = lerp(entity.x, entity.server_x, t);
            entity.y = lerp(entity.y, entity.server_y, t);
        }
    }

    pub fn local(&self) -> Option<&RenderEntity> {
        self.local_id.and_then(|id| self.entities.get(&id))
    }

    /// Server-reported position of the local entity, drawn as a marker only.
    pub fn ghost(&self) -> Option<(f32, f32)> {
        self.local().map(|entity| (entity.server_x, entity.server_y))
    }

    pub fn get(&self, id: &SessionId) -> Option<&RenderEntity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &RenderEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.local_id = None;
    }
}
