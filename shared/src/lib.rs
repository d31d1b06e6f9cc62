use serde::{Deserialize, Serialize};
use std::fmt;

mod timestep;

pub use timestep::FixedTimestep;

pub const MAP_WIDTH: f32 = 800.0;
pub const MAP_HEIGHT: f32 = 600.0;
/// World units moved per applied input, per axis.
pub const VELOCITY: f32 = 2.0;
pub const TICK_RATE: u32 = 60;
pub const INTERPOLATION_FACTOR: f32 = 0.4;
pub const MAX_CLIENTS: usize = 4;
pub const PROTOCOL_VERSION: u32 = 1;
pub const INITIAL_STATUS: &str = "Hello world";
pub const ENTITY_SIZE: f32 = 32.0;

/// Identity of one connection for its lifetime. Never reused after the
/// connection leaves.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Directional intent sampled once per fixed step.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct Input {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl Input {
    pub fn is_idle(&self) -> bool {
        !(self.left || self.right || self.up || self.down)
    }

    /// Displacement produced by this input at `velocity` units per step.
    ///
    /// Opposite directions do not cancel: left beats right and up beats down.
    /// Screen coordinates, so up is negative y.
    pub fn displacement(&self, velocity: f32) -> (f32, f32) {
        let dx = if self.left {
            -velocity
        } else if self.right {
            velocity
        } else {
            0.0
        };

        let dy = if self.up {
            -velocity
        } else if self.down {
            velocity
        } else {
            0.0
        };

        (dx, dy)
    }
}

/// Input as it travels on the wire. Absent flags are treated as released.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputPayload {
    pub left: Option<bool>,
    pub right: Option<bool>,
    pub up: Option<bool>,
    pub down: Option<bool>,
}

impl From<InputPayload> for Input {
    fn from(payload: InputPayload) -> Self {
        Input {
            left: payload.left.unwrap_or(false),
            right: payload.right.unwrap_or(false),
            up: payload.up.unwrap_or(false),
            down: payload.down.unwrap_or(false),
        }
    }
}

impl From<Input> for InputPayload {
    fn from(input: Input) -> Self {
        InputPayload {
            left: Some(input.left),
            right: Some(input.right),
            up: Some(input.up),
            down: Some(input.down),
        }
    }
}

/// Synchronized fields of one entity.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct EntityState {
    pub x: f32,
    pub y: f32,
}

impl EntityState {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn translate(&mut self, input: &Input, velocity: f32) {
        let (dx, dy) = input.displacement(velocity);
        self.x += dx;
        self.y += dy;
    }

    /// Fields that differ from `previous`, or `None` when nothing changed.
    pub fn diff(&self, previous: &EntityState) -> Option<EntityPatch> {
        let patch = EntityPatch {
            x: (self.x != previous.x).then_some(self.x),
            y: (self.y != previous.y).then_some(self.y),
        };

        if patch.is_empty() {
            None
        } else {
            Some(patch)
        }
    }

    pub fn apply(&mut self, patch: &EntityPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
    }
}

/// Changed fields of an entity; untouched fields are `None`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct EntityPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }
}

/// A single mutation of the synchronized room state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum StateEvent {
    Add { id: SessionId, state: EntityState },
    Change { id: SessionId, patch: EntityPatch },
    Remove { id: SessionId },
    Status { text: String },
}

impl StateEvent {
    pub fn entity_id(&self) -> Option<SessionId> {
        match self {
            StateEvent::Add { id, .. } | StateEvent::Change { id, .. } | StateEvent::Remove { id } => {
                Some(*id)
            }
            StateEvent::Status { .. } => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Join {
        client_version: u32,
    },
    Input(InputPayload),
    Message {
        channel: String,
        body: String,
    },
    Resync,
    Leave,

    Joined {
        session_id: SessionId,
    },
    Rejected {
        reason: String,
    },
    /// State events for one subscriber. `seq` is per subscriber and strictly
    /// increasing; `full` packets carry a complete snapshot.
    Sync {
        seq: u32,
        tick: u32,
        full: bool,
        events: Vec<StateEvent>,
    },
}

pub fn lerp(current: f32, target: f32, t: f32) -> f32 {
    current + (target - current) * t
}
