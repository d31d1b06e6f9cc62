//! Room and server settings
//!
//! Built from command-line flags in `main.rs`; `Default` mirrors the
//! behaviour of a stock room (4 clients, 800x600 map, 60 Hz, 50 ms patches).

use crate::input_queue::OverflowPolicy;
use shared::{INITIAL_STATUS, MAP_HEIGHT, MAP_WIDTH, MAX_CLIENTS, TICK_RATE, VELOCITY};
use std::time::Duration;

/// Two seconds of input at 60 Hz.
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 120;
pub const DEFAULT_MAX_CATCH_UP_STEPS: u32 = 30;

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub max_clients: usize,
    pub map_width: f32,
    pub map_height: f32,
    pub velocity: f32,
    pub tick_rate: u32,
    /// Upper bound on simulation steps run by one `update` call.
    pub max_catch_up_steps: Option<u32>,
    /// `None` keeps input queues unbounded.
    pub max_queue_depth: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub initial_status: String,
    /// Fixed seed for spawn positions; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_clients: MAX_CLIENTS,
            map_width: MAP_WIDTH,
            map_height: MAP_HEIGHT,
            velocity: VELOCITY,
            tick_rate: TICK_RATE,
            max_catch_up_steps: Some(DEFAULT_MAX_CATCH_UP_STEPS),
            max_queue_depth: Some(DEFAULT_MAX_QUEUE_DEPTH),
            overflow_policy: OverflowPolicy::DropOldest,
            initial_status: INITIAL_STATUS.to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How often state changes are flushed to clients.
    pub patch_interval: Duration,
    pub client_timeout: Duration,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            patch_interval: Duration::from_millis(50),
            client_timeout: Duration::from_secs(5),
            room: RoomConfig::default(),
        }
    }
}
