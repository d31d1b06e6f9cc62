//! # Room Server Library
//!
//! Authoritative side of a small real-time room. The server owns the true
//! position of every participant, advances it on a fixed timestep that is
//! independent of packet arrival, and streams only what changed to each
//! connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Inputs received from clients are never applied on receipt. They are
//! appended to the sender's queue and drained, oldest first, inside the next
//! simulation step. Every queued input is applied; none are coalesced.
//!
//! ### Session Lifecycle
//! A join spawns an entity at a random position inside the map, a leave or
//! timeout removes it together with its queued inputs. Disposing the room
//! stops all ticking and releases its state.
//!
//! ### State Synchronization
//! At every patch interval the room compares the world against the last
//! flushed baseline and sends `Add`, `Change` and `Remove` events. A client
//! that just joined (or asked for a resync) receives a full snapshot first,
//! so it never sees a change for an entity it does not know.
//!
//! ## Module Organization
//!
//! - `input_queue`: bounded FIFO of pending inputs with an overflow policy
//! - `world`: entity state store and world-scoped status text
//! - `room`: fixed-step simulator and session lifecycle for one room
//! - `sync`: per-subscriber snapshot and delta generation
//! - `client_manager`: address to session bookkeeping and timeouts
//! - `network`: UDP transport and the single-task room loop
//! - `config`, `error`: settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!
//!     // Runs until a `ServerMessage::Shutdown` arrives on `shutdown_handle()`:
//!     // - receives packets and queues inputs
//!     // - advances the room at 60 Hz
//!     // - flushes state changes every 50 ms
//!     // - drops clients that stay silent past the timeout
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Separate rooms share nothing; run one server per room to host several.

pub mod client_manager;
pub mod config;
pub mod error;
pub mod input_queue;
pub mod network;
pub mod room;
pub mod sync;
pub mod world;
