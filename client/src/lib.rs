//! # Room Client Library
//!
//! Client side of the room: mirrors the server's state, moves the local
//! entity immediately on input and smooths everyone else toward their last
//! reported position.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Every local fixed step the current input is sent to the server and the
//! same displacement is applied to the local entity right away. The server's
//! position for the local entity is kept only as a debug marker; it never
//! corrects the predicted position.
//!
//! ### Interpolation
//! Remote entities are never moved by input. Each render frame they blend a
//! fixed fraction of the way toward their last server position.
//!
//! ### Replica
//! Sync packets rebuild a read-only copy of the room. Packets are applied in
//! sequence order; a gap triggers a resync request and the next full
//! snapshot replaces the mirror.
//!
//! ## Module Organization
//!
//! - `replica`: mirrored room state and sequence checking
//! - `game`: predicted and interpolated render positions
//! - `connection`: join handshake state machine
//! - `session`: ties the above together, transport free
//! - `network`: UDP transport on a background thread
//! - `input`, `rendering`: macroquad keyboard and drawing
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::NetworkClient;
//! use client::session::ClientSession;
//! use shared::Input;
//! use std::time::{Duration, Instant};
//!
//! let mut network = NetworkClient::connect("127.0.0.1:8080", 0).unwrap();
//! let mut session = ClientSession::default();
//!
//! for packet in session.start(Instant::now()) {
//!     network.send(packet);
//! }
//!
//! loop {
//!     let now = Instant::now();
//!     for packet in network.drain() {
//!         for reply in session.handle_packet(packet, now) {
//!             network.send(reply);
//!         }
//!     }
//!
//!     let frame_time = Duration::from_millis(16);
//!     for packet in session.frame(frame_time, Input::default(), now) {
//!         network.send(packet);
//!     }
//!     # break;
//! }
//! ```

pub mod connection;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
pub mod replica;
pub mod session;
