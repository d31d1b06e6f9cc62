//! Error types for room operations

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room is full ({max_clients} clients)")]
    RoomFull { max_clients: usize },

    #[error("Room has been disposed")]
    Disposed,

    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u32, server: u32 },
}

pub type Result<T> = std::result::Result<T, RoomError>;
