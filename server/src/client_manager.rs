//! Transport-side bookkeeping for connected clients
//!
//! Maps network addresses to room sessions and tracks activity so silent
//! clients can be timed out. Capacity and entity state belong to the room;
//! this module only knows who is on the other end of the socket.

use log::info;
use shared::SessionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A client that completed the join handshake.
#[derive(Debug)]
pub struct Connection {
    pub session_id: SessionId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Connection {
    pub fn new(session_id: SessionId, addr: SocketAddr) -> Self {
        Self {
            session_id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True if nothing has been received within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    connections: HashMap<SessionId, Connection>,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            timeout,
        }
    }

    pub fn add_client(&mut self, session_id: SessionId, addr: SocketAddr) {
        info!("Client {} connected from {}", session_id, addr);
        self.connections
            .insert(session_id, Connection::new(session_id, addr));
    }

    /// Returns true if the client was found and removed.
    pub fn remove_client(&mut self, session_id: &SessionId) -> bool {
        if let Some(connection) = self.connections.remove(session_id) {
            info!(
                "Client {} at {} disconnected",
                connection.session_id, connection.addr
            );
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<SessionId> {
        self.connections
            .values()
            .find(|connection| connection.addr == addr)
            .map(|connection| connection.session_id)
    }

    pub fn addr_of(&self, session_id: &SessionId) -> Option<SocketAddr> {
        self.connections
            .get(session_id)
            .map(|connection| connection.addr)
    }

    /// Refreshes the activity timestamp for the client at `addr`.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<SessionId> {
        let connection = self
            .connections
            .values_mut()
            .find(|connection| connection.addr == addr)?;
        connection.touch();
        Some(connection.session_id)
    }

    /// Removes and returns every client that went silent past the timeout.
    pub fn check_timeouts(&mut self) -> Vec<SessionId> {
        let timeout = self.timeout;
        let timed_out: Vec<SessionId> = self
            .connections
            .values()
            .filter(|connection| connection.is_timed_out(timeout))
            .map(|connection| connection.session_id)
            .collect();

        for session_id in &timed_out {
            self.remove_client(session_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
