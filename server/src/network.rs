//! Server network layer handling UDP communications and room loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::room::Room;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, SessionId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { session_id: SessionId },
    Shutdown,
}

/// Messages sent from the room loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking and one room's simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    room: Room,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.client_timeout))),
            room: Room::new(config.room.clone()),
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender the caller can use to stop `run` from outside.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropped malformed packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for session_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { session_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn session_for(&self, addr: SocketAddr) -> Option<SessionId> {
        let mut clients = self.clients.write().await;
        clients.touch(addr)
    }

    /// Processes incoming packets. Only appends to room queues or changes
    /// membership; never advances the simulation.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join { client_version } => {
                info!(
                    "Client joining from {} (version: {})",
                    addr, client_version
                );

                if let Err(e) = Room::check_version(client_version) {
                    self.send_packet(
                        Packet::Rejected {
                            reason: e.to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // A resent Join from a live session gets the same answer again
                if let Some(session_id) = self.session_for(addr).await {
                    debug!("Repeated join from {}, still {}", addr, session_id);
                    self.room.request_resync(&session_id);
                    self.send_packet(Packet::Joined { session_id }, addr);
                    return;
                }

                match self.room.join() {
                    Ok(session_id) => {
                        self.clients.write().await.add_client(session_id, addr);
                        self.send_packet(Packet::Joined { session_id }, addr);
                    }
                    Err(e) => {
                        warn!("Rejected join from {}: {}", addr, e);
                        self.send_packet(
                            Packet::Rejected {
                                reason: e.to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Input(payload) => match self.session_for(addr).await {
                Some(session_id) => {
                    self.room.enqueue_input(&session_id, payload.into());
                }
                None => debug!("Input from unknown address {}", addr),
            },

            Packet::Message { channel, body } => {
                if let Some(session_id) = self.session_for(addr).await {
                    self.room.handle_message(&session_id, &channel, &body);
                }
            }

            Packet::Resync => {
                if let Some(session_id) = self.session_for(addr).await {
                    self.room.request_resync(&session_id);
                }
            }

            Packet::Leave => {
                let session_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(session_id) = session_id {
                    self.clients.write().await.remove_client(&session_id);
                    self.room.leave(&session_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Sends every pending state change to its subscriber
    async fn flush_sync(&mut self) {
        let outgoing = self.room.collect_sync();
        if outgoing.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for message in outgoing {
            match clients.addr_of(&message.to) {
                Some(addr) => self.send_packet(message.packet, addr),
                None => debug!("No address for {}, sync dropped", message.to),
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let step = Duration::from_secs_f64(1.0 / f64::from(self.config.room.tick_rate.max(1)));
        let mut tick_interval = interval(step);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut patch_interval = interval(self.config.patch_interval);
        patch_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_update = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { session_id }) => {
                            info!("Client {} timed out", session_id);
                            self.room.leave(&session_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Advance the simulation by the real time that passed
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_update);
                    last_update = now;
                    self.room.update(delta);
                },

                _ = patch_interval.tick() => {
                    self.flush_sync().await;
                },
            }
        }

        self.room.dispose();
        Ok(())
    }
}
