//! UDP transport for the client
//!
//! macroquad owns the main thread, so the socket lives on a background
//! thread running its own tokio runtime. Packets cross between the two over
//! unbounded channels.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct NetworkClient {
    outgoing: Option<mpsc::UnboundedSender<Packet>>,
    incoming: mpsc::UnboundedReceiver<Packet>,
    worker: Option<JoinHandle<()>>,
}

impl NetworkClient {
    /// Starts the transport thread. `fake_ping_ms` delays each direction by
    /// half the given value.
    pub fn connect(server_addr: &str, fake_ping_ms: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    match UdpSocket::from_std(socket) {
                        Ok(socket) => {
                            run_transport(socket, server_addr, outgoing_rx, incoming_tx, fake_ping_ms)
                                .await
                        }
                        Err(e) => error!("Failed to register socket: {}", e),
                    }
                });
            })?;

        info!("Connecting to {}", server_addr);

        Ok(Self {
            outgoing: Some(outgoing_tx),
            incoming: incoming_rx,
            worker: Some(worker),
        })
    }

    pub fn send(&self, packet: Packet) {
        if let Some(outgoing) = &self.outgoing {
            if outgoing.send(packet).is_err() {
                warn!("Network thread stopped, packet dropped");
            }
        }
    }

    /// Every packet received since the last call.
    pub fn drain(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.incoming.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// Flushes queued packets and stops the transport thread.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.outgoing.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_transport(
    socket: UdpSocket,
    server_addr: SocketAddr,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
    incoming: mpsc::UnboundedSender<Packet>,
    fake_ping_ms: u64,
) {
    let mut buffer = [0u8; 2048];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, addr)) => {
                        if addr != server_addr {
                            debug!("Ignoring datagram from {}", addr);
                            continue;
                        }

                        if fake_ping_ms > 0 {
                            sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                        }

                        match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => {
                                if incoming.send(packet).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropped malformed packet: {}", e),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                }
            },

            packet = outgoing.recv() => {
                let Some(packet) = packet else {
                    break;
                };

                if fake_ping_ms > 0 {
                    sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                }

                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, server_addr).await {
                            error!("Failed to send packet: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to encode packet: {}", e),
                }
            },
        }
    }

    debug!("Network transport stopped");
}
