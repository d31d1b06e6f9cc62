use clap::Parser;
use log::{error, info};
use server::config::{RoomConfig, ServerConfig};
use server::input_queue::OverflowPolicy;
use server::network::{Server, ServerMessage};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation steps per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Milliseconds between state patches sent to clients
    #[arg(long, default_value = "50")]
    patch_ms: u64,

    /// Maximum number of clients in the room
    #[arg(short, long, default_value = "4")]
    max_clients: usize,

    /// Maximum queued inputs per entity, 0 for unbounded
    #[arg(long, default_value = "120")]
    max_queue_depth: usize,

    /// What to do when an input queue is full
    #[arg(long, value_enum, default_value = "drop-oldest")]
    overflow: OverflowPolicy,

    /// Fixed seed for spawn positions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        patch_interval: Duration::from_millis(args.patch_ms.max(1)),
        room: RoomConfig {
            max_clients: args.max_clients,
            tick_rate: args.tick_rate.max(1),
            max_queue_depth: (args.max_queue_depth > 0).then_some(args.max_queue_depth),
            overflow_policy: args.overflow,
            seed: args.seed,
            ..RoomConfig::default()
        },
        ..ServerConfig::default()
    };

    info!("Starting server on {}", config.bind_addr);
    info!(
        "Tick rate: {} Hz, patch interval: {:?}, max clients: {}",
        config.room.tick_rate, config.patch_interval, config.room.max_clients
    );

    let mut server = Server::new(config).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
        let _ = shutdown.send(ServerMessage::Shutdown);
    });

    server.run().await?;

    Ok(())
}
