use clap::Parser;
use client::input::InputManager;
use client::network::NetworkClient;
use client::rendering::{RenderConfig, Renderer};
use client::session::{ClientConfig, ClientSession};
use log::{error, info};
use macroquad::prelude::*;
use shared::{INTERPOLATION_FACTOR, VELOCITY};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Units moved per predicted step
    #[arg(long, default_value_t = VELOCITY)]
    velocity: f32,

    /// Per-frame blend factor for remote entities
    #[arg(long, default_value_t = INTERPOLATION_FACTOR)]
    lerp: f32,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let conf = Conf {
        window_title: "Room Client".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    };

    macroquad::Window::from_config(conf, run(args));
}

async fn run(args: Args) {
    info!("Starting client...");
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: arrow keys or WASD to move, G to toggle server position, Esc to quit");

    let mut network = match NetworkClient::connect(&args.server, args.fake_ping) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start network: {}", e);
            return;
        }
    };

    let mut session = ClientSession::new(ClientConfig {
        velocity: args.velocity,
        lerp_factor: args.lerp,
        ..ClientConfig::default()
    });
    let renderer = Renderer::new(args.width, args.height);
    let mut input_manager = InputManager::new();
    let mut render_config = RenderConfig {
        show_ghost: true,
        fake_ping_ms: args.fake_ping,
    };

    for packet in session.start(Instant::now()) {
        network.send(packet);
    }

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        let now = Instant::now();
        for packet in network.drain() {
            for reply in session.handle_packet(packet, now) {
                network.send(reply);
            }
        }

        let (input, toggle_ghost) = input_manager.update();
        if toggle_ghost {
            render_config.show_ghost = !render_config.show_ghost;
        }

        let delta = Duration::from_secs_f32(get_frame_time().max(0.0));
        for packet in session.frame(delta, input, now) {
            network.send(packet);
        }

        renderer.render(&session, &render_config);
        next_frame().await;
    }

    if let Some(packet) = session.leave() {
        network.send(packet);
    }
    network.close();
}
