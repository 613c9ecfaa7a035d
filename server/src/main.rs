use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_SPEED};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// UDP port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Broadcast ticks per second
    #[arg(
        short,
        long,
        env = "GAME_TICK_RATE",
        default_value_t = DEFAULT_TICK_RATE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    tick_rate: u32,

    /// Maximum per-axis speed in board units per second
    #[arg(long, env = "MAX_SPEED", default_value_t = MAX_SPEED)]
    max_speed: f32,

    /// Silence after which a participant is removed, in milliseconds
    #[arg(long, env = "DISCONNECT_TIMEOUT_MS", default_value = "5000")]
    disconnect_timeout_ms: u64,

    /// Period of the disconnect sweep, in milliseconds
    #[arg(
        long,
        env = "SWEEP_INTERVAL_MS",
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    sweep_interval_ms: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_rate: args.tick_rate,
            max_speed: args.max_speed,
            disconnect_timeout: Duration::from_millis(args.disconnect_timeout_ms),
            sweep_interval: Duration::from_millis(args.sweep_interval_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::from(Args::parse());
    info!("Starting server on {}", config.bind_addr);

    let server = Server::bind(config).await?;
    server.run().await?;

    Ok(())
}
