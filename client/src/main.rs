use clap::Parser;
use client::config::ClientConfig;
use client::input::{parse_line, Command};
use client::network::Client;
use log::{debug, info};
use rand::Rng;
use shared::{ParticipantId, Smoothing, DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_SPEED, REWIND_THRESHOLD_MS};
use std::io::BufRead;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short, long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    server: String,

    /// Server UDP port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Heartbeat and redraw ticks per second
    #[arg(
        short,
        long,
        env = "GAME_TICK_RATE",
        default_value_t = DEFAULT_TICK_RATE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    tick_rate: u32,

    /// Participant ID; a random one from 1 to 8 when omitted
    #[arg(short, long, env = "PLAYER_ID")]
    id: Option<ParticipantId>,

    /// Fraction of the gap to a remote player's reported position closed per update
    #[arg(long, default_value = "0.1", value_parser = parse_alpha)]
    alpha: f32,

    /// Updates older than the displayed position by more than this snap instead of blending
    #[arg(long, default_value = "250")]
    rewind_threshold_ms: i64,

    /// Speed cap the server enforces, in cells per second
    #[arg(long, env = "MAX_SPEED", default_value_t = MAX_SPEED)]
    max_speed: f32,

    /// Do not draw the board
    #[arg(long)]
    headless: bool,
}

fn parse_alpha(value: &str) -> Result<f32, String> {
    let alpha: f32 = value.parse().map_err(|e| format!("{}", e))?;
    if alpha > 0.0 && alpha < 1.0 {
        Ok(alpha)
    } else {
        Err(format!("alpha must be between 0 and 1 exclusive, got {}", alpha))
    }
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        let id = args
            .id
            .unwrap_or_else(|| rand::thread_rng().gen_range(1..=8));

        ClientConfig {
            server_addr: format!("{}:{}", args.server, args.port),
            id,
            tick_rate: args.tick_rate,
            smoothing: Smoothing {
                alpha: args.alpha,
                rewind_threshold_ms: args.rewind_threshold_ms.max(0),
            },
            max_speed: args.max_speed,
            headless: args.headless,
            ..ClientConfig::default()
        }
    }
}

/// Reads stdin on a plain thread so a blocked read never holds up shutdown
fn spawn_stdin_reader(commands: mpsc::UnboundedSender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            for command in parse_line(&line) {
                if commands.send(command).is_err() {
                    return;
                }
            }
        }
        debug!("Stdin closed");
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ClientConfig::from(Args::parse());
    if config.smoothing.rewind_threshold_ms != REWIND_THRESHOLD_MS {
        info!(
            "Rewind threshold set to {}ms",
            config.smoothing.rewind_threshold_ms
        );
    }

    info!("Starting client {}...", config.id);
    info!("Connecting to: {}", config.server_addr);

    let client = Client::connect(config).await?;

    let (commands, inbox) = mpsc::unbounded_channel();
    spawn_stdin_reader(commands);

    client.run(inbox).await?;

    Ok(())
}
