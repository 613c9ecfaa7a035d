use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE, DISCONNECT_TIMEOUT, MAX_SPEED, SWEEP_INTERVAL};
use std::time::Duration;

/// Runtime settings for the authoritative server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind the UDP socket to, e.g. `127.0.0.1:8000`
    pub bind_addr: String,
    /// Broadcast ticks per second
    pub tick_rate: u32,
    /// Maximum per-axis speed in board units per second
    pub max_speed: f32,
    /// Participants silent for longer than this are swept
    pub disconnect_timeout: Duration,
    /// Period of the disconnect sweep
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_rate: DEFAULT_TICK_RATE,
            max_speed: MAX_SPEED,
            disconnect_timeout: DISCONNECT_TIMEOUT,
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        shared::tick_interval(self.tick_rate)
    }
}
