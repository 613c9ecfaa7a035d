use shared::{
    ParticipantId, Smoothing, DEFAULT_PORT, DEFAULT_TICK_RATE, EXTRAPOLATION_HORIZON_MS,
    MAX_SPEED,
};
use std::time::Duration;

/// Runtime settings for one client session
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server endpoint, `host:port`
    pub server_addr: String,
    pub id: ParticipantId,
    /// Heartbeat and redraw ticks per second
    pub tick_rate: u32,
    pub smoothing: Smoothing,
    /// How far past the last authoritative record remote players are extrapolated
    pub horizon_ms: i64,
    /// Server's speed cap in cells per second; local moves are paced to fit it
    pub max_speed: f32,
    /// Skip drawing the board, e.g. for scripted runs
    pub headless: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            id: 1,
            tick_rate: DEFAULT_TICK_RATE,
            smoothing: Smoothing::default(),
            horizon_ms: EXTRAPOLATION_HORIZON_MS,
            max_speed: MAX_SPEED,
            headless: false,
        }
    }
}

impl ClientConfig {
    pub fn tick_interval(&self) -> Duration {
        shared::tick_interval(self.tick_rate)
    }
}
