//! Protocol pieces shared by the position-sync server and client.
//!
//! Everything that both sides of the wire must agree on lives here: the fixed
//! 24-byte position record and its codec, the per-sender sequence gate, the
//! dead-reckoning and smoothing math, the concurrent participant registry and
//! the datagram transport seam.

pub mod codec;
pub mod prediction;
pub mod registry;
pub mod sequence;
pub mod transport;

pub use codec::{decode, encode, DecodeError, PositionRecord, RECORD_SIZE};
pub use prediction::{extrapolate, smooth, Smoothing, Velocity};
pub use registry::{ParticipantEntry, Registry};
pub use transport::{RecordingTransport, Transport};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type ParticipantId = i32;
pub type Sequence = u32;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TICK_RATE: u32 = 30;
pub const MAX_SPEED: f32 = 10.0;
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
pub const INTERPOLATION_ALPHA: f32 = 0.1;
pub const REWIND_THRESHOLD_MS: i64 = 250;
pub const EXTRAPOLATION_HORIZON_MS: i64 = 1000;
pub const BOARD_WIDTH: usize = 20;
pub const BOARD_HEIGHT: usize = 10;

/// Receive buffer size; anything larger than a record is rejected by decode anyway.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(i64::MAX as u128) as i64
}

/// Tick interval for a rate in Hz. A zero rate is treated as 1 Hz.
pub fn tick_interval(tick_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64)
}
