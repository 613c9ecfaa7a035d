//! Authoritative movement validation
//!
//! Clients report their own positions, so the server refuses displacements a
//! participant could not have covered at the configured maximum speed. An
//! implausible move is clamped back to the previous position; the update's
//! sequence and timestamp still count, so the participant stays alive.

use shared::PositionRecord;

/// Outcome of validating a candidate update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validation {
    Accepted(PositionRecord),
    /// The move was too fast; the record carries the previous position
    Clamped(PositionRecord),
}

impl Validation {
    pub fn record(&self) -> PositionRecord {
        match self {
            Validation::Accepted(record) | Validation::Clamped(record) => *record,
        }
    }

    pub fn is_clamped(&self) -> bool {
        matches!(self, Validation::Clamped(_))
    }
}

/// Per-axis maximum speed in board units per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLimit {
    max_speed: f32,
}

impl SpeedLimit {
    pub fn new(max_speed: f32) -> Self {
        Self {
            max_speed: max_speed.max(0.0),
        }
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    /// Largest per-axis displacement allowed over `dt` seconds.
    ///
    /// Non-positive or non-finite `dt` (clock skew, duplicate timestamps)
    /// allows no movement at all.
    pub fn max_delta(&self, dt: f32) -> f32 {
        if dt.is_finite() && dt > 0.0 {
            self.max_speed * dt
        } else {
            0.0
        }
    }

    /// Checks `candidate` against the previously accepted record for the same participant
    pub fn validate(&self, previous: &PositionRecord, candidate: PositionRecord) -> Validation {
        let dt = (candidate.timestamp.saturating_sub(previous.timestamp)) as f32 / 1000.0;
        let max_delta = self.max_delta(dt);

        let dx = (candidate.x - previous.x).abs();
        let dy = (candidate.y - previous.y).abs();

        // NaN coordinates never compare greater, so reject them explicitly.
        if dx > max_delta || dy > max_delta || dx.is_nan() || dy.is_nan() {
            Validation::Clamped(candidate.with_position(previous.x, previous.y))
        } else {
            Validation::Accepted(candidate)
        }
    }
}

impl Default for SpeedLimit {
    fn default() -> Self {
        Self::new(shared::MAX_SPEED)
    }
}
