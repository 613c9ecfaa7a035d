//! Dead reckoning and exponential smoothing
//!
//! Both operations are pure functions of their inputs. Dead reckoning fills
//! the gaps between arriving updates by projecting the last known position
//! along the last observed velocity. Smoothing blends what is currently shown
//! toward a freshly arrived authoritative position so corrections do not snap,
//! unless the arrival is so far behind that blending would look wrong.

use crate::codec::PositionRecord;
use crate::{INTERPOLATION_ALPHA, REWIND_THRESHOLD_MS};

/// Below this many seconds no velocity is derived and no projection is made
pub const MIN_EXTRAPOLATION_SECS: f32 = 0.001;

/// Velocity in board units per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

impl Velocity {
    /// Derives the velocity between two consecutive records of one participant.
    ///
    /// Returns `None` when the records are too close together in time (or out
    /// of order, or so far apart the span overflows) for the division to be
    /// meaningful.
    pub fn between(previous: &PositionRecord, next: &PositionRecord) -> Option<Self> {
        let span = next.timestamp.checked_sub(previous.timestamp)? as f32 / 1000.0;
        if span < MIN_EXTRAPOLATION_SECS {
            return None;
        }

        let velocity = Self {
            x: (next.x - previous.x) / span,
            y: (next.y - previous.y) / span,
        };

        (velocity.x.is_finite() && velocity.y.is_finite()).then_some(velocity)
    }

    pub fn speed(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Projects `last` forward by `dt` seconds along `velocity`.
///
/// Without a velocity, or with a `dt` too small to matter, the record is
/// returned unchanged. The projected record keeps its id and sequence.
pub fn extrapolate(last: &PositionRecord, velocity: Option<Velocity>, dt: f32) -> PositionRecord {
    let velocity = match velocity {
        Some(velocity) => velocity,
        None => return *last,
    };

    if !dt.is_finite() || dt < MIN_EXTRAPOLATION_SECS {
        return *last;
    }

    PositionRecord {
        x: last.x + velocity.x * dt,
        y: last.y + velocity.y * dt,
        timestamp: last
            .timestamp
            .saturating_add((dt * 1000.0).round() as i64),
        ..*last
    }
}

/// Blend parameters for [`smooth`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    /// Fraction of the gap closed per arriving update, in `(0, 1)`
    pub alpha: f32,
    /// Arrivals older than the displayed record by more than this snap instead of blending
    pub rewind_threshold_ms: i64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            alpha: INTERPOLATION_ALPHA,
            rewind_threshold_ms: REWIND_THRESHOLD_MS,
        }
    }
}

/// Moves the displayed record toward an authoritative arrival.
///
/// Identity, timestamp and sequence are taken from `arrived`; only the
/// position is blended.
pub fn smooth(
    displayed: &PositionRecord,
    arrived: &PositionRecord,
    smoothing: &Smoothing,
) -> PositionRecord {
    if displayed.timestamp.saturating_sub(arrived.timestamp) > smoothing.rewind_threshold_ms {
        return *arrived;
    }

    PositionRecord {
        x: displayed.x + (arrived.x - displayed.x) * smoothing.alpha,
        y: displayed.y + (arrived.y - displayed.y) * smoothing.alpha,
        ..*arrived
    }
}
