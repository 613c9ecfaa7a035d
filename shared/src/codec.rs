//! Fixed-layout wire codec for position records
//!
//! A record travels as a bare 24-byte little-endian blob with no header, length
//! prefix or version field: `id:i32 | x:f32 | y:f32 | timestamp:i64 | sequence:u32`.
//! The datagram length alone decides whether decoding is attempted.

use crate::{ParticipantId, Sequence};
use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoded size of a [`PositionRecord`] in bytes.
pub const RECORD_SIZE: usize = 4 + 4 + 4 + 8 + 4;

/// One participant's position as captured by the sender
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PositionRecord {
    pub id: ParticipantId,
    pub x: f32,
    pub y: f32,
    /// Sender-side capture instant in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub sequence: Sequence,
}

impl PositionRecord {
    pub fn new(id: ParticipantId, x: f32, y: f32, timestamp: i64, sequence: Sequence) -> Self {
        Self {
            id,
            x,
            y,
            timestamp,
            sequence,
        }
    }

    /// Same record with the position replaced
    pub fn with_position(self, x: f32, y: f32) -> Self {
        Self { x, y, ..self }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected a {expected}-byte position record, got {actual} bytes")]
    Length { expected: usize, actual: usize },

    #[error("malformed position record: {0}")]
    Malformed(#[source] bincode::Error),
}

#[derive(Debug, Error)]
#[error("failed to encode position record: {0}")]
pub struct EncodeError(#[from] bincode::Error);

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

pub fn encode(record: &PositionRecord) -> Result<Vec<u8>, EncodeError> {
    Ok(wire_options().serialize(record)?)
}

pub fn decode(bytes: &[u8]) -> Result<PositionRecord, DecodeError> {
    if bytes.len() != RECORD_SIZE {
        return Err(DecodeError::Length {
            expected: RECORD_SIZE,
            actual: bytes.len(),
        });
    }

    wire_options()
        .deserialize(bytes)
        .map_err(DecodeError::Malformed)
}
