//! Authoritative participant state: ingest, broadcast and expiry
//!
//! Every inbound datagram runs through the same pipeline: decode, sequence
//! gate, speed validation, registry upsert. Broadcast and sweep read the same
//! registry from their own ticks and never wait on ingest.

use crate::validation::{SpeedLimit, Validation};
use log::{debug, error, info, warn};
use shared::{
    decode, encode, now_millis, sequence, DecodeError, ParticipantId, PositionRecord, Registry,
    Sequence, Transport,
};
use std::net::SocketAddr;
use std::time::Duration;

/// What happened to one inbound update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ingest {
    /// Stored as sent
    Accepted(PositionRecord),
    /// Stored with the previous position because the move was too fast
    Clamped(PositionRecord),
    /// Discarded; nothing about the participant changed
    Stale {
        id: ParticipantId,
        sequence: Sequence,
        last_sequence: Sequence,
    },
}

/// Result of one broadcast pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastReport {
    pub datagrams_sent: usize,
    /// Participants whose address was dropped after a failed send
    pub evicted: Vec<ParticipantId>,
}

pub struct GameState {
    registry: Registry,
    speed_limit: SpeedLimit,
}

impl GameState {
    pub fn new(speed_limit: SpeedLimit) -> Self {
        Self {
            registry: Registry::new(),
            speed_limit,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn speed_limit(&self) -> SpeedLimit {
        self.speed_limit
    }

    /// Decodes and applies one datagram received from `addr`.
    ///
    /// A payload that is not exactly one record is rejected before anything
    /// is read from or written to the registry.
    pub fn handle_datagram(&self, data: &[u8], addr: SocketAddr) -> Result<Ingest, DecodeError> {
        let record = decode(data)?;
        Ok(self.apply_update(record, addr, now_millis()))
    }

    /// Applies a decoded update as if it arrived at `seen_at`
    pub fn apply_update(&self, record: PositionRecord, addr: SocketAddr, seen_at: i64) -> Ingest {
        let previous = self.registry.entry(record.id);
        let last_sequence = previous.map(|entry| entry.last_sequence);

        if !sequence::accept(record.sequence, last_sequence) {
            debug!(
                "Ignoring outdated update from participant {} (seq {} <= {})",
                record.id,
                record.sequence,
                last_sequence.unwrap_or_default()
            );
            return Ingest::Stale {
                id: record.id,
                sequence: record.sequence,
                last_sequence: last_sequence.unwrap_or_default(),
            };
        }

        let validation = match previous {
            Some(previous) => self.speed_limit.validate(&previous.record, record),
            None => {
                info!(
                    "Participant {} joined from {} at ({:.2}, {:.2})",
                    record.id, addr, record.x, record.y
                );
                Validation::Accepted(record)
            }
        };

        let stored = validation.record();
        self.registry.upsert_at(stored, seen_at);
        self.registry.set_address(record.id, addr);

        match validation {
            Validation::Accepted(record) => {
                debug!(
                    "Participant {} updated: x={:.2}, y={:.2}, seq={} (from {})",
                    record.id, record.x, record.y, record.sequence, addr
                );
                Ingest::Accepted(record)
            }
            Validation::Clamped(clamped) => {
                warn!(
                    "Participant {} moved too fast to ({:.2}, {:.2}); kept at ({:.2}, {:.2})",
                    record.id, record.x, record.y, clamped.x, clamped.y
                );
                Ingest::Clamped(clamped)
            }
        }
    }

    /// Sends every participant's current record to every known address.
    ///
    /// An address whose send fails is dropped from the address table and gets
    /// nothing more this pass; the other addresses and all position records
    /// are unaffected.
    pub async fn broadcast<T>(&self, transport: &T) -> BroadcastReport
    where
        T: Transport + ?Sized,
    {
        let mut report = BroadcastReport::default();

        let addresses = self.registry.addresses();
        if addresses.is_empty() {
            return report;
        }

        let payloads: Vec<Vec<u8>> = self
            .registry
            .snapshot()
            .iter()
            .filter_map(|record| match encode(record) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    error!("Failed to encode participant {}: {}", record.id, e);
                    None
                }
            })
            .collect();

        for (id, addr) in addresses {
            for payload in &payloads {
                match transport.send_to(payload, addr).await {
                    Ok(_) => report.datagrams_sent += 1,
                    Err(e) => {
                        warn!("Failed to send to participant {} at {}: {}", id, addr, e);
                        if self.registry.remove_address(id, addr) {
                            report.evicted.push(id);
                        }
                        break;
                    }
                }
            }
        }

        report
    }

    /// Removes participants not heard from within `timeout` of `now`
    pub fn sweep(&self, timeout: Duration, now: i64) -> Vec<ParticipantId> {
        let removed = self.registry.sweep_expired(timeout, now);
        for id in &removed {
            info!("Participant {} disconnected (no update for {:?})", id, timeout);
        }
        removed
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(SpeedLimit::default())
    }
}
