//! Concurrent participant registry
//!
//! The registry maps participant IDs to their last accepted state. It is
//! written by the ingest path and read by the broadcast and display paths at
//! the same time, so it is backed by sharded maps with per-key locking rather
//! than one lock over every participant. Each upsert replaces a whole entry
//! under its shard lock; readers always see either the old or the new entry.
//!
//! Admission (`admits`) and replacement (`upsert`) are separate per-key
//! operations. Two updates for the same ID racing each other can both pass
//! admission and the later write wins, even if it carries the lower sequence.
//! That race is a property of unordered datagram ingest and is left as is.
//!
//! Network addresses live in their own table. A failed send evicts the
//! address without touching the participant's position record.

use crate::codec::PositionRecord;
use crate::prediction::Velocity;
use crate::sequence;
use crate::{now_millis, ParticipantId, Sequence};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Everything the registry knows about one participant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticipantEntry {
    /// Last accepted record
    pub record: PositionRecord,
    /// Sequence of the last accepted record
    pub last_sequence: Sequence,
    /// Receiver wall-clock time of the last accepted update, ms since epoch
    pub last_seen: i64,
    /// Velocity between the last two accepted records, if derivable
    pub velocity: Option<Velocity>,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<ParticipantId, ParticipantEntry>,
    addresses: DashMap<ParticipantId, SocketAddr>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sequence(&self, id: ParticipantId) -> Option<Sequence> {
        self.entries.get(&id).map(|entry| entry.last_sequence)
    }

    /// Runs the sequence gate for `record` against its sender's last accepted sequence
    pub fn admits(&self, record: &PositionRecord) -> bool {
        sequence::accept(record.sequence, self.last_sequence(record.id))
    }

    /// Creates or replaces the entry for `record.id`, stamping it as seen now
    pub fn upsert(&self, record: PositionRecord) {
        self.upsert_at(record, now_millis());
    }

    /// Creates or replaces the entry for `record.id` with an explicit last-seen time
    pub fn upsert_at(&self, record: PositionRecord, seen_at: i64) {
        match self.entries.entry(record.id) {
            Entry::Occupied(mut occupied) => {
                let velocity = Velocity::between(&occupied.get().record, &record);
                occupied.insert(ParticipantEntry {
                    record,
                    last_sequence: record.sequence,
                    last_seen: seen_at,
                    velocity,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ParticipantEntry {
                    record,
                    last_sequence: record.sequence,
                    last_seen: seen_at,
                    velocity: None,
                });
            }
        }
    }

    pub fn get(&self, id: ParticipantId) -> Option<PositionRecord> {
        self.entries.get(&id).map(|entry| entry.record)
    }

    pub fn entry(&self, id: ParticipantId) -> Option<ParticipantEntry> {
        self.entries.get(&id).map(|entry| *entry.value())
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Copies every entry out, ordered by participant ID.
    ///
    /// No shard lock is held once this returns, so callers may take their time
    /// with the result while ingest keeps writing.
    pub fn entries(&self) -> Vec<ParticipantEntry> {
        let mut entries: Vec<ParticipantEntry> =
            self.entries.iter().map(|entry| *entry.value()).collect();
        entries.sort_by_key(|entry| entry.record.id);
        entries
    }

    /// Last accepted record of every participant, ordered by participant ID
    pub fn snapshot(&self) -> Vec<PositionRecord> {
        self.entries().into_iter().map(|entry| entry.record).collect()
    }

    /// Visits a point-in-time copy of every entry
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&ParticipantEntry),
    {
        for entry in self.entries() {
            visitor(&entry);
        }
    }

    /// Removes every participant not seen for longer than `timeout` before `now`.
    ///
    /// This is the only path that removes entries. The participant's address
    /// goes with it. Returns the removed IDs in ascending order.
    pub fn sweep_expired(&self, timeout: Duration, now: i64) -> Vec<ParticipantId> {
        let timeout_ms = timeout.as_millis().min(i64::MAX as u128) as i64;
        let mut expired = Vec::new();

        self.entries.retain(|id, entry| {
            let alive = now.saturating_sub(entry.last_seen) <= timeout_ms;
            if !alive {
                expired.push(*id);
            }
            alive
        });

        for id in &expired {
            self.addresses.remove(id);
        }

        expired.sort_unstable();
        expired
    }

    pub fn set_address(&self, id: ParticipantId, addr: SocketAddr) {
        self.addresses.insert(id, addr);
    }

    /// Drops the address for `id`, but only if it is still `addr`.
    ///
    /// A fresh update may have replaced the address since the caller read it;
    /// that newer address is kept.
    pub fn remove_address(&self, id: ParticipantId, addr: SocketAddr) -> bool {
        self.addresses
            .remove_if(&id, |_, stored| *stored == addr)
            .is_some()
    }

    pub fn address(&self, id: ParticipantId) -> Option<SocketAddr> {
        self.addresses.get(&id).map(|addr| *addr.value())
    }

    /// Copy of the address table, ordered by participant ID
    pub fn addresses(&self) -> Vec<(ParticipantId, SocketAddr)> {
        let mut addresses: Vec<(ParticipantId, SocketAddr)> = self
            .addresses
            .iter()
            .map(|addr| (*addr.key(), *addr.value()))
            .collect();
        addresses.sort_by_key(|(id, _)| *id);
        addresses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
