use crate::input::Direction;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use shared::{
    extrapolate, smooth, ParticipantId, PositionRecord, Registry, Sequence, Smoothing,
    EXTRAPOLATION_HORIZON_MS, MAX_SPEED,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sent updates kept for matching against the server's echo
const SENT_HISTORY: usize = 64;

/// Share of the server's speed cap the client spends per step. Leaves room for
/// float rounding in the server's displacement check.
const SPEED_HEADROOM: f32 = 0.95;

/// The participant this client controls. Owns its ID and sequence counter.
///
/// Input moves a target cell; the reported position follows it no faster than
/// `max_speed` allows between consecutive updates, so every update passes the
/// server's speed check.
#[derive(Debug, Clone)]
pub struct LocalPlayer {
    id: ParticipantId,
    x: f32,
    y: f32,
    target_x: f32,
    target_y: f32,
    max_speed: f32,
    sequence: Sequence,
    last_stamp: Option<i64>,
    sent: VecDeque<PositionRecord>,
    last_input: Option<Instant>,
    width: usize,
    height: usize,
}

impl LocalPlayer {
    /// Starts in the middle of a `width` x `height` board
    pub fn new(id: ParticipantId, width: usize, height: usize) -> Self {
        let (x, y) = ((width / 2) as f32, (height / 2) as f32);
        Self {
            id,
            x,
            y,
            target_x: x,
            target_y: y,
            max_speed: MAX_SPEED,
            sequence: 0,
            last_stamp: None,
            sent: VecDeque::with_capacity(SENT_HISTORY),
            last_input: None,
            width,
            height,
        }
    }

    /// Speed cap to move under; should match the server's
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed.max(0.0);
        self
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Position carried by the last update
    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Cell the player is heading for
    pub fn target(&self) -> (f32, f32) {
        (self.target_x, self.target_y)
    }

    /// Sequence of the last update produced, 0 before the first one
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Moves the target one cell, staying inside the border. Returns whether it moved.
    pub fn try_move(&mut self, direction: Direction) -> bool {
        let (dx, dy) = direction.delta();
        let x = self.target_x + dx as f32;
        let y = self.target_y + dy as f32;

        let max_x = self.width.saturating_sub(2) as f32;
        let max_y = self.height.saturating_sub(2) as f32;
        if x < 1.0 || y < 1.0 || x > max_x || y > max_y {
            return false;
        }

        self.target_x = x;
        self.target_y = y;
        true
    }

    /// Steps towards the target as far as the speed cap allows since the
    /// previous update, then stamps the position with the next sequence number
    pub fn next_update(&mut self, now_ms: i64) -> PositionRecord {
        let allowance = match self.last_stamp {
            // Nothing on the server to measure against yet
            None => f32::INFINITY,
            Some(previous) => {
                let dt = now_ms.saturating_sub(previous) as f32 / 1000.0;
                if dt > 0.0 {
                    self.max_speed * dt * SPEED_HEADROOM
                } else {
                    0.0
                }
            }
        };
        self.x = approach(self.x, self.target_x, allowance);
        self.y = approach(self.y, self.target_y, allowance);

        self.sequence = self.sequence.wrapping_add(1);
        self.last_stamp = Some(now_ms);

        let record = PositionRecord::new(self.id, self.x, self.y, now_ms, self.sequence);
        if self.sent.len() == SENT_HISTORY {
            self.sent.pop_front();
        }
        self.sent.push_back(record);
        record
    }

    /// Moves and, if the move succeeded, produces the update to send right away
    pub fn move_and_update(&mut self, direction: Direction, now_ms: i64) -> Option<PositionRecord> {
        if !self.try_move(direction) {
            return None;
        }

        self.last_input = Some(Instant::now());
        Some(self.next_update(now_ms))
    }

    /// True when no input-driven update went out within `interval` of `now`
    pub fn heartbeat_due_at(&self, now: Instant, interval: Duration) -> bool {
        self.last_input
            .map_or(true, |sent| now.saturating_duration_since(sent) >= interval)
    }

    /// Produces a keep-alive update if one is due
    pub fn heartbeat(&mut self, interval: Duration, now_ms: i64) -> Option<PositionRecord> {
        if !self.heartbeat_due_at(Instant::now(), interval) {
            return None;
        }
        Some(self.next_update(now_ms))
    }

    /// Checks the server's echo of one of our updates. If the server stored a
    /// different position than we sent with that sequence, it clamped us: take
    /// its position and head for the target again from there.
    ///
    /// Returns true when the position was corrected.
    pub fn reconcile(&mut self, echo: &PositionRecord) -> bool {
        if echo.id != self.id {
            return false;
        }

        let Some(index) = self
            .sent
            .iter()
            .position(|sent| sent.sequence == echo.sequence)
        else {
            return false;
        };

        let sent = self.sent[index];
        self.sent.drain(..=index);

        if sent.x == echo.x && sent.y == echo.y {
            return false;
        }

        self.x = echo.x;
        self.y = echo.y;
        true
    }
}

fn approach(from: f32, to: f32, allowance: f32) -> f32 {
    let gap = to - from;
    if gap.abs() <= allowance {
        to
    } else {
        from + allowance.copysign(gap)
    }
}

/// Everyone else, as last heard from the server and as currently drawn
///
/// The registry keeps the authoritative records (and the velocity derived from
/// consecutive ones); `displayed` holds the smoothed, dead-reckoned position
/// that actually goes on screen.
#[derive(Debug)]
pub struct RemoteView {
    local_id: ParticipantId,
    registry: Registry,
    displayed: DashMap<ParticipantId, PositionRecord>,
    smoothing: Smoothing,
    horizon_ms: i64,
}

impl RemoteView {
    pub fn new(local_id: ParticipantId, smoothing: Smoothing, horizon_ms: i64) -> Self {
        Self {
            local_id,
            registry: Registry::new(),
            displayed: DashMap::new(),
            smoothing,
            horizon_ms: horizon_ms.max(0),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    /// Ingests one broadcast record. Returns false when it was ignored: our own
    /// echo, or not newer than what we already have for that participant.
    pub fn apply_update(&self, record: PositionRecord) -> bool {
        if record.id == self.local_id {
            return false;
        }

        if !self.registry.admits(&record) {
            debug!(
                "Ignoring stale update for participant {} (seq {})",
                record.id, record.sequence
            );
            return false;
        }

        self.registry.upsert(record);

        match self.displayed.entry(record.id) {
            Entry::Occupied(mut slot) => {
                let blended = smooth(slot.get(), &record, &self.smoothing);
                slot.insert(blended);
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }

        true
    }

    /// Dead-reckons every displayed participant towards `now`, never further
    /// than the horizon past its last authoritative record
    pub fn advance(&self, now: i64) {
        for entry in self.registry.entries() {
            let limit = entry.record.timestamp.saturating_add(self.horizon_ms);
            let target = now.min(limit);

            if let Some(mut shown) = self.displayed.get_mut(&entry.record.id) {
                if let Some(ahead) = target.checked_sub(shown.timestamp) {
                    *shown = extrapolate(&shown, entry.velocity, ahead as f32 / 1000.0);
                }
            }
        }
    }

    pub fn get(&self, id: ParticipantId) -> Option<PositionRecord> {
        self.displayed.get(&id).map(|shown| *shown)
    }

    /// Displayed positions, ordered by participant ID
    pub fn positions(&self) -> Vec<PositionRecord> {
        let mut positions: Vec<PositionRecord> =
            self.displayed.iter().map(|shown| *shown.value()).collect();
        positions.sort_by_key(|record| record.id);
        positions
    }

    pub fn len(&self) -> usize {
        self.displayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }
}

impl Default for RemoteView {
    fn default() -> Self {
        Self::new(0, Smoothing::default(), EXTRAPOLATION_HORIZON_MS)
    }
}
