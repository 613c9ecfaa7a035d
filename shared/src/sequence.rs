//! Per-sender sequence gate
//!
//! Under reordering and duplication only the most recently produced update may
//! affect visible state. An update whose sequence is not strictly greater than
//! the last accepted one for its sender is inert.

use crate::Sequence;

/// Returns true if an update carrying `incoming` may be applied.
///
/// `last_known` is `None` for a sender that has never been accepted, in which
/// case any sequence (including zero) passes.
pub fn accept(incoming: Sequence, last_known: Option<Sequence>) -> bool {
    match last_known {
        Some(last) => incoming > last,
        None => true,
    }
}
