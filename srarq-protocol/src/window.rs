//! Selective-Repeat send window
//!
//! [`SendWindow`] tracks which segments have been admitted into flight and
//! which of those are still unacknowledged. Acknowledgments are individual,
//! not cumulative, and may arrive in any order.
//!
//! ```text
//!  send_base                    send_base + N - 1
//!      │                              │
//!  ────┼──────────────────────────────┼──────▶ seq space
//!      │ <── pending ──▶│<─ free ──▶ │
//!                    next_seq
//! ```
//!
//! `send_base` always equals the smallest pending sequence number. When
//! nothing is pending it moves to `next_seq`, the next segment to admit, so
//! the window keeps sliding even if only non-base segments were acknowledged.
//!
//! This module only manages state; starting timers and socket I/O are the
//! caller's responsibility.

use crate::sequence::SeqNumber;
use std::collections::BTreeSet;
use std::num::NonZeroU16;

/// What an acknowledgment did to the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Outside the window or not pending (stale or duplicate); nothing changed
    Ignored,
    /// Segment acknowledged; `admitted` lists segments that slid into the window
    Acknowledged { admitted: Vec<SeqNumber> },
    /// Last outstanding segment acknowledged and nothing left to admit
    Drained,
}

/// Send-side Selective-Repeat state for one transfer
#[derive(Debug, Clone)]
pub struct SendWindow {
    /// Smallest unacknowledged sequence number (left window edge)
    send_base: u32,
    /// Next sequence number to admit; may be `total + 1`
    next_seq: u32,
    /// Window size N
    size: NonZeroU16,
    /// Number of segments in the transfer
    total: u16,
    /// Admitted, unacknowledged segments
    pending: BTreeSet<SeqNumber>,
}

impl SendWindow {
    pub fn new(size: NonZeroU16, total: u16) -> Self {
        let first = SeqNumber::FIRST.as_raw() as u32;
        SendWindow {
            send_base: first,
            next_seq: first,
            size,
            total,
            pending: BTreeSet::new(),
        }
    }

    pub fn send_base(&self) -> SeqNumber {
        SeqNumber::new(self.send_base as u16)
    }

    /// Next sequence number to admit, as a wide value since it can reach `total + 1`
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn size(&self) -> u16 {
        self.size.get()
    }

    pub fn total(&self) -> u16 {
        self.total
    }

    /// Last sequence number inside the window
    pub fn window_end(&self) -> u32 {
        self.send_base + self.size.get() as u32 - 1
    }

    /// True when `seq` lies in `[send_base, send_base + N - 1]`
    pub fn in_window(&self, seq: SeqNumber) -> bool {
        let raw = seq.as_raw() as u32;
        raw >= self.send_base && raw <= self.window_end()
    }

    pub fn is_pending(&self, seq: SeqNumber) -> bool {
        self.pending.contains(&seq)
    }

    /// Pending sequence numbers in ascending order
    pub fn pending(&self) -> impl Iterator<Item = SeqNumber> + '_ {
        self.pending.iter().copied()
    }

    /// Number of segments currently awaiting acknowledgment
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Segments not yet admitted
    pub fn remaining(&self) -> usize {
        (self.total as u32 + 1).saturating_sub(self.next_seq) as usize
    }

    /// True once every segment was admitted and acknowledged
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.remaining() == 0
    }

    /// Admit as many segments as fit in the window
    ///
    /// Returns the newly admitted sequence numbers in order. Calling this with
    /// a full window or nothing left is a no-op.
    pub fn admit(&mut self) -> Vec<SeqNumber> {
        let limit = self.window_end().min(self.total as u32);
        let mut admitted = Vec::new();

        while self.next_seq <= limit {
            let seq = SeqNumber::new(self.next_seq as u16);
            self.pending.insert(seq);
            admitted.push(seq);
            self.next_seq += 1;
        }

        admitted
    }

    /// Process an individual acknowledgment
    ///
    /// Stale and duplicate acknowledgments leave the window untouched.
    pub fn on_ack(&mut self, seq: SeqNumber) -> AckOutcome {
        if !self.in_window(seq) || !self.pending.remove(&seq) {
            return AckOutcome::Ignored;
        }

        if self.is_drained() {
            return AckOutcome::Drained;
        }

        self.send_base = match self.pending.first() {
            Some(min) => min.as_raw() as u32,
            None => self.next_seq,
        };

        AckOutcome::Acknowledged {
            admitted: self.admit(),
        }
    }
}
