//! Sequence Number Handling
//!
//! Segments are numbered with 16-bit sequence numbers starting at 1. The value
//! 0 is reserved for the termination marker and is never assigned to a
//! segment. There is no wraparound: a transfer is capped at
//! [`MAX_SEQ_NUMBER`] segments.

use std::fmt;

/// Largest sequence number a segment can carry
pub const MAX_SEQ_NUMBER: u16 = u16::MAX;

/// Maximum number of segments in a single transfer
pub const MAX_SEGMENTS: usize = MAX_SEQ_NUMBER as usize;

/// 16-bit segment sequence number
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SeqNumber(u16);

impl SeqNumber {
    /// Reserved value carried by the termination marker
    pub const TERMINATION: SeqNumber = SeqNumber(0);

    /// Sequence number of the first segment of every transfer
    pub const FIRST: SeqNumber = SeqNumber(1);

    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u16) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u16 {
        self.0
    }

    /// True for the reserved termination value
    #[inline]
    pub fn is_termination(self) -> bool {
        self.0 == 0
    }

    /// Zero-based index of this segment in the transfer
    ///
    /// Returns `None` for the termination value.
    #[inline]
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    /// Sequence number of the segment at the given zero-based index
    pub fn from_index(index: usize) -> Option<Self> {
        u16::try_from(index + 1).ok().map(SeqNumber)
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for SeqNumber {
    fn from(value: u16) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u16 {
    fn from(seq: SeqNumber) -> u16 {
        seq.0
    }
}
