//! Engine errors

use srarq_io::SocketError;
use srarq_protocol::{SegmentError, SeqNumber};
use std::io;
use thiserror::Error;

/// Errors that abort a transfer
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Source error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Transport error: {0}")]
    Transport(#[from] SocketError),

    #[error("Transfer of {0} segments exceeds the 16-bit sequence space")]
    TooManySegments(usize),

    #[error("Segment at index {index} carries sequence number {seq}")]
    OutOfOrderSegment { index: usize, seq: SeqNumber },

    #[error("Failed to spawn retransmission scheduler: {0}")]
    Spawn(io::Error),
}
