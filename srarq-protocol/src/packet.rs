//! Wire Format
//!
//! Every datagram starts with a 2-byte big-endian sequence number.
//!
//! ```text
//!  0               1               2
//!  +-------+-------+-------...-----+
//!  |  seq (u16 BE) |   payload     |   data segment (payload <= 1022 bytes)
//!  +-------+-------+-------...-----+
//!  |  seq (u16 BE) |                   acknowledgment
//!  +-------+-------+
//!  |  0x00 | 0x00  |                   termination marker
//!  +-------+-------+
//! ```

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the sequence-number prefix in bytes
pub const HEADER_SIZE: usize = 2;

/// Maximum payload carried by one data segment
pub const MAX_PAYLOAD_SIZE: usize = 1022;

/// Largest datagram the sender ever emits
pub const MAX_DATAGRAM_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// Encoded termination marker
pub const TERMINATION_MARKER: [u8; HEADER_SIZE] = [0x00, 0x00];

/// Data segment as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub seq: SeqNumber,
    pub payload: Bytes,
}

impl DataPacket {
    pub fn new(seq: SeqNumber, payload: Bytes) -> Self {
        DataPacket { seq, payload }
    }

    /// Total encoded size
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the packet to bytes
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_u16(self.seq.as_raw());
        buf.put_slice(&self.payload);
        buf
    }

    /// Parse a data packet from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let seq = read_seq(bytes)?;
        if seq.is_termination() {
            return Err(PacketError::ReservedSequence);
        }

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(DataPacket {
            seq,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

/// Acknowledgment for a single segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    pub seq: SeqNumber,
}

impl AckPacket {
    pub fn new(seq: SeqNumber) -> Self {
        AckPacket { seq }
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        self.seq.as_raw().to_be_bytes()
    }

    /// Decode an acknowledgment
    ///
    /// Only the first two bytes are significant; anything after them is
    /// ignored, the same as receiving into a 2-byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        Ok(AckPacket {
            seq: read_seq(bytes)?,
        })
    }
}

/// Anything the sender puts on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data(DataPacket),
    Termination,
}

impl Packet {
    pub fn is_termination(&self) -> bool {
        matches!(self, Packet::Termination)
    }

    /// Serialize the packet to bytes
    pub fn to_bytes(&self) -> BytesMut {
        match self {
            Packet::Data(p) => p.to_bytes(),
            Packet::Termination => BytesMut::from(&TERMINATION_MARKER[..]),
        }
    }

    /// Parse a sender datagram, telling data segments from the marker
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if read_seq(bytes)?.is_termination() {
            if bytes.len() != HEADER_SIZE {
                return Err(PacketError::ReservedSequence);
            }
            Ok(Packet::Termination)
        } else {
            Ok(Packet::Data(DataPacket::from_bytes(bytes)?))
        }
    }
}

fn read_seq(bytes: &[u8]) -> Result<SeqNumber, PacketError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PacketError::InsufficientData {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let mut header = &bytes[..HEADER_SIZE];
    Ok(SeqNumber::new(header.get_u16()))
}

/// Packet parsing and validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Sequence number 0 is reserved for the termination marker")]
    ReservedSequence,
}
