//! Selective-Repeat ARQ Protocol Core
//!
//! This crate implements the I/O-free parts of the sender: sequence numbers,
//! the datagram wire format, segmentation of the source stream and the
//! sliding-window state machine.

pub mod packet;
pub mod segment;
pub mod sequence;
pub mod window;

pub use packet::{AckPacket, DataPacket, Packet, PacketError, MAX_PAYLOAD_SIZE, TERMINATION_MARKER};
pub use segment::{Segment, SegmentError, Segmenter};
pub use sequence::SeqNumber;
pub use window::{AckOutcome, SendWindow};
