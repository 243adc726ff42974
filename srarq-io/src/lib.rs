//! Network I/O for the Selective-Repeat ARQ sender
//!
//! This crate provides the UDP socket wrapper, the transport seam used by the
//! protocol engine, and the retransmission scheduler.

pub mod socket;
pub mod timer;
pub mod transport;

pub use socket::{ArqSocket, SocketError};
pub use timer::{IntervalSchedule, RetransmissionScheduler, RetransmitPolicy, TransmitCounters};
pub use transport::{DatagramTransport, UdpTransport};
