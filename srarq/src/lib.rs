//! Selective-Repeat ARQ sender
//!
//! Reliable transfer of a byte stream over UDP to a receiver that
//! acknowledges every segment individually.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────┐ segments ┌──────────────────┐ schedule/cancel ┌─────────────────────────┐
//!  │ Segmenter │─────────▶│ WindowController │────────────────▶│ RetransmissionScheduler │─┐
//!  └───────────┘          │  (one mutex)     │                 │ (one thread, deadlines) │ │ data
//!                         └────────▲─────────┘                 └─────────────────────────┘ │
//!                                  │ on_ack                                                ▼
//!                         ┌────────┴─────────┐         acks                     ┌───────────────┐
//!                         │   AckListener    │◀─────────────────────────────────│   transport   │
//!                         └──────────────────┘                                  └───────────────┘
//! ```

pub mod controller;
pub mod error;
pub mod listener;
pub mod sender;
pub mod stats;

#[cfg(test)]
mod test_util;

pub use srarq_io as io;
pub use srarq_protocol as protocol;

pub use controller::{ProtocolState, WindowController, WindowSnapshot};
pub use error::EngineError;
pub use listener::AckListener;
pub use sender::{ArqSender, SenderOptions};
pub use stats::TransferStats;
