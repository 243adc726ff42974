//! Acknowledgment listener
//!
//! Blocking receive loop that turns inbound datagrams into
//! [`WindowController::on_ack`] calls until the protocol completes.

use crate::controller::WindowController;
use crate::error::EngineError;
use srarq_io::DatagramTransport;
use srarq_protocol::packet::{AckPacket, MAX_DATAGRAM_SIZE};
use std::sync::Arc;

/// Feeds acknowledgments from the transport into a controller
pub struct AckListener<'a, T: DatagramTransport + ?Sized + 'static> {
    controller: &'a WindowController<T>,
    transport: Arc<T>,
}

impl<'a, T: DatagramTransport + ?Sized + 'static> AckListener<'a, T> {
    pub fn new(controller: &'a WindowController<T>, transport: Arc<T>) -> Self {
        AckListener {
            controller,
            transport,
        }
    }

    /// Run until the controller reports completion
    ///
    /// Every datagram is treated as a candidate acknowledgment; filtering is
    /// left to the controller. Receive timeouts just re-check completion.
    pub fn run(&self) -> Result<(), EngineError> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        while !self.controller.is_complete() {
            let n = match self.transport.recv(&mut buf) {
                Ok(Some(n)) => n,
                Ok(None) => continue,
                Err(e) if e.is_transient() => {
                    tracing::debug!(error = %e, "transient receive error");
                    continue;
                }
                Err(e) => return Err(EngineError::Transport(e)),
            };

            match AckPacket::from_bytes(&buf[..n]) {
                Ok(ack) => {
                    tracing::trace!(seq = %ack.seq, "acknowledgment received");
                    self.controller.on_ack(ack.seq);
                }
                Err(e) => tracing::warn!(len = n, error = %e, "dropping malformed acknowledgment"),
            }
        }

        Ok(())
    }
}
