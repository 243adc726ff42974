//! Datagram transport abstraction
//!
//! The sender talks to exactly one peer. [`DatagramTransport`] is the seam
//! between the protocol engine and the network so the engine can run over a
//! real UDP socket or an in-memory transport in tests.

use crate::socket::{ArqSocket, SocketError};
use std::net::SocketAddr;
use std::time::Duration;

/// Unreliable, unordered datagram pipe to a single peer
///
/// Implementations must be shareable across threads: every retransmission
/// timer sends through the same transport while the listener receives.
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram to the peer
    fn send(&self, datagram: &[u8]) -> Result<usize, SocketError>;

    /// Receive one datagram into `buf`
    ///
    /// Returns `Ok(None)` when no datagram arrived before the transport's
    /// receive timeout.
    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, SocketError>;
}

/// UDP transport bound locally and aimed at one receiver
pub struct UdpTransport {
    socket: ArqSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind `local` and target `peer`
    ///
    /// `recv_timeout` bounds each blocking receive.
    pub fn new(
        local: SocketAddr,
        peer: SocketAddr,
        recv_timeout: Duration,
    ) -> Result<Self, SocketError> {
        let socket = ArqSocket::bind(local)?;
        socket.set_read_timeout(Some(recv_timeout))?;

        tracing::debug!(local = %socket.local_addr()?, %peer, "UDP transport ready");

        Ok(UdpTransport { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.socket.local_addr()
    }

    /// Request `bytes` of kernel buffer in both directions
    ///
    /// The OS may round or clamp the value; see [`Self::recv_buffer_size`].
    pub fn set_buffer_sizes(&self, bytes: usize) -> Result<(), SocketError> {
        self.socket.set_send_buffer_size(bytes)?;
        self.socket.set_recv_buffer_size(bytes)?;
        tracing::debug!(bytes, "socket buffers resized");
        Ok(())
    }

    /// Receive buffer size actually granted by the OS
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        self.socket.recv_buffer_size()
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> Result<usize, SocketError> {
        self.socket.send_to(datagram, self.peer)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, SocketError> {
        match self.socket.recv_from(buf) {
            Ok((n, _from)) => Ok(Some(n)),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
