//! UDP socket wrapper
//!
//! Blocking UDP socket built with socket2. Receives honour an optional read
//! timeout so callers can poll a shutdown condition between datagrams.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,
}

impl SocketError {
    /// True when a receive gave up because the read timeout elapsed
    pub fn is_timeout(&self) -> bool {
        match self {
            SocketError::Io(e) => matches!(
                e.kind(),
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
            ),
            SocketError::InvalidAddress => false,
        }
    }

    /// True for errors an unconnected UDP socket reports after an ICMP
    /// port-unreachable; the socket itself stays usable
    pub fn is_transient(&self) -> bool {
        match self {
            SocketError::Io(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
            ),
            SocketError::InvalidAddress => false,
        }
    }
}

/// Blocking UDP socket
pub struct ArqSocket {
    inner: Socket,
}

impl ArqSocket {
    /// Create a new socket bound to the given address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        Ok(ArqSocket { inner: socket })
    }

    /// Limit how long a receive may block; `None` blocks indefinitely
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), SocketError> {
        self.inner.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Set the send buffer size
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_send_buffer_size(size)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the receive buffer size
    pub fn recv_buffer_size(&self) -> Result<usize, SocketError> {
        Ok(self.inner.recv_buffer_size()?)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Send one datagram to the given address
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, &target.into())?)
    }

    /// Receive one datagram
    ///
    /// Datagrams longer than `buf` are truncated. Returns a timeout error
    /// (see [`SocketError::is_timeout`]) when the read timeout elapses.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), SocketError> {
        use std::mem::MaybeUninit;
        // SAFETY: u8 and MaybeUninit<u8> share layout and the kernel only writes
        // initialized bytes into the slice.
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };

        let (n, addr) = self.inner.recv_from(uninit_buf)?;
        Ok((n, addr.as_socket().ok_or(SocketError::InvalidAddress)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ArqSocket {
        ArqSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_socket_creation() {
        let socket = loopback();
        let addr = socket.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[test]
    fn test_socket_send_recv() {
        let sender = loopback();
        let receiver = loopback();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let data = b"\x00\x01hello";
        sender.send_to(data, receiver.local_addr().unwrap()).unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], data);
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[test]
    fn test_recv_timeout() {
        let socket = loopback();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let mut buf = [0u8; 2];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert!(err.is_timeout());
    }
}
