//! Async UDP endpoint.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket`. All
//! protocol logic lives elsewhere; this module owns only byte I/O. Every
//! method takes `&self`, so a socket can be shared across tasks behind an
//! `Arc` when needed.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Largest inbound datagram the server cares about: ACKs are 9 bytes and
/// the file-name request is well under a single MTU.
const MAX_DATAGRAM: usize = 2048;

/// A datagram socket bound to one local address.
#[derive(Debug)]
pub struct Socket {
    /// Resolved local address (after the OS assigns an ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// A port of `0` lets the OS choose one.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Send `bytes` as a single datagram to `dest`.
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Receive the next datagram, returning its bytes and sender address.
    pub async fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, addr))
    }
}
