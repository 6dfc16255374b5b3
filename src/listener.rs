//! Well-known-port session listener.
//!
//! The listener owns the public UDP port. It runs the server half of the
//! three-way handshake and starts one independent session task per client:
//!
//! 1. `SYN` from an unknown client address → allocate the next ephemeral
//!    port from the pool and reply `SYN-ACK<port>`.
//! 2. `ACK` from a known client address → the handshake is complete; spawn
//!    a session task on the allocated port.
//! 3. Anything else on the well-known port is ignored.
//!
//! The session task binds its ephemeral port, reads a single datagram
//! naming the requested file (the client appends one terminator byte,
//! which is trimmed), builds the packet table from the file, and hands
//! everything to [`Transfer`]. Sessions share no state with one another or
//! with the listener.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::{IpAddr, SocketAddr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::packet;
use crate::socket::Socket;
use crate::table::PacketTable;
use crate::transfer::Transfer;

/// Default ephemeral pool: ports below 1024 need privileges, and the pool
/// wraps back to the start after the last port.
pub const EPHEMERAL_FIRST: u16 = 1024;
pub const EPHEMERAL_LAST: u16 = 9998;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a session died before or during setup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("socket or file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("file-name request was empty")]
    EmptyRequest,
    #[error("file reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// PortPool
// ---------------------------------------------------------------------------

/// Round-robin allocator over an inclusive port range.
///
/// Allocation never fails: past the end of the range it wraps to the
/// start, without checking whether the earlier allocation is still alive.
#[derive(Debug)]
pub struct PortPool {
    next: u16,
    first: u16,
    last: u16,
}

impl PortPool {
    pub fn new(first: u16, last: u16) -> Self {
        assert!(first <= last, "empty port range");
        Self {
            next: first,
            first,
            last,
        }
    }

    /// Hand out the next port, wrapping at the end of the range.
    pub fn allocate(&mut self) -> u16 {
        let port = self.next;
        self.next = if port == self.last {
            self.first
        } else {
            port + 1
        };
        port
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// The well-known-port dispatcher.
pub struct Listener {
    socket: Socket,
    pool: PortPool,
    /// Client address → allocated ephemeral port. Entries stay for the
    /// process lifetime, deduplicating repeated handshakes from the same
    /// source.
    sessions: HashMap<SocketAddr, u16>,
}

impl Listener {
    /// Bind the well-known port with the default ephemeral range.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Self::bind_with_range(addr, EPHEMERAL_FIRST, EPHEMERAL_LAST).await
    }

    /// Bind with an explicit ephemeral range (tests use high ports).
    pub async fn bind_with_range(addr: SocketAddr, first: u16, last: u16) -> io::Result<Self> {
        let socket = Socket::bind(addr).await?;
        Ok(Self {
            socket,
            pool: PortPool::new(first, last),
            sessions: HashMap::new(),
        })
    }

    /// Address the listener actually bound (useful when `addr` had port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Serve handshakes forever. Returns only if the well-known socket
    /// itself fails.
    pub async fn run(mut self) -> io::Result<()> {
        log::info!("[listener] serving on {}", self.socket.local_addr);
        let ip = self.socket.local_addr.ip();

        loop {
            let (datagram, peer) = self.socket.recv_from().await?;

            match self.sessions.get(&peer) {
                None if packet::contains_syn(&datagram) => {
                    let port = self.pool.allocate();
                    self.sessions.insert(peer, port);
                    log::info!("[listener] SYN from {peer}, assigning port {port}");
                    if let Err(e) = self
                        .socket
                        .send_to(&packet::encode_syn_ack(port), peer)
                        .await
                    {
                        log::warn!("[listener] SYN-ACK to {peer} failed: {e}");
                    }
                }
                Some(&port) if packet::contains_ack(&datagram) => {
                    log::info!("[listener] handshake with {peer} complete, port {port}");
                    tokio::spawn(async move {
                        if let Err(e) = serve_session(ip, port, peer).await {
                            log::error!("[listener] session for {peer} failed: {e}");
                        }
                    });
                }
                // Not part of a handshake we can make progress on.
                _ => log::debug!("[listener] ignoring datagram from {peer}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

/// Run one session: bind the ephemeral port, learn the file name, build
/// the packet table, stream the file to `peer`.
async fn serve_session(ip: IpAddr, port: u16, peer: SocketAddr) -> Result<(), SessionError> {
    let socket = Arc::new(Socket::bind(SocketAddr::new(ip, port)).await?);

    let (request, _) = socket.recv_from().await?;
    let path = file_name(&request)?;
    log::info!("[session] {peer}: requested {}", path.display());

    // One sequential pass over the file; done off the runtime because the
    // file may be large and std I/O blocks.
    let table = tokio::task::spawn_blocking(move || -> io::Result<PacketTable> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        PacketTable::build(BufReader::new(file), len)
    })
    .await??;

    Transfer::new(socket, peer, table).run().await;
    Ok(())
}

/// Interpret a file-name request datagram.
///
/// Clients send the name followed by a single terminator byte, which is
/// dropped here. The remaining bytes are used verbatim as a path.
fn file_name(request: &[u8]) -> Result<PathBuf, SessionError> {
    let (_, name) = request.split_last().ok_or(SessionError::EmptyRequest)?;
    Ok(PathBuf::from(OsStr::from_bytes(name)))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
