//! Per-session sender loop.
//!
//! One [`Transfer`] owns one file transfer to one client. A single task
//! multiplexes everything the session does with `tokio::select!`:
//!
//! ```text
//!  ┌──────────────────────── session task ────────────────────────┐
//!  │  1 ms tick ──▶ SendWindow::poll_transmit ──▶ socket.send_to  │
//!  │  socket.recv_from ──▶ decode_ack ──▶ SendWindow::on_ack      │
//!  │  100 ms tick ──▶ progress line                               │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The window state lives inside the loop, so the transmit path and the
//! ACK path can never observe it mid-update; there is no lock to hold
//! across an I/O await.
//!
//! Send and receive failures are logged and the loop keeps going: an
//! unsent segment stays unacknowledged and comes back via the retransmit
//! timer. The loop ends when the final segment is acknowledged (after
//! emitting a single FIN) or when the session socket stops working.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{self, MissedTickBehavior};

use crate::packet::{self, FIN};
use crate::socket::Socket;
use crate::table::PacketTable;
use crate::window::{AckOutcome, SendWindow, WINDOW_SIZE};

/// Transmit quantum: one send decision per tick. Keeps the loop from
/// spinning and bounds send burstiness.
pub const SEND_TICK: Duration = Duration::from_millis(1);

/// Cadence of the progress line.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Consecutive receive failures after which the session socket is treated
/// as closed and the session ends.
const MAX_RECV_FAILURES: u32 = 8;

/// A running file transfer bound to one client address.
pub struct Transfer {
    socket: Arc<Socket>,
    peer: SocketAddr,
    table: PacketTable,
}

impl Transfer {
    pub fn new(socket: Arc<Socket>, peer: SocketAddr, table: PacketTable) -> Self {
        Self {
            socket,
            peer,
            table,
        }
    }

    /// Drive the transfer to completion.
    pub async fn run(self) {
        let total = self.table.last_seq();
        if self.table.is_empty() {
            // Zero segments: both the transmit and the ACK side are done
            // before they start, and no FIN is owed.
            log::info!("[transfer] {}: empty file, nothing to send", self.peer);
            return;
        }
        log::info!("[transfer] {}: sending {total} segment(s)", self.peer);

        let mut window = SendWindow::new(total, WINDOW_SIZE);

        let mut tick = time::interval(SEND_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut progress = time::interval(PROGRESS_INTERVAL);
        progress.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut recv_failures = 0u32;

        while !window.is_complete() {
            tokio::select! {
                // ── transmit quantum ─────────────────────────────────────
                _ = tick.tick() => {
                    if let Some(seq) = window.poll_transmit(Instant::now()) {
                        match self.socket.send_to(self.table.datagram(seq), self.peer).await {
                            Ok(()) => log::trace!("[transfer] → seq={seq}"),
                            // The segment stays outstanding; the retransmit
                            // timer will bring it back.
                            Err(e) => log::warn!("[transfer] send of segment {seq} failed: {e}"),
                        }
                    }
                }

                // ── inbound ACK ──────────────────────────────────────────
                recv = self.socket.recv_from() => {
                    let datagram = match recv {
                        Ok((datagram, _)) => {
                            recv_failures = 0;
                            datagram
                        }
                        Err(e) => {
                            recv_failures += 1;
                            log::warn!("[transfer] ack receive failed: {e}");
                            if recv_failures >= MAX_RECV_FAILURES {
                                log::error!(
                                    "[transfer] {}: session socket unusable, giving up",
                                    self.peer
                                );
                                return;
                            }
                            continue;
                        }
                    };

                    // Anything that does not decode is not an ACK; drop it.
                    let Some(ack) = packet::decode_ack(&datagram) else {
                        continue;
                    };

                    match window.on_ack(ack) {
                        AckOutcome::Advanced => log::trace!("[transfer] ← ack={ack}"),
                        AckOutcome::FastRetransmit => log::debug!(
                            "[transfer] three duplicate acks at {ack}, resending from {}",
                            ack + 1
                        ),
                        AckOutcome::Complete => {
                            if let Err(e) = self.socket.send_to(FIN, self.peer).await {
                                log::warn!("[transfer] FIN send failed: {e}");
                            }
                            log::info!(
                                "[transfer] {}: transfer of {total} segment(s) complete",
                                self.peer
                            );
                        }
                        AckOutcome::Duplicate | AckOutcome::Ignored => {}
                    }
                }

                // ── progress line ────────────────────────────────────────
                _ = progress.tick() => {
                    let (done, _) = window.progress();
                    log::debug!(
                        "[transfer] {}: {:3.0}% ({done}/{total})",
                        self.peer,
                        100.0 * f64::from(done) / f64::from(total)
                    );
                }
            }
        }
    }
}
