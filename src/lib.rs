//! `file-over-udp` — a reliable, sliding-window file transfer server on
//! top of plain UDP datagrams.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐ SYN / ACK  ┌───────────┐ spawn  ┌───────────┐
//!  │  Client  │───────────▶│  Listener │───────▶│  Transfer │ (one per
//!  └────┬─────┘  SYN-ACK   └───────────┘        └────┬──────┘  session)
//!       │                                            │
//!       │    data segments "000001" + chunk          │
//!       │◀───────────────────────────────────────────┤
//!       │    cumulative ACKs  "ACK000001"            │
//!       ├───────────────────────────────────────────▶│
//!       │                FIN                         │
//!       │◀───────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]   — wire format: segment headers, ACK decode, control forms
//! - [`table`]    — one-pass file segmentation into prepared datagrams
//! - [`window`]   — sliding-window / cumulative-ACK state machine
//! - [`socket`]   — async UDP endpoint (thin wrapper around tokio)
//! - [`transfer`] — per-session sender loop (transmit tick, ACKs, FIN)
//! - [`listener`] — handshake on the well-known port, ephemeral port pool

pub mod listener;
pub mod packet;
pub mod socket;
pub mod table;
pub mod transfer;
pub mod window;
