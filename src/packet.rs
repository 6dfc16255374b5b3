//! Wire-format definitions for protocol datagrams.
//!
//! Every datagram the server exchanges is one of:
//! - a **data segment** — a 6-digit zero-padded decimal sequence header
//!   followed by up to [`CHUNK_SIZE`] payload bytes;
//! - an **ACK** from the client, whose bytes at offsets `[3..9)` carry a
//!   6-digit decimal sequence number (the canonical on-wire form is
//!   `"ACK"` + 6 digits, 9 bytes total);
//! - one of the ASCII control forms used around a session: `"SYN"`,
//!   `"ACK"`, `"SYN-ACK<port>"` on the well-known port and `"FIN"` on the
//!   data port.
//!
//! No I/O happens here — this is pure data transformation.

/// Payload bytes per data segment.
///
/// 1494 + the 6-byte header keeps the datagram inside a 1500-byte Ethernet
/// MTU, so no UDP-layer fragmentation occurs on a standard link.
pub const CHUNK_SIZE: usize = 1494;

/// Width of the decimal sequence header.
pub const SEQ_WIDTH: usize = 6;

/// Highest sequence number the 6-digit header can carry.
pub const MAX_SEQ: u32 = 999_999;

/// Terminal datagram payload: sent once after the final segment is ACKed.
pub const FIN: &[u8] = b"FIN";

/// Build the datagram for data segment `seq`: `"000001"`-style header
/// followed by the payload bytes.
///
/// `seq` must lie in `[1..=MAX_SEQ]` and `payload` must fit in one chunk;
/// both are guaranteed by the packet-table builder.
pub fn encode_segment(seq: u32, payload: &[u8]) -> Vec<u8> {
    debug_assert!((1..=MAX_SEQ).contains(&seq));
    debug_assert!(payload.len() <= CHUNK_SIZE);

    let mut datagram = Vec::with_capacity(SEQ_WIDTH + payload.len());
    datagram.extend_from_slice(format!("{seq:06}").as_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// Build the canonical 9-byte ACK datagram `"ACK"` + 6 digits.
///
/// The server never sends ACKs; this exists for the decode law
/// (`decode_ack(encode_ack(s)) == s`) and for test clients.
pub fn encode_ack(seq: u32) -> Vec<u8> {
    debug_assert!((1..=MAX_SEQ).contains(&seq));
    format!("ACK{seq:06}").into_bytes()
}

/// Extract the acknowledged sequence number from an inbound datagram.
///
/// Any datagram whose bytes at offsets `[3..9)` parse as a decimal integer
/// is an ACK; everything else returns `None` and is ignored by the caller.
/// The three leading bytes are deliberately not inspected.
pub fn decode_ack(datagram: &[u8]) -> Option<u32> {
    let digits = datagram.get(3..3 + SEQ_WIDTH)?;
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Build the well-known-port handshake reply: `"SYN-ACK"` + the ephemeral
/// port in decimal, no padding.
pub fn encode_syn_ack(port: u16) -> Vec<u8> {
    format!("SYN-ACK{port}").into_bytes()
}

/// `true` when the payload contains the ASCII substring `"SYN"`.
pub fn contains_syn(payload: &[u8]) -> bool {
    contains(payload, b"SYN")
}

/// `true` when the payload contains the ASCII substring `"ACK"`.
pub fn contains_ack(payload: &[u8]) -> bool {
    contains(payload, b"ACK")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
