//! Per-session packet table.
//!
//! At session start the named file is read **once**, sequentially, and cut
//! into `N = ceil(len / CHUNK_SIZE)` ready-to-send datagrams (sequence
//! header already prepended). The table is immutable afterwards: the sender
//! loop retransmits by re-sending the same prepared bytes, so a segment is
//! identical on every transmission.

use std::io::{self, Read};

use crate::packet::{self, CHUNK_SIZE, MAX_SEQ};

/// The prepared datagrams for one file, indexed by sequence number.
#[derive(Debug)]
pub struct PacketTable {
    /// `datagrams[i]` is the wire form of segment `i + 1`.
    datagrams: Vec<Vec<u8>>,
}

impl PacketTable {
    /// Cut `len` bytes from `reader` into prepared segments.
    ///
    /// Every segment except the last carries exactly [`CHUNK_SIZE`] payload
    /// bytes; the last carries the remainder. A short read before `len`
    /// bytes have been produced is an error: the file must be at least as
    /// long as its reported length.
    pub fn build<R: Read>(mut reader: R, len: u64) -> io::Result<Self> {
        let total = len.div_ceil(CHUNK_SIZE as u64);
        if total > u64::from(MAX_SEQ) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file needs {total} segments, sequence space ends at {MAX_SEQ}"),
            ));
        }

        let mut datagrams = Vec::with_capacity(total as usize);
        let mut remaining = len;
        let mut payload = [0u8; CHUNK_SIZE];

        for seq in 1..=total as u32 {
            let take = remaining.min(CHUNK_SIZE as u64) as usize;
            reader.read_exact(&mut payload[..take])?;
            remaining -= take as u64;
            datagrams.push(packet::encode_segment(seq, &payload[..take]));
        }

        Ok(Self { datagrams })
    }

    /// Number of segments (the highest valid sequence number).
    pub fn last_seq(&self) -> u32 {
        self.datagrams.len() as u32
    }

    /// `true` for a zero-length file: nothing to transmit.
    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }

    /// The prepared wire bytes for segment `seq` (1-based).
    pub fn datagram(&self, seq: u32) -> &[u8] {
        &self.datagrams[seq as usize - 1]
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
