//! Send-side sliding-window state machine.
//!
//! [`SendWindow`] owns every decision the sender loop makes: which segment
//! to put on the wire next, how cumulative ACKs advance the window, when
//! three duplicate ACKs trigger a fast retransmit, and when a stalled
//! window falls back to timeout-driven retransmission.
//!
//! # Protocol contract
//!
//! - ACKs are **cumulative**: `ack = K` means the client holds every
//!   segment `1..=K`.
//! - At most `window_size` segments are eligible for transmission at once,
//!   always the contiguous range `[win_low, win_high]`.
//! - The window has two regimes. Until the first fast retransmit it is
//!   **bucket-aligned**: `win_low` snaps to the start of the fixed
//!   `window_size`-wide bucket containing `send_base`. From the first fast
//!   retransmit onwards it **slides freely**: re-anchored at `send_base`,
//!   then advanced by one full window whenever the previous window has been
//!   wholly acknowledged.
//! - The transfer is complete when `send_base` passes the last segment.
//!
//! ```text
//!   win_low      send_base         next_seq      win_high
//!      │             │                 │             │
//!  ────┼─────────────┼─────────────────┼─────────────┼───▶ seq space
//!      │ ◀─ acked waiting ─▶ in flight │ ◀ sendable ▶│
//! ```
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility. Timestamps are injected by the caller, which keeps every
//! timing decision deterministic under test.

use std::time::{Duration, Instant};

/// Fixed window size: segments eligible for transmission at once.
pub const WINDOW_SIZE: u32 = 65;

/// How long the oldest outstanding segment may stay unacknowledged while
/// the window is stalled before it is forced back onto the wire.
pub const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// AckOutcome
// ---------------------------------------------------------------------------

/// What processing one inbound ACK did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// A strictly higher cumulative ACK; the window advanced.
    Advanced,
    /// The final segment is now acknowledged: send FIN and stop.
    Complete,
    /// Same ACK as before; duplicate counted, nothing else changed.
    Duplicate,
    /// Third consecutive duplicate: retransmission restarts right after the
    /// duplicated sequence number.
    FastRetransmit,
    /// Stale (below the current ACK) or beyond the last segment; dropped.
    Ignored,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Sliding-window send state for one transfer.
#[derive(Debug)]
pub struct SendWindow {
    /// Highest valid sequence number (the number of segments).
    last_seq: u32,

    /// Window width W (fixed per transfer).
    window_size: u32,

    /// Lowest unacknowledged sequence number; one past the cumulative ACK.
    pub send_base: u32,

    /// Sequence number the next transmission will carry.
    pub next_seq: u32,

    /// Most recent ACK value observed (0 before any ACK).
    pub last_ack: u32,

    /// Consecutive duplicates of `last_ack` since the last new ACK.
    dup_acks: u32,

    /// Inclusive window bounds; `win_high - win_low + 1 == window_size`.
    win_low: u32,
    win_high: u32,

    /// A fast retransmit fired; the next recomputation re-anchors the
    /// window at `send_base` and switches to the free-sliding regime.
    fast_retransmit: bool,

    /// Whether the window has left its initial bucket alignment.
    free_sliding: bool,

    /// Last transmission time per sequence number (index 0 unused). Only
    /// the `send_base` entry is ever consulted.
    sent_at: Vec<Instant>,
}

impl SendWindow {
    /// Fresh window for a transfer of `last_seq` segments.
    pub fn new(last_seq: u32, window_size: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            last_seq,
            window_size,
            send_base: 1,
            next_seq: 1,
            last_ack: 0,
            dup_acks: 0,
            win_low: 1,
            win_high: window_size,
            fast_retransmit: false,
            free_sliding: false,
            sent_at: vec![Instant::now(); last_seq as usize + 2],
        }
    }

    /// `true` once every segment has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.send_base > self.last_seq
    }

    /// Current inclusive window bounds `(win_low, win_high)`.
    pub fn bounds(&self) -> (u32, u32) {
        (self.win_low, self.win_high)
    }

    /// `(acknowledged segments, total segments)`.
    pub fn progress(&self) -> (u32, u32) {
        (self.send_base - 1, self.last_seq)
    }

    /// One transmit-quantum step: decide what, if anything, goes on the
    /// wire now.
    ///
    /// Returns `Some(seq)` when segment `seq` must be transmitted; its
    /// timestamp is stamped with `now`. Returns `None` when the window slot
    /// is past the last segment or the window is stalled. A stall that has
    /// outlived [`RETRANSMIT_TIMEOUT`] (measured from the last transmission
    /// of the oldest outstanding segment) resets `next_seq` to `send_base`,
    /// so the following call retransmits it.
    pub fn poll_transmit(&mut self, now: Instant) -> Option<u32> {
        // Never (re)transmit data the client already acknowledged.
        if self.next_seq < self.send_base {
            self.next_seq = self.send_base;
        }

        if self.recompute_window() {
            let seq = self.next_seq;
            self.next_seq += 1;
            if seq <= self.last_seq {
                self.sent_at[seq as usize] = now;
                return Some(seq);
            }
            // In-window slot beyond the final segment: nothing to send.
            return None;
        }

        // Window stalled: every sendable slot is in flight. Fall back to
        // the retransmit timer on the oldest outstanding segment.
        if now.duration_since(self.sent_at[self.send_base as usize]) > RETRANSMIT_TIMEOUT {
            self.next_seq = self.send_base;
        }
        None
    }

    /// Process one cumulative ACK from the client.
    pub fn on_ack(&mut self, ack: u32) -> AckOutcome {
        if ack > self.last_seq {
            // Acknowledges data that was never sent.
            return AckOutcome::Ignored;
        }

        if ack == self.last_ack {
            self.dup_acks += 1;
            if self.dup_acks > 2 {
                // Third duplicate in a row: the segment after `ack` was
                // lost. Restart there without waiting for the timer.
                self.next_seq = ack + 1;
                self.fast_retransmit = true;
                self.dup_acks = 0;
                return AckOutcome::FastRetransmit;
            }
            return AckOutcome::Duplicate;
        }

        if ack < self.last_ack {
            return AckOutcome::Ignored;
        }

        self.last_ack = ack;
        self.dup_acks = 0;
        if self.last_ack >= self.send_base {
            self.send_base = self.last_ack + 1;
        }

        if self.last_ack == self.last_seq {
            AckOutcome::Complete
        } else {
            AckOutcome::Advanced
        }
    }

    /// Recompute `[win_low, win_high]` from the current `send_base` and
    /// regime; returns `true` when `next_seq` falls inside the window.
    fn recompute_window(&mut self) -> bool {
        if self.fast_retransmit {
            self.win_low = self.send_base;
            self.fast_retransmit = false;
            self.free_sliding = true;
        } else if !self.free_sliding {
            // Initial regime: snap to the bucket containing send_base.
            self.win_low = ((self.send_base - 1) / self.window_size) * self.window_size + 1;
        } else if self.win_high < self.send_base {
            // Prior window wholly acknowledged: slide by one full window.
            self.win_low += self.window_size;
        }
        self.win_high = self.win_low + self.window_size - 1;

        (self.win_low..=self.win_high).contains(&self.next_seq)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = WINDOW_SIZE;

    /// Poll once and require a transmission.
    fn must_send(w: &mut SendWindow, now: Instant) -> u32 {
        w.poll_transmit(now).expect("expected a transmission")
    }

    /// Drain transmissions at `now` until the window stalls; returns the
    /// sent sequence numbers.
    fn drain(w: &mut SendWindow, now: Instant) -> Vec<u32> {
        let mut sent = Vec::new();
        // next_seq keeps walking to win_high even past last_seq, so bound
        // the loop by the window width.
        for _ in 0..=W {
            if let Some(seq) = w.poll_transmit(now) {
                sent.push(seq);
            }
            if w.next_seq > w.bounds().1 {
                break;
            }
        }
        sent
    }

    #[test]
    fn initial_state() {
        let w = SendWindow::new(200, W);
        assert_eq!(w.send_base, 1);
        assert_eq!(w.next_seq, 1);
        assert_eq!(w.last_ack, 0);
        assert_eq!(w.bounds(), (1, W));
        assert!(!w.is_complete());
        assert_eq!(w.progress(), (0, 200));
    }

    #[test]
    fn transmits_in_sequence_until_the_window_fills() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        let sent = drain(&mut w, now);
        assert_eq!(sent, (1..=W).collect::<Vec<_>>());
        // Stalled now: nothing more without an ACK or a timeout.
        assert_eq!(w.poll_transmit(now), None);
    }

    #[test]
    fn every_transmission_is_inside_the_current_window() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        for _ in 0..1000 {
            if let Some(seq) = w.poll_transmit(now) {
                let (low, high) = w.bounds();
                assert!((low..=high).contains(&seq), "seq {seq} outside [{low}, {high}]");
            }
        }
    }

    #[test]
    fn never_transmits_past_the_last_segment() {
        let mut w = SendWindow::new(3, W);
        let now = Instant::now();
        let sent = drain(&mut w, now);
        assert_eq!(sent, vec![1, 2, 3]);
        // Slots 4..=65 are in-window but carry no data.
        for _ in 0..200 {
            assert_eq!(w.poll_transmit(now), None);
        }
    }

    #[test]
    fn window_stays_exactly_one_width_wide() {
        let mut w = SendWindow::new(400, W);
        let now = Instant::now();
        drain(&mut w, now);
        for ack in [1, 40, 65, 66, 200, 399] {
            w.on_ack(ack);
            w.poll_transmit(now);
            let (low, high) = w.bounds();
            assert_eq!(high - low + 1, W, "window width broken after ack {ack}");
            assert!(low <= w.send_base && w.send_base <= high + 1);
        }
    }

    #[test]
    fn new_ack_advances_send_base() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);

        assert_eq!(w.on_ack(5), AckOutcome::Advanced);
        assert_eq!(w.send_base, 6);
        assert_eq!(w.last_ack, 5);
    }

    #[test]
    fn cumulative_ack_may_jump_many_segments() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);

        assert_eq!(w.on_ack(60), AckOutcome::Advanced);
        assert_eq!(w.send_base, 61);
        // The bucket-aligned window stays at [1..65] until the whole
        // bucket is acknowledged, so nothing new is sendable yet.
        assert_eq!(w.poll_transmit(now), None);

        assert_eq!(w.on_ack(65), AckOutcome::Advanced);
        let sent = drain(&mut w, now);
        assert_eq!(sent.first(), Some(&66));
        assert_eq!(sent.last(), Some(&130));
    }

    #[test]
    fn stale_ack_changes_nothing() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);
        w.on_ack(50);
        w.poll_transmit(now);
        let bounds = w.bounds();
        let (base, next) = (w.send_base, w.next_seq);

        assert_eq!(w.on_ack(10), AckOutcome::Ignored);
        assert_eq!(w.send_base, base);
        assert_eq!(w.next_seq, next);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), bounds);
    }

    #[test]
    fn ack_beyond_last_segment_is_dropped() {
        let mut w = SendWindow::new(10, W);
        let now = Instant::now();
        drain(&mut w, now);
        assert_eq!(w.on_ack(11), AckOutcome::Ignored);
        assert_eq!(w.send_base, 1);
        assert!(!w.is_complete());
    }

    #[test]
    fn duplicates_count_and_third_triggers_fast_retransmit() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);

        assert_eq!(w.on_ack(29), AckOutcome::Advanced);
        assert_eq!(w.on_ack(29), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(29), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(29), AckOutcome::FastRetransmit);

        // Retransmission restarts at 30 and the window re-anchors there.
        assert_eq!(must_send(&mut w, now), 30);
        assert_eq!(w.bounds(), (30, 30 + W - 1));
    }

    #[test]
    fn higher_ack_resets_the_duplicate_counter() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);

        w.on_ack(29);
        assert_eq!(w.on_ack(29), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(29), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(31), AckOutcome::Advanced);
        // The duplicate streak starts over.
        assert_eq!(w.on_ack(31), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(31), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(31), AckOutcome::FastRetransmit);
    }

    #[test]
    fn bucket_alignment_holds_until_a_window_is_fully_acked() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);

        // Mid-bucket ACK keeps the same bucket.
        w.on_ack(3);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (1, 65));

        // Bucket edges: 65 -> [66..130], 130 -> [131..195],
        // 195 -> [196..260].
        w.on_ack(65);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (66, 130));

        w.on_ack(130);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (131, 195));

        w.on_ack(195);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (196, 260));
    }

    #[test]
    fn window_slides_freely_after_a_fast_retransmit() {
        let mut w = SendWindow::new(400, W);
        let now = Instant::now();
        drain(&mut w, now);

        w.on_ack(29);
        w.on_ack(29);
        w.on_ack(29);
        w.on_ack(29); // fast retransmit; window re-anchored at 30
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (30, 94));

        // Partial progress does not move the anchored window.
        w.on_ack(50);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (30, 94));

        // Acknowledging the whole window slides it by exactly one width.
        w.on_ack(94);
        w.poll_transmit(now);
        assert_eq!(w.bounds(), (95, 159));
    }

    #[test]
    fn stalled_window_retransmits_after_the_timeout() {
        let mut w = SendWindow::new(200, W);
        let t0 = Instant::now();
        drain(&mut w, t0); // fills [1..65], stalls

        // Inside the grace period nothing happens.
        let early = t0 + Duration::from_millis(200);
        assert_eq!(w.poll_transmit(early), None);
        assert_eq!(w.next_seq, W + 1);

        // Past 300 ms the oldest outstanding segment is forced out again.
        let late = t0 + Duration::from_millis(301);
        assert_eq!(w.poll_transmit(late), None); // resets next_seq
        assert_eq!(must_send(&mut w, late), 1);
    }

    #[test]
    fn retransmission_refreshes_the_timeout_stamp() {
        let mut w = SendWindow::new(200, W);
        let t0 = Instant::now();
        drain(&mut w, t0);

        let t1 = t0 + Duration::from_millis(301);
        w.poll_transmit(t1);
        assert_eq!(must_send(&mut w, t1), 1); // stamped at t1

        // Walk next_seq back to the stall edge.
        drain(&mut w, t1);
        // 250 ms after t1 is still within the fresh stamp's grace period.
        let t2 = t1 + Duration::from_millis(250);
        w.poll_transmit(t2);
        assert_ne!(w.next_seq, w.send_base);
    }

    #[test]
    fn acknowledging_the_last_segment_completes_exactly_once() {
        let mut w = SendWindow::new(10, W);
        let now = Instant::now();
        drain(&mut w, now);

        assert_eq!(w.on_ack(9), AckOutcome::Advanced);
        assert_eq!(w.on_ack(10), AckOutcome::Complete);
        assert!(w.is_complete());
        assert_eq!(w.progress(), (10, 10));

        // Repeats never produce a second completion.
        assert_eq!(w.on_ack(10), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(9), AckOutcome::Ignored);
    }

    #[test]
    fn send_base_and_last_ack_are_monotone() {
        let mut w = SendWindow::new(200, W);
        let now = Instant::now();
        drain(&mut w, now);

        let acks = [5, 5, 3, 12, 12, 12, 12, 12, 40, 1, 41];
        let (mut base, mut last) = (w.send_base, w.last_ack);
        for a in acks {
            w.on_ack(a);
            assert!(w.send_base >= base, "send_base regressed on ack {a}");
            assert!(w.last_ack >= last, "last_ack regressed on ack {a}");
            base = w.send_base;
            last = w.last_ack;
        }
    }

    #[test]
    fn zero_segments_is_complete_from_the_start() {
        let w = SendWindow::new(0, W);
        assert!(w.is_complete());
    }
}
