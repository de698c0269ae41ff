//! Playback scheduling for inbound model audio.
//!
//! Chunks are placed back to back on the output clock: each one starts where
//! the previous one ends, or at "now" if the output has already caught up.
//! An interruption discards the whole backlog.

use std::collections::HashSet;
use std::fmt;

/// Identifies one scheduled chunk on the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

impl fmt::Display for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a chunk landed on the output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub handle: PlaybackHandle,
    /// Start time in seconds on the output clock
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

/// Playback cursor plus the set of chunks that have not finished playing.
#[derive(Debug)]
pub struct PlaybackQueue {
    sample_rate: u32,
    cursor: f64,
    pending: HashSet<PlaybackHandle>,
    next_handle: u64,
}

impl PlaybackQueue {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            cursor: 0.0,
            pending: HashSet::new(),
            next_handle: 0,
        }
    }

    /// Reserve a slot for `sample_count` samples given the current output time.
    pub fn schedule(&mut self, now: f64, sample_count: usize) -> ScheduledChunk {
        if self.cursor < now {
            self.cursor = now;
        }

        let handle = PlaybackHandle(self.next_handle);
        self.next_handle += 1;

        let start = self.cursor;
        let duration = sample_count as f64 / self.sample_rate as f64;
        self.cursor += duration;
        self.pending.insert(handle);

        ScheduledChunk {
            handle,
            start,
            duration,
        }
    }

    /// Record natural completion of a chunk.
    ///
    /// Returns true when this removal emptied the set, i.e. the model just
    /// finished speaking. Unknown handles (already discarded) return false.
    pub fn complete(&mut self, handle: PlaybackHandle) -> bool {
        self.pending.remove(&handle) && self.pending.is_empty()
    }

    /// Discard the backlog: empties the pending set and resets the cursor to 0.
    ///
    /// Returns the handles that must be stopped on the device.
    pub fn interrupt(&mut self) -> Vec<PlaybackHandle> {
        self.cursor = 0.0;
        let mut handles: Vec<PlaybackHandle> = self.pending.drain().collect();
        handles.sort();
        handles
    }

    pub fn is_speaking(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_back_to_back_chunks_have_no_gap() {
        let mut queue = PlaybackQueue::new(24000);
        let now = 5.0;

        let first = queue.schedule(now, 2400);
        let second = queue.schedule(now, 2400);

        assert!((first.start - 5.0).abs() < EPS);
        assert!((first.duration - 0.1).abs() < EPS);
        assert!((second.start - 5.1).abs() < EPS);
        assert!((queue.cursor() - 5.2).abs() < EPS);
        assert_eq!(queue.pending_len(), 2);
    }

    #[test]
    fn test_sequence_start_times_accumulate_durations() {
        let mut queue = PlaybackQueue::new(24000);
        let sizes = [480usize, 2400, 1200, 24000, 7];

        let chunks: Vec<ScheduledChunk> = sizes.iter().map(|&n| queue.schedule(1.0, n)).collect();

        for pair in chunks.windows(2) {
            assert!((pair[1].start - (pair[0].start + pair[0].duration)).abs() < EPS);
        }
    }

    #[test]
    fn test_cursor_catches_up_to_now() {
        let mut queue = PlaybackQueue::new(24000);
        queue.schedule(1.0, 2400);

        // Output clock moved past the end of the first chunk
        let late = queue.schedule(3.0, 2400);
        assert!((late.start - 3.0).abs() < EPS);
    }

    #[test]
    fn test_cursor_never_moves_backwards_without_interrupt() {
        let mut queue = PlaybackQueue::new(24000);
        queue.schedule(2.0, 24000);
        let next = queue.schedule(0.5, 2400);
        assert!((next.start - 3.0).abs() < EPS);
    }

    #[test]
    fn test_complete_signals_when_last_chunk_finishes() {
        let mut queue = PlaybackQueue::new(24000);
        let a = queue.schedule(0.0, 100);
        let b = queue.schedule(0.0, 100);

        assert!(!queue.complete(a.handle));
        assert!(queue.is_speaking());
        assert!(queue.complete(b.handle));
        assert!(!queue.is_speaking());
        assert!(!queue.complete(b.handle));
    }

    #[test]
    fn test_interrupt_clears_backlog_and_resets_cursor() {
        let mut queue = PlaybackQueue::new(24000);
        let a = queue.schedule(10.0, 2400);
        let b = queue.schedule(10.0, 2400);

        let stopped = queue.interrupt();

        assert_eq!(stopped, vec![a.handle, b.handle]);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.cursor(), 0.0);
        assert!(!queue.is_speaking());

        // A late completion for a discarded chunk is ignored
        assert!(!queue.complete(a.handle));

        // Next chunk is anchored to "now", not the stale cursor
        let next = queue.schedule(10.05, 2400);
        assert!((next.start - 10.05).abs() < EPS);
    }

    #[test]
    fn test_handles_are_unique() {
        let mut queue = PlaybackQueue::new(24000);
        let a = queue.schedule(0.0, 1);
        queue.interrupt();
        let b = queue.schedule(0.0, 1);
        assert_ne!(a.handle, b.handle);
    }
}
