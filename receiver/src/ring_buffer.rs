//! Frame-aligned ring buffer for PCM samples.
//!
//! Fixed-capacity circular storage shared by the packet side (writes, drops)
//! and the mixer side (pops). Writes that exceed capacity overwrite the
//! oldest samples and are accounted as overflows; the buffer itself never
//! grows or fails after construction.

use anyhow::Result;
use tracing::debug;

/// Circular store of `frame_capacity × frame_sample_count` PCM samples.
///
/// The read and write cursors chase each other around the fixed allocation.
/// `samples_available` tracks how much unread audio sits between them, which
/// keeps the full/empty states distinct without wasting a slot.
#[derive(Debug)]
pub struct AudioRingBuffer {
    // ---
    buffer: Box<[i16]>,
    read_pos: usize,
    write_pos: usize,
    samples_available: usize,
    frame_sample_count: usize,
    frame_capacity: usize,
    overflow_count: u64,
}

impl AudioRingBuffer {
    // ---
    /// Creates a ring buffer holding `frame_capacity` frames of
    /// `frame_sample_count` samples each.
    ///
    /// # Errors
    ///
    /// Returns error if either dimension is zero; a stream cannot operate
    /// on a degenerate ring.
    pub fn new(frame_sample_count: usize, frame_capacity: usize) -> Result<Self> {
        // ---
        if frame_sample_count < 1 {
            anyhow::bail!("frame sample count must be at least 1");
        }
        if frame_capacity < 1 {
            anyhow::bail!("frame capacity must be at least 1");
        }

        let sample_capacity = frame_sample_count * frame_capacity;

        Ok(Self {
            buffer: vec![0i16; sample_capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
            samples_available: 0,
            frame_sample_count,
            frame_capacity,
            overflow_count: 0,
        })
    }

    pub fn frame_sample_count(&self) -> usize {
        // ---
        self.frame_sample_count
    }

    pub fn frame_capacity(&self) -> usize {
        // ---
        self.frame_capacity
    }

    pub fn sample_capacity(&self) -> usize {
        // ---
        self.buffer.len()
    }

    /// Unread samples currently buffered.
    pub fn samples_available(&self) -> usize {
        // ---
        self.samples_available
    }

    /// Whole unread frames currently buffered.
    pub fn frames_available(&self) -> usize {
        // ---
        self.samples_available / self.frame_sample_count
    }

    /// Whole frames of free space left before writes start overwriting.
    pub fn frames_remaining(&self) -> usize {
        // ---
        (self.buffer.len() - self.samples_available) / self.frame_sample_count
    }

    /// Times a write has overwritten unread samples.
    pub fn overflow_count(&self) -> u64 {
        // ---
        self.overflow_count
    }

    /// Writes samples at the write cursor, overwriting the oldest unread
    /// samples on overflow. Returns the number of samples consumed from
    /// `src` (always all of them).
    pub fn write_samples(&mut self, src: &[i16]) -> usize {
        // ---
        self.write_internal(Some(src), src.len())
    }

    /// Writes `num_samples` zero samples, with the same overflow policy as
    /// [`write_samples`](Self::write_samples).
    pub fn write_silent_samples(&mut self, num_samples: usize) -> usize {
        // ---
        self.write_internal(None, num_samples)
    }

    /// Copies up to `num_samples` unread samples into `out` (cleared first)
    /// and advances the read cursor past them. Returns the count popped.
    pub fn pop_samples(&mut self, num_samples: usize, out: &mut Vec<i16>) -> usize {
        // ---
        let to_pop = num_samples.min(self.samples_available);

        out.clear();
        out.reserve(to_pop);
        for i in 0..to_pop {
            out.push(self.buffer[(self.read_pos + i) % self.buffer.len()]);
        }

        self.read_pos = (self.read_pos + to_pop) % self.buffer.len();
        self.samples_available -= to_pop;
        to_pop
    }

    /// Advances the read cursor past up to `num_samples` unread samples
    /// without copying them. Returns the count discarded.
    pub fn shift_read_position(&mut self, num_samples: usize) -> usize {
        // ---
        let to_drop = num_samples.min(self.samples_available);

        self.read_pos = (self.read_pos + to_drop) % self.buffer.len();
        self.samples_available -= to_drop;
        to_drop
    }

    /// Discards all unread samples. Overflow accounting is preserved.
    pub fn clear(&mut self) {
        // ---
        self.read_pos = 0;
        self.write_pos = 0;
        self.samples_available = 0;
    }

    /// Zeroes the overflow counter (used by the stream's stats reset).
    pub fn reset_overflow_count(&mut self) {
        // ---
        self.overflow_count = 0;
    }

    fn write_internal(&mut self, src: Option<&[i16]>, num_samples: usize) -> usize {
        // ---
        if num_samples == 0 {
            return 0;
        }

        let capacity = self.buffer.len();
        let free = capacity - self.samples_available;

        if num_samples > free {
            // Overwrite the oldest unread samples to make room.
            let excess = num_samples - free;
            let to_drop = excess.min(self.samples_available);
            self.read_pos = (self.read_pos + to_drop) % capacity;
            self.samples_available -= to_drop;
            self.overflow_count += 1;
            debug!(
                "Ring buffer overflow: dropped {} samples to fit a {}-sample write",
                to_drop, num_samples
            );
        }

        // A single write larger than the whole buffer keeps only the newest
        // `capacity` samples.
        let skip = num_samples.saturating_sub(capacity);
        let to_write = num_samples - skip;

        match src {
            Some(samples) => {
                for &sample in &samples[skip..] {
                    self.buffer[self.write_pos] = sample;
                    self.write_pos = (self.write_pos + 1) % capacity;
                }
            }
            None => {
                for _ in 0..to_write {
                    self.buffer[self.write_pos] = 0;
                    self.write_pos = (self.write_pos + 1) % capacity;
                }
            }
        }

        self.samples_available += to_write;
        num_samples
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn frame(value: i16, len: usize) -> Vec<i16> {
        vec![value; len]
    }

    #[test]
    fn test_rejects_degenerate_dimensions() {
        // ---
        assert!(AudioRingBuffer::new(0, 10).is_err());
        assert!(AudioRingBuffer::new(240, 0).is_err());
        assert!(AudioRingBuffer::new(240, 10).is_ok());
    }

    #[test]
    fn test_write_then_pop_round_trip() {
        // ---
        let mut ring = AudioRingBuffer::new(4, 8).expect("ring creation failed");

        ring.write_samples(&[1, 2, 3, 4]);
        ring.write_samples(&[5, 6, 7, 8]);
        assert_eq!(ring.frames_available(), 2);
        assert_eq!(ring.frames_remaining(), 6);

        let mut out = Vec::new();
        let popped = ring.pop_samples(8, &mut out);

        assert_eq!(popped, 8);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ring.frames_available(), 0);
    }

    #[test]
    fn test_silent_write_produces_zeros() {
        // ---
        let mut ring = AudioRingBuffer::new(4, 8).expect("ring creation failed");

        ring.write_samples(&[9, 9, 9, 9]);
        ring.write_silent_samples(4);

        let mut out = Vec::new();
        ring.pop_samples(8, &mut out);
        assert_eq!(&out[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_overflow_advances_read_cursor() {
        // ---
        let mut ring = AudioRingBuffer::new(2, 3).expect("ring creation failed");

        ring.write_samples(&frame(1, 2));
        ring.write_samples(&frame(2, 2));
        ring.write_samples(&frame(3, 2)); // Full: frames 1, 2, 3
        assert_eq!(ring.overflow_count(), 0);

        ring.write_samples(&frame(4, 2)); // Overwrites frame 1
        assert_eq!(ring.overflow_count(), 1);
        assert_eq!(ring.frames_available(), 3);

        let mut out = Vec::new();
        ring.pop_samples(6, &mut out);
        assert_eq!(out, vec![2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn test_oversized_write_keeps_newest_samples() {
        // ---
        let mut ring = AudioRingBuffer::new(2, 2).expect("ring creation failed");

        let samples: Vec<i16> = (0..10).collect();
        ring.write_samples(&samples);

        assert_eq!(ring.overflow_count(), 1);
        assert_eq!(ring.samples_available(), 4);

        let mut out = Vec::new();
        ring.pop_samples(4, &mut out);
        assert_eq!(out, vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_pop_is_bounded_by_available() {
        // ---
        let mut ring = AudioRingBuffer::new(4, 4).expect("ring creation failed");
        ring.write_samples(&[1, 2, 3, 4]);

        let mut out = Vec::new();
        let popped = ring.pop_samples(100, &mut out);

        assert_eq!(popped, 4);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_shift_read_position_discards() {
        // ---
        let mut ring = AudioRingBuffer::new(2, 4).expect("ring creation failed");
        ring.write_samples(&[1, 1, 2, 2, 3, 3]);

        ring.shift_read_position(4);

        let mut out = Vec::new();
        ring.pop_samples(2, &mut out);
        assert_eq!(out, vec![3, 3]);
    }

    #[test]
    fn test_clear_keeps_overflow_count() {
        // ---
        let mut ring = AudioRingBuffer::new(2, 2).expect("ring creation failed");
        ring.write_samples(&frame(1, 2));
        ring.write_samples(&frame(2, 2));
        ring.write_samples(&frame(3, 2));
        assert_eq!(ring.overflow_count(), 1);

        ring.clear();

        assert_eq!(ring.frames_available(), 0);
        assert_eq!(ring.overflow_count(), 1);
    }

    #[test]
    fn test_wraparound_read_write() {
        // ---
        let mut ring = AudioRingBuffer::new(3, 3).expect("ring creation failed");
        let mut out = Vec::new();

        // Cycle enough frames through to wrap the cursors several times.
        for i in 0..20i16 {
            ring.write_samples(&frame(i, 3));
            ring.pop_samples(3, &mut out);
            assert_eq!(out, frame(i, 3));
        }
        assert_eq!(ring.overflow_count(), 0);
    }
}
