//! Stream statistics snapshot.
//!
//! A point-in-time view of the inbound stream's health, suitable for
//! periodic logging and for mirroring into Prometheus gauges.

use tracing::info;

/// Snapshot of the stream's counters and derived state.
///
/// Timegap figures cover the fixed stats window (30 seconds); everything
/// else is cumulative since the last stats reset.
#[derive(Debug, Clone, Default)]
pub struct AudioStreamStats {
    // ---
    /// Current target depth in frames
    pub desired_jitter_buffer_frames: usize,

    /// Frames buffered right now
    pub frames_available: usize,

    /// Time-weighted average of frames available
    pub frames_available_avg: f64,

    /// Times the consumer found too few frames
    pub starve_count: u64,

    /// Pops denied since the last successful one
    pub consecutive_not_mixed_count: u64,

    /// Ring writes that overwrote unread samples
    pub overflow_count: u64,

    /// Loss-fill frames elided to drain the buffer
    pub silent_frames_dropped: u64,

    /// Frames trimmed for exceeding the allowed excess
    pub old_frames_dropped: u64,

    /// Packets folded into the sequence progression
    pub packets_received: u64,

    /// Packets currently unaccounted for
    pub packets_lost: u64,

    /// Packets that skipped ahead of the expected sequence
    pub packets_early: u64,

    /// Packets that arrived behind the expected sequence
    pub packets_late: u64,

    /// Packets discarded as duplicates
    pub packets_duplicate: u64,

    /// Packets that forced a resync
    pub packets_unreasonable: u64,

    /// Smallest inter-arrival gap in the stats window (microseconds)
    pub time_gap_window_min_usecs: u64,

    /// Largest inter-arrival gap in the stats window (microseconds)
    pub time_gap_window_max_usecs: u64,

    /// Mean inter-arrival gap in the stats window (microseconds)
    pub time_gap_window_avg_usecs: f64,

    /// Standard deviation of inter-arrival gaps in the stats window
    pub time_gap_window_stddev_usecs: f64,
}

impl AudioStreamStats {
    // ---
    /// Calculates current packet loss percentage.
    pub fn loss_percentage(&self) -> f64 {
        // ---
        let total = self.packets_received + self.packets_lost;
        if total == 0 {
            0.0
        } else {
            (self.packets_lost as f64 / total as f64) * 100.0
        }
    }

    /// Logs the snapshot at info level.
    pub fn log(&self) {
        // ---
        info!(
            "Stream: {}/{} frames (avg {:.1}), {} pkts, {:.2}% loss, {} starves, \
             {} silent dropped, {} old dropped, {} overflows, gap max {}us",
            self.frames_available,
            self.desired_jitter_buffer_frames,
            self.frames_available_avg,
            self.packets_received,
            self.loss_percentage(),
            self.starve_count,
            self.silent_frames_dropped,
            self.old_frames_dropped,
            self.overflow_count,
            self.time_gap_window_max_usecs
        );
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_loss_percentage() {
        // ---
        let stats = AudioStreamStats {
            packets_received: 3,
            packets_lost: 3,
            ..Default::default()
        };

        assert_eq!(stats.loss_percentage(), 50.0);
    }

    #[test]
    fn test_loss_percentage_empty() {
        // ---
        let stats = AudioStreamStats::default();
        assert_eq!(stats.loss_percentage(), 0.0);
    }
}
