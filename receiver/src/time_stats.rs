//! Moving-window statistics over packet arrival timegaps.
//!
//! The aggregators group samples into one-second intervals: the per-second
//! tick closes the current interval and the window is the last N completed
//! intervals plus whatever has accumulated since. Empty intervals still age
//! old data out of the window, so a quiet network forgets its past spikes.

use std::collections::VecDeque;

/// Per-interval min/max/sum accumulator.
#[derive(Debug, Clone, Copy, Default)]
struct IntervalStats {
    // ---
    min: u64,
    max: u64,
    sum: u64,
    count: usize,
}

impl IntervalStats {
    // ---
    fn update(&mut self, sample: u64) {
        // ---
        if self.count == 0 || sample < self.min {
            self.min = sample;
        }
        if self.count == 0 || sample > self.max {
            self.max = sample;
        }
        self.sum += sample;
        self.count += 1;
    }
}

/// Moving min/max/average over a window of one-second intervals.
#[derive(Debug)]
pub struct MovingMinMaxAvg {
    // ---
    window_intervals: usize,
    intervals: VecDeque<IntervalStats>,
    current: IntervalStats,
}

impl MovingMinMaxAvg {
    // ---
    pub fn new(window_intervals: usize) -> Self {
        // ---
        Self {
            window_intervals,
            intervals: VecDeque::new(),
            current: IntervalStats::default(),
        }
    }

    /// Folds a sample into the currently accumulating interval.
    pub fn update(&mut self, sample: u64) {
        // ---
        self.current.update(sample);
    }

    /// Closes the current interval, sliding the window forward one step.
    pub fn current_interval_complete(&mut self) {
        // ---
        self.intervals.push_back(self.current);
        self.current = IntervalStats::default();
        while self.intervals.len() > self.window_intervals {
            self.intervals.pop_front();
        }
    }

    /// Largest sample in the window, or `None` if the window is empty.
    pub fn window_max(&self) -> Option<u64> {
        // ---
        self.populated().map(|s| s.max).max()
    }

    /// Smallest sample in the window, or `None` if the window is empty.
    pub fn window_min(&self) -> Option<u64> {
        // ---
        self.populated().map(|s| s.min).min()
    }

    /// Mean of the samples in the window, or `None` if the window is empty.
    pub fn window_average(&self) -> Option<f64> {
        // ---
        let count: usize = self.populated().map(|s| s.count).sum();
        if count == 0 {
            return None;
        }
        let sum: u64 = self.populated().map(|s| s.sum).sum();
        Some(sum as f64 / count as f64)
    }

    /// Number of samples in the window.
    pub fn sample_count(&self) -> usize {
        // ---
        self.populated().map(|s| s.count).sum()
    }

    /// Changes the window length, trimming the oldest intervals if shrinking.
    pub fn set_window_intervals(&mut self, window_intervals: usize) {
        // ---
        self.window_intervals = window_intervals;
        while self.intervals.len() > self.window_intervals {
            self.intervals.pop_front();
        }
    }

    pub fn reset(&mut self) {
        // ---
        self.intervals.clear();
        self.current = IntervalStats::default();
    }

    fn populated(&self) -> impl Iterator<Item = &IntervalStats> {
        // ---
        self.intervals
            .iter()
            .chain(std::iter::once(&self.current))
            .filter(|s| s.count > 0)
    }
}

/// Per-interval accumulator for standard deviation.
#[derive(Debug, Clone, Copy, Default)]
struct SpreadStats {
    // ---
    sum: f64,
    sum_sq: f64,
    count: usize,
}

impl SpreadStats {
    // ---
    fn update(&mut self, sample: u64) {
        // ---
        let v = sample as f64;
        self.sum += v;
        self.sum_sq += v * v;
        self.count += 1;
    }
}

/// Moving population standard deviation over a window of one-second
/// intervals, same windowing discipline as [`MovingMinMaxAvg`].
#[derive(Debug)]
pub struct MovingStdDev {
    // ---
    window_intervals: usize,
    intervals: VecDeque<SpreadStats>,
    current: SpreadStats,
}

impl MovingStdDev {
    // ---
    pub fn new(window_intervals: usize) -> Self {
        // ---
        Self {
            window_intervals,
            intervals: VecDeque::new(),
            current: SpreadStats::default(),
        }
    }

    pub fn update(&mut self, sample: u64) {
        // ---
        self.current.update(sample);
    }

    pub fn current_interval_complete(&mut self) {
        // ---
        self.intervals.push_back(self.current);
        self.current = SpreadStats::default();
        while self.intervals.len() > self.window_intervals {
            self.intervals.pop_front();
        }
    }

    /// Standard deviation of the window, or `None` if the window is empty.
    pub fn window_stddev(&self) -> Option<f64> {
        // ---
        let (sum, sum_sq, count) = self.window_totals();
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        Some(variance.sqrt())
    }

    pub fn sample_count(&self) -> usize {
        // ---
        self.window_totals().2
    }

    pub fn set_window_intervals(&mut self, window_intervals: usize) {
        // ---
        self.window_intervals = window_intervals;
        while self.intervals.len() > self.window_intervals {
            self.intervals.pop_front();
        }
    }

    pub fn reset(&mut self) {
        // ---
        self.intervals.clear();
        self.current = SpreadStats::default();
    }

    fn window_totals(&self) -> (f64, f64, usize) {
        // ---
        let mut sum = self.current.sum;
        let mut sum_sq = self.current.sum_sq;
        let mut count = self.current.count;
        for s in &self.intervals {
            sum += s.sum;
            sum_sq += s.sum_sq;
            count += s.count;
        }
        (sum, sum_sq, count)
    }
}

/// Time-weighted average of a piecewise-constant value.
///
/// Each `update` weights the previous sample by how long it was in effect;
/// the average divides by the elapsed window time, so a briefly deep buffer
/// does not dominate a mostly shallow one.
#[derive(Debug)]
pub struct TimeWeightedAvg {
    // ---
    window_start_usecs: u64,
    last_sample: Option<(u64, usize)>,
    weighted_sum: f64,
}

impl TimeWeightedAvg {
    // ---
    pub fn new(now_usecs: u64) -> Self {
        // ---
        Self {
            window_start_usecs: now_usecs,
            last_sample: None,
            weighted_sum: 0.0,
        }
    }

    /// Records that the value changed to `sample` at `now_usecs`.
    pub fn update(&mut self, now_usecs: u64, sample: usize) {
        // ---
        if let Some((at, value)) = self.last_sample {
            self.weighted_sum += value as f64 * now_usecs.saturating_sub(at) as f64;
        }
        self.last_sample = Some((now_usecs, sample));
    }

    /// Microseconds covered by the current window.
    pub fn elapsed_usecs(&self, now_usecs: u64) -> u64 {
        // ---
        now_usecs.saturating_sub(self.window_start_usecs)
    }

    /// Time-weighted average through `now_usecs`, including the time the
    /// most recent sample has been in effect.
    pub fn average(&self, now_usecs: u64) -> f64 {
        // ---
        let elapsed = self.elapsed_usecs(now_usecs);
        match self.last_sample {
            None => 0.0,
            Some((_, value)) if elapsed == 0 => value as f64,
            Some((at, value)) => {
                let sum =
                    self.weighted_sum + value as f64 * now_usecs.saturating_sub(at) as f64;
                sum / elapsed as f64
            }
        }
    }

    /// Starts a fresh window at `now_usecs`. The most recent sample carries
    /// over as the window's initial value.
    pub fn reset(&mut self, now_usecs: u64) {
        // ---
        self.window_start_usecs = now_usecs;
        self.weighted_sum = 0.0;
        self.last_sample = self.last_sample.map(|(_, value)| (now_usecs, value));
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_min_max_avg_includes_current_interval() {
        // ---
        let mut stats = MovingMinMaxAvg::new(3);

        stats.update(10);
        stats.update(30);

        assert_eq!(stats.window_min(), Some(10));
        assert_eq!(stats.window_max(), Some(30));
        assert_eq!(stats.window_average(), Some(20.0));
    }

    #[test]
    fn test_old_intervals_age_out() {
        // ---
        let mut stats = MovingMinMaxAvg::new(2);

        stats.update(100);
        stats.current_interval_complete();
        stats.update(50);
        stats.current_interval_complete();

        assert_eq!(stats.window_max(), Some(100));

        // Two more empty intervals push the spike out of the window.
        stats.current_interval_complete();
        assert_eq!(stats.window_max(), Some(50));
        stats.current_interval_complete();
        assert_eq!(stats.window_max(), None);
    }

    #[test]
    fn test_empty_window_reports_none() {
        // ---
        let stats = MovingMinMaxAvg::new(5);

        assert_eq!(stats.window_min(), None);
        assert_eq!(stats.window_max(), None);
        assert_eq!(stats.window_average(), None);
        assert_eq!(stats.sample_count(), 0);
    }

    #[test]
    fn test_shrinking_window_trims_oldest() {
        // ---
        let mut stats = MovingMinMaxAvg::new(4);

        for v in [40u64, 30, 20, 10] {
            stats.update(v);
            stats.current_interval_complete();
        }
        assert_eq!(stats.window_max(), Some(40));

        stats.set_window_intervals(2);
        assert_eq!(stats.window_max(), Some(20));
    }

    #[test]
    fn test_stddev_of_constant_is_zero() {
        // ---
        let mut stats = MovingStdDev::new(3);

        for _ in 0..10 {
            stats.update(500);
        }
        stats.current_interval_complete();

        let stddev = stats.window_stddev().expect("window should have samples");
        assert!(stddev.abs() < 1e-9);
    }

    #[test]
    fn test_stddev_of_known_spread() {
        // ---
        let mut stats = MovingStdDev::new(3);

        // Population stddev of {0, 10} is 5.
        stats.update(0);
        stats.update(10);

        let stddev = stats.window_stddev().expect("window should have samples");
        assert!((stddev - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_stddev_window_ages_out() {
        // ---
        let mut stats = MovingStdDev::new(1);

        stats.update(0);
        stats.update(1000);
        stats.current_interval_complete();
        assert!(stats.window_stddev().unwrap() > 0.0);

        stats.current_interval_complete();
        assert_eq!(stats.window_stddev(), None);
    }

    #[test]
    fn test_time_weighted_average() {
        // ---
        let mut avg = TimeWeightedAvg::new(0);

        // Value 4 for 1 second, then value 2 for 3 seconds.
        avg.update(0, 4);
        avg.update(1_000_000, 2);

        let got = avg.average(4_000_000);
        let expected = (4.0 * 1.0 + 2.0 * 3.0) / 4.0;
        assert!((got - expected).abs() < 1e-9);
    }

    #[test]
    fn test_time_weighted_reset_carries_last_sample() {
        // ---
        let mut avg = TimeWeightedAvg::new(0);

        avg.update(0, 8);
        avg.reset(2_000_000);

        // The value 8 is still in effect after the reset.
        let got = avg.average(3_000_000);
        assert!((got - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_weighted_empty_is_zero() {
        // ---
        let avg = TimeWeightedAvg::new(0);
        assert_eq!(avg.average(5_000_000), 0.0);
    }
}
