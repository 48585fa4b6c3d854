//! Runtime-tunable jitter buffer settings.
//!
//! Defaults match long-running production tuning for conversational audio:
//! dynamic depth adaptation on, the max-gap estimator, and a 50-second
//! starve window against a 10-second reduction window.

pub const DEFAULT_MAX_FRAMES_OVER_DESIRED: usize = 10;
pub const DEFAULT_DYNAMIC_JITTER_BUFFERS: bool = true;
pub const DEFAULT_STATIC_DESIRED_JITTER_BUFFER_FRAMES: usize = 1;
pub const DEFAULT_USE_STDDEV_FOR_JITTER_CALC: bool = false;
pub const DEFAULT_WINDOW_STARVE_THRESHOLD: usize = 3;
pub const DEFAULT_WINDOW_SECONDS_FOR_DESIRED_CALC_ON_TOO_MANY_STARVES: usize = 50;
pub const DEFAULT_WINDOW_SECONDS_FOR_DESIRED_REDUCTION: usize = 10;

/// Tuning knobs for an inbound stream.
///
/// All fields can also be changed on a live stream through the granular
/// setters; window changes resize the corresponding aggregators.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    // ---
    /// Frames the ring may hold beyond the desired depth before old frames
    /// are trimmed
    pub max_frames_over_desired: usize,

    /// If false, the desired depth is pinned to
    /// `static_desired_jitter_buffer_frames`
    pub dynamic_jitter_buffers: bool,

    /// Target depth used in static mode
    pub static_desired_jitter_buffer_frames: usize,

    /// If true the std-dev estimator drives the desired depth; otherwise
    /// the max-gap estimator does
    pub use_stddev_for_jitter_calc: bool,

    /// Starves within the starve window that trigger depth growth
    pub window_starve_threshold: usize,

    /// Seconds of timegap history feeding both estimators, and the span of
    /// the starve window
    pub window_seconds_for_desired_calc_on_too_many_starves: usize,

    /// Seconds of timegap history feeding the shrink candidate
    pub window_seconds_for_desired_reduction: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        // ---
        Self {
            max_frames_over_desired: DEFAULT_MAX_FRAMES_OVER_DESIRED,
            dynamic_jitter_buffers: DEFAULT_DYNAMIC_JITTER_BUFFERS,
            static_desired_jitter_buffer_frames: DEFAULT_STATIC_DESIRED_JITTER_BUFFER_FRAMES,
            use_stddev_for_jitter_calc: DEFAULT_USE_STDDEV_FOR_JITTER_CALC,
            window_starve_threshold: DEFAULT_WINDOW_STARVE_THRESHOLD,
            window_seconds_for_desired_calc_on_too_many_starves:
                DEFAULT_WINDOW_SECONDS_FOR_DESIRED_CALC_ON_TOO_MANY_STARVES,
            window_seconds_for_desired_reduction: DEFAULT_WINDOW_SECONDS_FOR_DESIRED_REDUCTION,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_defaults() {
        // ---
        let settings = StreamSettings::default();

        assert_eq!(settings.max_frames_over_desired, 10);
        assert!(settings.dynamic_jitter_buffers);
        assert_eq!(settings.static_desired_jitter_buffer_frames, 1);
        assert!(!settings.use_stddev_for_jitter_calc);
        assert_eq!(settings.window_starve_threshold, 3);
        assert_eq!(
            settings.window_seconds_for_desired_calc_on_too_many_starves,
            50
        );
        assert_eq!(settings.window_seconds_for_desired_reduction, 10);
    }
}
