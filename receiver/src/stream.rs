//! Inbound audio stream: adaptive jitter buffering over a sample ring.
//!
//! Accepts datagram audio packets from a network intake, absorbs jitter,
//! fills losses with silence, and serves a smooth frame-aligned sample
//! stream to the mixer. The buffering depth adapts to observed inter-arrival
//! timegaps: repeated starves grow the target, quiet windows shrink it.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use inbound_audio_common::{decode_header, HEADER_LEN};
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::format::StreamFormat;
use crate::ring_buffer::AudioRingBuffer;
use crate::sequence::{SequenceArrival, SequenceNumberStats};
use crate::settings::StreamSettings;
use crate::stats::AudioStreamStats;
use crate::time_stats::{MovingMinMaxAvg, MovingStdDev, TimeWeightedAvg};

/// Sample rate of the network audio format (16kHz wideband)
pub const SAMPLE_RATE: u32 = 16_000;

/// Frames added on top of the estimator output when growing the desired
/// depth after repeated starves. Larger values drop fewer frames when the
/// buffer later shrinks back; 0 would invite a starve right after a trim.
pub const DESIRED_JITTER_BUFFER_FRAMES_PADDING: usize = 1;

/// Length of the window for the stats-snapshot timegap figures (not the
/// windows used for the desired-depth calculation).
pub const STATS_FOR_STATS_PACKET_WINDOW_SECONDS: usize = 30;

/// Window size of the time-weighted average of frames available. Every time
/// the window fills up, `current_jitter_buffer_frames` is refreshed from the
/// running average and the window restarts.
pub const FRAMES_AVAILABLE_STAT_WINDOW_USECS: u64 = 2_000_000;

/// Default ring capacity for inbound streams, in frames.
pub const INBOUND_RING_BUFFER_FRAME_CAPACITY: usize = 100;

/// Multiplier applied to the timegap standard deviation by estimator P.
pub const NUM_STDDEVS_FOR_DESIRED_JITTER: f64 = 3.0;

const USECS_PER_SECOND: u64 = 1_000_000;

/// Inbound audio stream with an adaptive jitter buffer.
///
/// Generic over the [`StreamFormat`] that understands the payload framing
/// between the sequence number and the audio samples.
///
/// # Threading
///
/// All methods take `&mut self`; a single owner (typically the intake task)
/// serializes producer, consumer, and timer roles. No method blocks.
pub struct InboundAudioStream<F: StreamFormat> {
    // ---
    format: F,
    clock: Arc<dyn Clock>,
    ring: AudioRingBuffer,
    frame_duration_usecs: u64,

    last_pop_succeeded: bool,
    last_pop_output: Vec<i16>,

    // Settings
    max_frames_over_desired: usize,
    dynamic_jitter_buffers: bool,
    static_desired_jitter_buffer_frames: usize,
    use_stddev_for_jitter_calc: bool,
    window_starve_threshold: usize,
    window_seconds_for_desired_calc_on_too_many_starves: usize,
    window_seconds_for_desired_reduction: usize,

    desired_jitter_buffer_frames: usize,

    is_starved: bool,
    has_started: bool,

    // Cumulative counters
    consecutive_not_mixed_count: u64,
    starve_count: u64,
    silent_frames_dropped: u64,
    old_frames_dropped: u64,

    sequence_stats: SequenceNumberStats,

    // Timegap estimators
    last_packet_received_usecs: Option<u64>,
    time_gap_stats_for_starve_window: MovingMinMaxAvg,
    stddev_stats_for_starve_window: MovingStdDev,
    calculated_frames_using_max_gap: usize,
    calculated_frames_using_stddev: usize,
    time_gap_stats_for_reduction: MovingMinMaxAvg,

    // Stats-snapshot window
    time_gap_stats_for_stats_packet: MovingMinMaxAvg,
    stddev_stats_for_stats_packet: MovingStdDev,

    starve_history: VecDeque<u64>,

    frames_available_stat: TimeWeightedAvg,
    current_jitter_buffer_frames: usize,
}

impl<F: StreamFormat> InboundAudioStream<F> {
    // ---
    /// Creates a stream with a wall-clock time source.
    ///
    /// # Errors
    ///
    /// Returns error if either ring dimension is zero.
    pub fn new(
        frame_sample_count: usize,
        frame_capacity: usize,
        settings: StreamSettings,
        format: F,
    ) -> Result<Self> {
        // ---
        Self::with_clock(
            frame_sample_count,
            frame_capacity,
            settings,
            format,
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Creates a stream reading time from the given clock.
    ///
    /// # Errors
    ///
    /// Returns error if either ring dimension is zero.
    pub fn with_clock(
        frame_sample_count: usize,
        frame_capacity: usize,
        settings: StreamSettings,
        format: F,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        // ---
        let ring = AudioRingBuffer::new(frame_sample_count, frame_capacity)?;
        let frame_duration_usecs =
            (frame_sample_count as u64 * USECS_PER_SECOND) / u64::from(SAMPLE_RATE);
        let now = clock.now_usecs();

        let starve_window = settings.window_seconds_for_desired_calc_on_too_many_starves;
        let reduction_window = settings.window_seconds_for_desired_reduction;

        let mut stream = Self {
            format,
            clock,
            ring,
            frame_duration_usecs,
            last_pop_succeeded: false,
            last_pop_output: Vec::new(),
            max_frames_over_desired: settings.max_frames_over_desired,
            dynamic_jitter_buffers: settings.dynamic_jitter_buffers,
            static_desired_jitter_buffer_frames: settings.static_desired_jitter_buffer_frames,
            use_stddev_for_jitter_calc: settings.use_stddev_for_jitter_calc,
            window_starve_threshold: settings.window_starve_threshold,
            window_seconds_for_desired_calc_on_too_many_starves: starve_window,
            window_seconds_for_desired_reduction: reduction_window,
            desired_jitter_buffer_frames: 0,
            is_starved: true,
            has_started: false,
            consecutive_not_mixed_count: 0,
            starve_count: 0,
            silent_frames_dropped: 0,
            old_frames_dropped: 0,
            sequence_stats: SequenceNumberStats::new(),
            last_packet_received_usecs: None,
            time_gap_stats_for_starve_window: MovingMinMaxAvg::new(starve_window),
            stddev_stats_for_starve_window: MovingStdDev::new(starve_window),
            calculated_frames_using_max_gap: 0,
            calculated_frames_using_stddev: 0,
            time_gap_stats_for_reduction: MovingMinMaxAvg::new(reduction_window),
            time_gap_stats_for_stats_packet: MovingMinMaxAvg::new(
                STATS_FOR_STATS_PACKET_WINDOW_SECONDS,
            ),
            stddev_stats_for_stats_packet: MovingStdDev::new(STATS_FOR_STATS_PACKET_WINDOW_SECONDS),
            starve_history: VecDeque::new(),
            frames_available_stat: TimeWeightedAvg::new(now),
            current_jitter_buffer_frames: 0,
        };
        stream.desired_jitter_buffer_frames = stream.initial_desired_frames();

        Ok(stream)
    }

    /// Parses one datagram into the stream. Returns the number of bytes
    /// consumed; malformed tails are discarded without touching state.
    pub fn parse_data(&mut self, packet: &[u8]) -> usize {
        // ---
        let (packet_type, sequence) = match decode_header(packet) {
            Ok(header) => header,
            Err(e) => {
                warn!("Discarding malformed packet: {}", e);
                return 0;
            }
        };
        let mut read_bytes = HEADER_LEN;
        let payload = &packet[HEADER_LEN..];

        let arrival = self.sequence_stats.record(sequence);
        match arrival {
            SequenceArrival::Unreasonable => {
                // Sender restarted or the stream drifted beyond repair.
                self.flush_and_resync();
                return read_bytes;
            }
            SequenceArrival::Duplicate => {
                debug!("Discarding duplicate packet: seq={}", sequence);
            }
            SequenceArrival::Late { offset } => {
                // Its slot was already filled with silence when the gap was
                // detected; the data has nowhere coherent to go.
                debug!(
                    "Discarding late packet: seq={} ({} behind expected)",
                    sequence, offset
                );
            }
            SequenceArrival::OnTime | SequenceArrival::Early { .. } => {
                let props = match self.format.parse_stream_properties(packet_type, payload) {
                    Ok(props) => props,
                    Err(e) => {
                        warn!("Failed to parse stream properties for seq={}: {}", sequence, e);
                        return read_bytes;
                    }
                };
                read_bytes += props.properties_len;
                let after_props = &payload[props.properties_len..];

                if let SequenceArrival::Early { gap } = arrival {
                    self.write_samples_for_dropped_packets(
                        gap as usize * props.num_audio_samples,
                    );
                }

                if props.silent {
                    self.write_droppable_silent_samples(props.num_audio_samples);
                } else {
                    match self.format.parse_audio_data(
                        packet_type,
                        after_props,
                        props.num_audio_samples,
                        &mut self.ring,
                    ) {
                        Ok(consumed) => read_bytes += consumed,
                        Err(e) => {
                            warn!("Failed to parse audio data for seq={}: {}", sequence, e);
                            return read_bytes;
                        }
                    }
                }

                self.packet_received_update_timing_stats();
            }
        }

        // Trim old frames so audio delay cannot build past the allowed excess.
        let frames_available = self.ring.frames_available();
        if frames_available > self.desired_jitter_buffer_frames + self.max_frames_over_desired {
            let frames_to_drop = frames_available - self.desired_jitter_buffer_frames;
            self.ring
                .shift_read_position(frames_to_drop * self.ring.frame_sample_count());
            self.old_frames_dropped += frames_to_drop as u64;
            debug!(
                "Dropped {} old frames (target {} frames)",
                frames_to_drop, self.desired_jitter_buffer_frames
            );
        }

        if self.is_starved && self.ring.frames_available() >= self.desired_jitter_buffer_frames {
            self.is_starved = false;
        }
        self.frames_available_changed();

        read_bytes
    }

    /// Pops up to `max_frames` whole frames into the last-pop output.
    ///
    /// While the stream is refilling after a starve, pops return zero until
    /// the buffer reaches the desired depth. With `all_or_nothing`, a pop
    /// that cannot be fully satisfied pops nothing. A zero pop with
    /// `starve_if_no_frames_popped` records a starve.
    pub fn pop_frames(
        &mut self,
        max_frames: usize,
        all_or_nothing: bool,
        starve_if_no_frames_popped: bool,
    ) -> usize {
        // ---
        let frame_samples = self.ring.frame_sample_count();
        let samples_popped = self.pop_samples_internal(
            max_frames * frame_samples,
            all_or_nothing,
            starve_if_no_frames_popped,
            frame_samples,
        );
        samples_popped / frame_samples
    }

    /// Sample-granularity analog of [`pop_frames`](Self::pop_frames).
    pub fn pop_samples(
        &mut self,
        max_samples: usize,
        all_or_nothing: bool,
        starve_if_no_samples_popped: bool,
    ) -> usize {
        // ---
        self.pop_samples_internal(max_samples, all_or_nothing, starve_if_no_samples_popped, 1)
    }

    /// Whether the most recent pop produced samples.
    pub fn last_pop_succeeded(&self) -> bool {
        // ---
        self.last_pop_succeeded
    }

    /// Samples produced by the most recent successful pop. Valid until the
    /// next pop or reset.
    pub fn last_pop_output(&self) -> &[i16] {
        // ---
        &self.last_pop_output
    }

    /// Records a starve on behalf of the consumer (e.g. the mixer emitted
    /// silence from its own timeline).
    pub fn set_to_starved(&mut self) {
        // ---
        let now = self.clock.now_usecs();

        self.starve_count += 1;
        self.starve_history.push_back(now);
        self.prune_starve_history(now);

        if self.dynamic_jitter_buffers
            && self.starve_history.len() >= self.window_starve_threshold
        {
            // Repeated starves in the window: jump the target straight to
            // what the timegap estimators say the network needs, padded.
            let candidate = self.calculated_jitter_buffer_frames();
            let grown = self.clamp_desired(candidate + DESIRED_JITTER_BUFFER_FRAMES_PADDING);
            if grown > self.desired_jitter_buffer_frames {
                info!(
                    "{} starves within {}s; growing desired jitter buffer {} -> {} frames",
                    self.starve_history.len(),
                    self.window_seconds_for_desired_calc_on_too_many_starves,
                    self.desired_jitter_buffer_frames,
                    grown
                );
                self.desired_jitter_buffer_frames = grown;
            }
        }

        self.is_starved = true;
    }

    /// Drops all buffered frames without resetting statistics.
    pub fn clear_buffer(&mut self) {
        // ---
        self.ring.clear();
        self.frames_available_stat.reset(self.clock.now_usecs());
        self.current_jitter_buffer_frames = 0;
    }

    /// Zeroes all statistics, estimator windows, and sequence accounting.
    pub fn reset_stats(&mut self) {
        // ---
        let now = self.clock.now_usecs();

        self.consecutive_not_mixed_count = 0;
        self.starve_count = 0;
        self.silent_frames_dropped = 0;
        self.old_frames_dropped = 0;
        self.ring.reset_overflow_count();
        self.sequence_stats.reset();
        self.last_packet_received_usecs = None;
        self.time_gap_stats_for_starve_window.reset();
        self.stddev_stats_for_starve_window.reset();
        self.time_gap_stats_for_reduction.reset();
        self.time_gap_stats_for_stats_packet.reset();
        self.stddev_stats_for_stats_packet.reset();
        self.calculated_frames_using_max_gap = 0;
        self.calculated_frames_using_stddev = 0;
        self.starve_history.clear();
        self.frames_available_stat.reset(now);
        self.current_jitter_buffer_frames = 0;
    }

    /// Clears the buffer, resets statistics, and resyncs; the stream comes
    /// back as if freshly constructed with its current settings.
    pub fn reset(&mut self) {
        // ---
        self.ring.clear();
        self.last_pop_succeeded = false;
        self.last_pop_output.clear();
        self.is_starved = true;
        self.has_started = false;
        self.desired_jitter_buffer_frames = self.initial_desired_frames();
        self.reset_stats();
    }

    /// Applies a full settings struct through the granular setters.
    pub fn set_settings(&mut self, settings: StreamSettings) {
        // ---
        self.set_max_frames_over_desired(settings.max_frames_over_desired);
        self.set_dynamic_jitter_buffers(settings.dynamic_jitter_buffers);
        self.set_static_desired_jitter_buffer_frames(
            settings.static_desired_jitter_buffer_frames,
        );
        self.set_use_stddev_for_jitter_calc(settings.use_stddev_for_jitter_calc);
        self.set_window_starve_threshold(settings.window_starve_threshold);
        self.set_window_seconds_for_desired_calc_on_too_many_starves(
            settings.window_seconds_for_desired_calc_on_too_many_starves,
        );
        self.set_window_seconds_for_desired_reduction(
            settings.window_seconds_for_desired_reduction,
        );
    }

    pub fn set_max_frames_over_desired(&mut self, max_frames_over_desired: usize) {
        // ---
        self.max_frames_over_desired = max_frames_over_desired;
        self.desired_jitter_buffer_frames =
            self.clamp_desired(self.desired_jitter_buffer_frames);
    }

    pub fn set_dynamic_jitter_buffers(&mut self, dynamic_jitter_buffers: bool) {
        // ---
        if !dynamic_jitter_buffers {
            self.desired_jitter_buffer_frames =
                self.clamp_desired(self.static_desired_jitter_buffer_frames);
        } else if !self.dynamic_jitter_buffers {
            // Entering dynamic mode: start low and let adaptation grow it.
            self.desired_jitter_buffer_frames = self.clamp_desired(1);
        }
        self.dynamic_jitter_buffers = dynamic_jitter_buffers;
    }

    pub fn set_static_desired_jitter_buffer_frames(&mut self, frames: usize) {
        // ---
        self.static_desired_jitter_buffer_frames = frames;
        if !self.dynamic_jitter_buffers {
            self.desired_jitter_buffer_frames = self.clamp_desired(frames);
        }
    }

    pub fn set_use_stddev_for_jitter_calc(&mut self, use_stddev: bool) {
        // ---
        self.use_stddev_for_jitter_calc = use_stddev;
    }

    pub fn set_window_starve_threshold(&mut self, threshold: usize) {
        // ---
        self.window_starve_threshold = threshold;
    }

    pub fn set_window_seconds_for_desired_calc_on_too_many_starves(&mut self, seconds: usize) {
        // ---
        self.window_seconds_for_desired_calc_on_too_many_starves = seconds;
        self.time_gap_stats_for_starve_window.set_window_intervals(seconds);
        self.stddev_stats_for_starve_window.set_window_intervals(seconds);
    }

    pub fn set_window_seconds_for_desired_reduction(&mut self, seconds: usize) {
        // ---
        self.window_seconds_for_desired_reduction = seconds;
        self.time_gap_stats_for_reduction.set_window_intervals(seconds);
    }

    /// Per-second maintenance: slides the estimator windows, recomputes both
    /// depth estimates, applies the shrink policy, and refreshes the
    /// time-weighted depth figure. Without it, static mode still works;
    /// only dynamic adaptation degrades.
    pub fn per_second_update(&mut self) {
        // ---
        let now = self.clock.now_usecs();

        self.time_gap_stats_for_stats_packet.current_interval_complete();
        self.stddev_stats_for_stats_packet.current_interval_complete();
        self.time_gap_stats_for_starve_window.current_interval_complete();
        self.stddev_stats_for_starve_window.current_interval_complete();
        self.time_gap_stats_for_reduction.current_interval_complete();

        self.refresh_calculated_estimates();

        if !self.dynamic_jitter_buffers {
            self.desired_jitter_buffer_frames =
                self.clamp_desired(self.static_desired_jitter_buffer_frames);
        } else if self.starves_in_window(now) == 0 {
            // A clean starve window lets the short reduction window pull the
            // target back down toward what the network currently needs.
            if let Some(max_gap) = self.time_gap_stats_for_reduction.window_max() {
                let shrink_to = self.clamp_desired(self.frames_for_gap(max_gap));
                if shrink_to < self.desired_jitter_buffer_frames {
                    debug!(
                        "Shrinking desired jitter buffer {} -> {} frames",
                        self.desired_jitter_buffer_frames, shrink_to
                    );
                    self.desired_jitter_buffer_frames = shrink_to;
                }
            }
        }
        self.desired_jitter_buffer_frames =
            self.clamp_desired(self.desired_jitter_buffer_frames);

        self.frames_available_changed();
    }

    /// Builds a snapshot of the stream's counters and derived state.
    pub fn stats(&self) -> AudioStreamStats {
        // ---
        let now = self.clock.now_usecs();

        AudioStreamStats {
            desired_jitter_buffer_frames: self.desired_jitter_buffer_frames,
            frames_available: self.ring.frames_available(),
            frames_available_avg: self.frames_available_stat.average(now),
            starve_count: self.starve_count,
            consecutive_not_mixed_count: self.consecutive_not_mixed_count,
            overflow_count: self.ring.overflow_count(),
            silent_frames_dropped: self.silent_frames_dropped,
            old_frames_dropped: self.old_frames_dropped,
            packets_received: self.sequence_stats.received(),
            packets_lost: self.sequence_stats.lost(),
            packets_early: self.sequence_stats.early(),
            packets_late: self.sequence_stats.late(),
            packets_duplicate: self.sequence_stats.duplicate(),
            packets_unreasonable: self.sequence_stats.unreasonable(),
            time_gap_window_min_usecs: self
                .time_gap_stats_for_stats_packet
                .window_min()
                .unwrap_or(0),
            time_gap_window_max_usecs: self
                .time_gap_stats_for_stats_packet
                .window_max()
                .unwrap_or(0),
            time_gap_window_avg_usecs: self
                .time_gap_stats_for_stats_packet
                .window_average()
                .unwrap_or(0.0),
            time_gap_window_stddev_usecs: self
                .stddev_stats_for_stats_packet
                .window_stddev()
                .unwrap_or(0.0),
        }
    }

    pub fn desired_jitter_buffer_frames(&self) -> usize {
        // ---
        self.desired_jitter_buffer_frames
    }

    /// Estimator output currently selected by the settings (F or P).
    pub fn calculated_jitter_buffer_frames(&self) -> usize {
        // ---
        if self.use_stddev_for_jitter_calc {
            self.calculated_frames_using_stddev
        } else {
            self.calculated_frames_using_max_gap
        }
    }

    pub fn calculated_frames_using_max_gap(&self) -> usize {
        // ---
        self.calculated_frames_using_max_gap
    }

    pub fn calculated_frames_using_stddev(&self) -> usize {
        // ---
        self.calculated_frames_using_stddev
    }

    pub fn frames_available(&self) -> usize {
        // ---
        self.ring.frames_available()
    }

    pub fn frame_sample_count(&self) -> usize {
        // ---
        self.ring.frame_sample_count()
    }

    pub fn frame_capacity(&self) -> usize {
        // ---
        self.ring.frame_capacity()
    }

    pub fn frame_duration_usecs(&self) -> u64 {
        // ---
        self.frame_duration_usecs
    }

    pub fn is_starved(&self) -> bool {
        // ---
        self.is_starved
    }

    pub fn has_started(&self) -> bool {
        // ---
        self.has_started
    }

    pub fn starve_count(&self) -> u64 {
        // ---
        self.starve_count
    }

    pub fn packets_received(&self) -> u64 {
        // ---
        self.sequence_stats.received()
    }

    /// Depth the buffer has recently averaged, per the time-weighted stat.
    pub fn current_jitter_buffer_frames(&self) -> usize {
        // ---
        self.current_jitter_buffer_frames
    }

    fn pop_samples_internal(
        &mut self,
        max_samples: usize,
        all_or_nothing: bool,
        starve_if_none_popped: bool,
        granularity: usize,
    ) -> usize {
        // ---
        if max_samples == 0 {
            return 0;
        }

        if self.is_starved {
            // Refilling after a starve; deny pops until the buffer is back
            // at the desired depth.
            self.consecutive_not_mixed_count += 1;
            self.last_pop_succeeded = false;
            return 0;
        }

        let poppable = (self.ring.samples_available() / granularity) * granularity;
        let samples_to_pop = if poppable >= max_samples {
            max_samples
        } else if !all_or_nothing && poppable > 0 {
            poppable
        } else {
            0
        };

        if samples_to_pop > 0 {
            self.pop_samples_no_check(samples_to_pop);
        } else {
            if starve_if_none_popped {
                self.set_to_starved();
            }
            self.consecutive_not_mixed_count += 1;
            self.last_pop_succeeded = false;
        }

        samples_to_pop
    }

    fn pop_samples_no_check(&mut self, samples: usize) {
        // ---
        self.ring.pop_samples(samples, &mut self.last_pop_output);
        self.last_pop_succeeded = true;
        self.has_started = true;
        self.consecutive_not_mixed_count = 0;
        self.frames_available_changed();
    }

    /// Synthesizes loss-fill for packets a gap skipped over.
    fn write_samples_for_dropped_packets(&mut self, num_samples: usize) -> usize {
        // ---
        self.write_droppable_silent_samples(num_samples)
    }

    /// Writes silent samples, eliding whole frames of them while the buffer
    /// has been averaging deeper than the target. The elision lets the
    /// buffer drain back toward the desired depth instead of compounding
    /// latency with every loss.
    fn write_droppable_silent_samples(&mut self, num_silent_samples: usize) -> usize {
        // ---
        let frame_samples = self.ring.frame_sample_count();
        let desired_plus_padding =
            self.desired_jitter_buffer_frames + DESIRED_JITTER_BUFFER_FRAMES_PADDING;

        let mut samples_to_write = num_silent_samples;
        if num_silent_samples >= frame_samples
            && self.current_jitter_buffer_frames > desired_plus_padding
        {
            let droppable = self.current_jitter_buffer_frames - desired_plus_padding;
            let fill_frames = num_silent_samples / frame_samples;
            let dropped = droppable.min(fill_frames);

            self.current_jitter_buffer_frames -= dropped;
            self.silent_frames_dropped += dropped as u64;
            self.frames_available_stat.reset(self.clock.now_usecs());
            samples_to_write -= dropped * frame_samples;

            debug!(
                "Elided {} silent fill frames (buffer averaging {} frames, target {})",
                dropped,
                self.current_jitter_buffer_frames + dropped,
                desired_plus_padding
            );
        }

        self.ring.write_silent_samples(samples_to_write)
    }

    fn packet_received_update_timing_stats(&mut self) {
        // ---
        let now = self.clock.now_usecs();

        if let Some(last) = self.last_packet_received_usecs {
            let gap = now.saturating_sub(last);
            self.time_gap_stats_for_stats_packet.update(gap);
            self.stddev_stats_for_stats_packet.update(gap);
            self.time_gap_stats_for_starve_window.update(gap);
            self.stddev_stats_for_starve_window.update(gap);
            self.time_gap_stats_for_reduction.update(gap);
        }
        self.last_packet_received_usecs = Some(now);
    }

    fn refresh_calculated_estimates(&mut self) {
        // ---
        if let Some(max_gap) = self.time_gap_stats_for_starve_window.window_max() {
            self.calculated_frames_using_max_gap =
                self.clamp_desired(self.frames_for_gap(max_gap));
        }
        if let Some(stddev) = self.stddev_stats_for_starve_window.window_stddev() {
            let frames = (NUM_STDDEVS_FOR_DESIRED_JITTER * stddev
                / self.frame_duration_usecs as f64)
                .ceil() as usize;
            self.calculated_frames_using_stddev = self.clamp_desired(frames);
        }
    }

    /// Frames needed to cover a timegap, rounded up.
    fn frames_for_gap(&self, gap_usecs: u64) -> usize {
        // ---
        gap_usecs.div_ceil(self.frame_duration_usecs) as usize
    }

    fn clamp_desired(&self, frames: usize) -> usize {
        // ---
        frames.min(
            self.ring
                .frame_capacity()
                .saturating_sub(self.max_frames_over_desired),
        )
    }

    fn initial_desired_frames(&self) -> usize {
        // ---
        if self.dynamic_jitter_buffers {
            self.clamp_desired(1)
        } else {
            self.clamp_desired(self.static_desired_jitter_buffer_frames)
        }
    }

    fn starves_in_window(&mut self, now_usecs: u64) -> usize {
        // ---
        self.prune_starve_history(now_usecs);
        self.starve_history.len()
    }

    fn prune_starve_history(&mut self, now_usecs: u64) {
        // ---
        let window_usecs =
            self.window_seconds_for_desired_calc_on_too_many_starves as u64 * USECS_PER_SECOND;
        while let Some(&oldest) = self.starve_history.front() {
            if now_usecs.saturating_sub(oldest) > window_usecs {
                self.starve_history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Flushes buffered audio after an unreasonable sequence jump. Network
    /// timing statistics and cumulative counters survive; only the buffered
    /// content and the arrival baseline are discarded.
    fn flush_and_resync(&mut self) {
        // ---
        debug!("Flushing stream after unreasonable sequence jump");
        self.ring.clear();
        self.last_pop_succeeded = false;
        self.is_starved = true;
        self.last_packet_received_usecs = None;
        self.frames_available_changed();
    }

    fn frames_available_changed(&mut self) {
        // ---
        let now = self.clock.now_usecs();
        self.frames_available_stat
            .update(now, self.ring.frames_available());

        if self.frames_available_stat.elapsed_usecs(now) >= FRAMES_AVAILABLE_STAT_WINDOW_USECS {
            self.current_jitter_buffer_frames =
                self.frames_available_stat.average(now).ceil() as usize;
            self.frames_available_stat.reset(now);
        }
    }
}
