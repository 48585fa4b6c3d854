//! Inbound Audio Stream Receiver Library
//!
//! Provides adaptive jitter buffering for datagram-delivered audio streams.
//! This library can be used to build custom receivers or for integration
//! testing.

pub mod clock;
pub mod format;
pub mod network;
pub mod ring_buffer;
pub mod sequence;
pub mod settings;
pub mod stats;
pub mod stream;
pub mod time_stats;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use format::{RawPcmFormat, StreamFormat, StreamProperties};
pub use inbound_audio_common::{PacketType, StreamPacket};
pub use network::PacketReceiver;
pub use ring_buffer::AudioRingBuffer;
pub use sequence::{SequenceArrival, SequenceNumberStats};
pub use settings::StreamSettings;
pub use stats::AudioStreamStats;
pub use stream::{InboundAudioStream, INBOUND_RING_BUFFER_FRAME_CAPACITY, SAMPLE_RATE};

use anyhow::Result;
use inbound_audio_common::MetricsContext;
use std::time::Duration;

/// How many per-second ticks pass between stats log lines.
const STATS_LOG_INTERVAL_SECS: u64 = 5;

/// Runs the intake loop: datagrams in, frames out.
///
/// This is the main reception function that wires the components together:
/// network intake, the jitter-buffering stream, the per-second stats tick,
/// and frame-paced pops handed to `on_frame` for playback or mixing.
///
/// # Arguments
///
/// * `receiver` - Network intake for incoming datagrams
/// * `stream` - The inbound stream doing the buffering
/// * `metrics` - Optional Prometheus context refreshed every second
/// * `on_frame` - Called with each popped frame's samples
///
/// # Errors
///
/// Returns error if network reception fails critically.
pub async fn receive_loop<F: StreamFormat>(
    receiver: &mut PacketReceiver,
    stream: &mut InboundAudioStream<F>,
    metrics: Option<&MetricsContext>,
    mut on_frame: impl FnMut(&[i16]),
) -> Result<()> {
    // ---
    let mut pop_timer = tokio::time::interval(Duration::from_micros(stream.frame_duration_usecs()));
    let mut second_timer = tokio::time::interval(Duration::from_secs(1));
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            result = receiver.receive() => {
                match result? {
                    Some(datagram) => {
                        stream.parse_data(&datagram);
                        if let Some(ctx) = metrics {
                            ctx.datagrams_received_total.inc();
                        }
                    }
                    None => {
                        // Invalid datagram, already logged by the receiver
                        if let Some(ctx) = metrics {
                            ctx.datagrams_invalid_total.inc();
                        }
                    }
                }
            }
            _ = pop_timer.tick() => {
                if stream.pop_frames(1, false, true) > 0 {
                    on_frame(stream.last_pop_output());
                }
            }
            _ = second_timer.tick() => {
                stream.per_second_update();
                ticks += 1;

                let snapshot = stream.stats();
                if let Some(ctx) = metrics {
                    publish_stream_stats(ctx, &snapshot);
                }
                if ticks % STATS_LOG_INTERVAL_SECS == 0 {
                    snapshot.log();
                }
            }
        }
    }
}

/// Mirrors a stats snapshot into the Prometheus gauges.
pub fn publish_stream_stats(ctx: &MetricsContext, stats: &AudioStreamStats) {
    // ---
    ctx.packets_received.set(stats.packets_received as i64);
    ctx.packets_lost.set(stats.packets_lost as i64);
    ctx.packets_late.set(stats.packets_late as i64);
    ctx.packets_duplicate.set(stats.packets_duplicate as i64);
    ctx.starves.set(stats.starve_count as i64);
    ctx.overflows.set(stats.overflow_count as i64);
    ctx.silent_frames_dropped
        .set(stats.silent_frames_dropped as i64);
    ctx.old_frames_dropped.set(stats.old_frames_dropped as i64);
    ctx.desired_jitter_buffer_frames
        .set(stats.desired_jitter_buffer_frames as i64);
    ctx.ring_frames_available.set(stats.frames_available as i64);
    ctx.frames_available_avg.set(stats.frames_available_avg);
    ctx.time_gap_window_max_seconds
        .set(stats.time_gap_window_max_usecs as f64 / 1e6);
    ctx.time_gap_window_stddev_seconds
        .set(stats.time_gap_window_stddev_usecs / 1e6);
}
