use anyhow::Result;
use clap::Parser;
use inbound_audio_common::{init_tracing, MetricsContext, MetricsServerConfig};
use receiver::{
    receive_loop, InboundAudioStream, PacketReceiver, RawPcmFormat, StreamSettings,
    INBOUND_RING_BUFFER_FRAME_CAPACITY,
};
use std::net::SocketAddr;
use tracing::info;

/// Samples per frame (20ms at 16kHz)
const SAMPLES_PER_FRAME: usize = 320;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5004")]
    port: u16,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9100)
    #[arg(long)]
    metrics: Option<SocketAddr>,

    /// Pin the jitter buffer to this many frames instead of adapting
    #[arg(long)]
    static_frames: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let args = Args::parse();
    info!("Starting inbound audio stream receiver");
    info!("Listening on port: {}", args.port);

    let mut settings = StreamSettings::default();
    if let Some(frames) = args.static_frames {
        settings.dynamic_jitter_buffers = false;
        settings.static_desired_jitter_buffer_frames = frames;
        info!("Jitter buffer pinned to {} frames", frames);
    }

    let metrics = match args.metrics {
        Some(bind) => {
            let ctx = MetricsContext::new("receiver")?;
            let _metrics_server = ctx.spawn_metrics_server(MetricsServerConfig::new(bind));
            info!("Serving metrics on http://{}/metrics", bind);
            Some(ctx)
        }
        None => None,
    };

    let mut stream = InboundAudioStream::new(
        SAMPLES_PER_FRAME,
        INBOUND_RING_BUFFER_FRAME_CAPACITY,
        settings,
        RawPcmFormat,
    )?;
    let mut receiver = PacketReceiver::new(args.port).await?;

    // Popped frames go to the downstream mixer; stdout-adjacent consumers
    // plug in here.
    receive_loop(&mut receiver, &mut stream, metrics.as_ref(), |_frame| {}).await
}
