//! Prometheus metrics (Rust `prometheus` crate).
//!
//! One `MetricsContext` is intended per process. Intake counters are bumped
//! at event sites; stream-level values are gauges refreshed from the
//! per-second stats snapshot, since the stream owns its cumulative counts.

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Configuration for the built-in Prometheus scrape endpoint.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    // ---
    /// Address to bind, e.g. `127.0.0.1:9100`.
    pub bind: SocketAddr,
}

impl MetricsServerConfig {
    // ---
    pub fn new(bind: SocketAddr) -> Self {
        // ---
        Self { bind }
    }
}

/// Prometheus metrics registry + handles.
///
/// This is a thin, explicit wrapper around the `prometheus` crate so hot-path
/// instrumentation is just counter increments / gauge stores.
#[derive(Clone)]
pub struct MetricsContext {
    // ---
    registry: Registry,

    // Intake counters
    pub datagrams_received_total: IntCounter,
    pub datagrams_invalid_total: IntCounter,

    // Stream counters, mirrored from the stats snapshot
    pub packets_received: IntGauge,
    pub packets_lost: IntGauge,
    pub packets_late: IntGauge,
    pub packets_duplicate: IntGauge,
    pub starves: IntGauge,
    pub overflows: IntGauge,
    pub silent_frames_dropped: IntGauge,
    pub old_frames_dropped: IntGauge,

    // Buffer gauges
    pub desired_jitter_buffer_frames: IntGauge,
    pub ring_frames_available: IntGauge,
    pub frames_available_avg: Gauge,

    // Timegap gauges (seconds, over the stats window)
    pub time_gap_window_max_seconds: Gauge,
    pub time_gap_window_stddev_seconds: Gauge,
}

impl MetricsContext {
    // ---
    /// Create a new registry and register the standard metrics.
    ///
    /// `process_name` is applied as a constant label (`process=<name>`).
    pub fn new(process_name: &str) -> Result<Self> {
        // ---
        let registry = Registry::new_custom(
            Some("inbound_audio_stream".into()),
            Some(prometheus::labels! { "process".to_string() => process_name.to_string() }),
        )?;

        let datagrams_received_total = IntCounter::with_opts(Opts::new(
            "datagrams_received_total",
            "Total UDP datagrams received",
        ))?;
        let datagrams_invalid_total = IntCounter::with_opts(Opts::new(
            "datagrams_invalid_total",
            "Total UDP datagrams rejected before parsing",
        ))?;

        let packets_received = IntGauge::with_opts(Opts::new(
            "packets_received",
            "Stream packets accepted by the sequence tracker",
        ))?;
        let packets_lost = IntGauge::with_opts(Opts::new(
            "packets_lost",
            "Stream packets detected as lost via sequence gaps",
        ))?;
        let packets_late = IntGauge::with_opts(Opts::new(
            "packets_late",
            "Stream packets that arrived behind the expected sequence",
        ))?;
        let packets_duplicate = IntGauge::with_opts(Opts::new(
            "packets_duplicate",
            "Stream packets discarded as duplicates",
        ))?;
        let starves = IntGauge::with_opts(Opts::new(
            "starves",
            "Times the consumer found the ring buffer empty",
        ))?;
        let overflows = IntGauge::with_opts(Opts::new(
            "overflows",
            "Ring buffer writes that overwrote unread samples",
        ))?;
        let silent_frames_dropped = IntGauge::with_opts(Opts::new(
            "silent_frames_dropped",
            "Loss-fill frames elided to drain the buffer toward target",
        ))?;
        let old_frames_dropped = IntGauge::with_opts(Opts::new(
            "old_frames_dropped",
            "Frames trimmed because the ring exceeded the allowed excess",
        ))?;

        let desired_jitter_buffer_frames = IntGauge::with_opts(Opts::new(
            "desired_jitter_buffer_frames",
            "Current target depth of the jitter buffer in frames",
        ))?;
        let ring_frames_available = IntGauge::with_opts(Opts::new(
            "ring_frames_available",
            "Frames currently buffered in the ring",
        ))?;
        let frames_available_avg = Gauge::with_opts(Opts::new(
            "frames_available_avg",
            "Time-weighted average of frames available",
        ))?;

        let time_gap_window_max_seconds = Gauge::with_opts(Opts::new(
            "time_gap_window_max_seconds",
            "Largest packet inter-arrival gap in the stats window (seconds)",
        ))?;
        let time_gap_window_stddev_seconds = Gauge::with_opts(Opts::new(
            "time_gap_window_stddev_seconds",
            "Standard deviation of packet inter-arrival gaps in the stats window (seconds)",
        ))?;

        // Register all metrics
        registry.register(Box::new(datagrams_received_total.clone()))?;
        registry.register(Box::new(datagrams_invalid_total.clone()))?;
        registry.register(Box::new(packets_received.clone()))?;
        registry.register(Box::new(packets_lost.clone()))?;
        registry.register(Box::new(packets_late.clone()))?;
        registry.register(Box::new(packets_duplicate.clone()))?;
        registry.register(Box::new(starves.clone()))?;
        registry.register(Box::new(overflows.clone()))?;
        registry.register(Box::new(silent_frames_dropped.clone()))?;
        registry.register(Box::new(old_frames_dropped.clone()))?;
        registry.register(Box::new(desired_jitter_buffer_frames.clone()))?;
        registry.register(Box::new(ring_frames_available.clone()))?;
        registry.register(Box::new(frames_available_avg.clone()))?;
        registry.register(Box::new(time_gap_window_max_seconds.clone()))?;
        registry.register(Box::new(time_gap_window_stddev_seconds.clone()))?;

        Ok(Self {
            registry,
            datagrams_received_total,
            datagrams_invalid_total,
            packets_received,
            packets_lost,
            packets_late,
            packets_duplicate,
            starves,
            overflows,
            silent_frames_dropped,
            old_frames_dropped,
            desired_jitter_buffer_frames,
            ring_frames_available,
            frames_available_avg,
            time_gap_window_max_seconds,
            time_gap_window_stddev_seconds,
        })
    }

    /// Gather metric families from this registry.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        // ---
        self.registry.gather()
    }

    /// Spawns a minimal HTTP server that serves `GET /metrics`.
    ///
    /// This is intentionally explicit (callers decide whether to run it).
    pub fn spawn_metrics_server(&self, cfg: MetricsServerConfig) -> JoinHandle<Result<()>> {
        // ---
        let registry = Arc::new(self.registry.clone());
        tokio::spawn(async move {
            // ---
            let make_svc = make_service_fn(move |_conn| {
                let registry = Arc::clone(&registry);
                async move {
                    Ok::<_, hyper::Error>(service_fn(move |req| {
                        let registry = Arc::clone(&registry);
                        async move { handle_metrics_request(req, registry).await }
                    }))
                }
            });

            let server = Server::bind(&cfg.bind).serve(make_svc);
            server.await.map_err(|e| anyhow::anyhow!(e))?;
            Ok(())
        })
    }
}

async fn handle_metrics_request(
    req: Request<Body>,
    registry: Arc<Registry>,
) -> Result<Response<Body>, hyper::Error> {
    if req.method() != Method::GET || req.uri().path() != "/metrics" {
        let mut resp = Response::new(Body::from("not found"));
        *resp.status_mut() = StatusCode::NOT_FOUND;
        return Ok(resp);
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        let mut resp = Response::new(Body::from(format!("encode error: {e}")));
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(resp);
    }

    let mut resp = Response::new(Body::from(buffer));
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(resp)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn metrics_context_gathers_something() {
        // ---
        let ctx = MetricsContext::new("test").expect("MetricsContext should init");
        let families = ctx.gather();
        assert!(!families.is_empty());
    }

    #[test]
    fn gauges_store_snapshot_values() {
        // ---
        let ctx = MetricsContext::new("test").expect("MetricsContext should init");

        ctx.desired_jitter_buffer_frames.set(6);
        ctx.ring_frames_available.set(4);
        ctx.frames_available_avg.set(3.5);

        assert_eq!(ctx.desired_jitter_buffer_frames.get(), 6);
        assert_eq!(ctx.ring_frames_available.get(), 4);
        assert!((ctx.frames_available_avg.get() - 3.5).abs() < f64::EPSILON);
    }
}
