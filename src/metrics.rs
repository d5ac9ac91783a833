//! Prometheus metrics for the media downloader.
//!
//! Exposes:
//! - `telegram_media_dl_command_duration_seconds` (histogram)
//! - `telegram_media_dl_command_total` (counter with status)
//! - `telegram_media_dl_command_inflight` (gauge)
//! - `telegram_media_dl_downloads_total` (counter with status)
//! - `telegram_media_dl_downloaded_bytes_total` (counter)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
    TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3.5 hours; large downloads run long.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 19).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "telegram_media_dl_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_media_dl_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "telegram_media_dl_command_inflight",
        "Number of in-flight commands",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static DOWNLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_media_dl_downloads_total",
        "Media files downloaded by status",
        &["status"]
    )
    .expect("failed to register downloads counter")
});

static DOWNLOADED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "telegram_media_dl_downloaded_bytes_total",
        "Bytes written to completed downloads"
    )
    .expect("failed to register downloaded bytes counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&DOWNLOADS_TOTAL);
    Lazy::force(&DOWNLOADED_BYTES);
}

fn status_label(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "error"
    }
}

/// Increment inflight gauge for a command.
pub fn record_command_start(command: &'static str) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).dec();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, status_label(success)])
        .inc();
}

/// Record the outcome of one file transfer.
pub fn record_download(success: bool, bytes: u64) {
    init_collectors();
    DOWNLOADS_TOTAL
        .with_label_values(&[status_label(success)])
        .inc();
    if success {
        DOWNLOADED_BYTES.inc_by(bytes);
    }
}

fn response(status: StatusCode, body: Full<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Full::from("encode error"),
        ));
    }

    let mut ok = response(StatusCode::OK, Full::from(buffer));
    if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
        ok.headers_mut().insert(CONTENT_TYPE, value);
    }
    Ok(ok)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(response(StatusCode::NOT_FOUND, Full::new(Bytes::new()))),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text() -> String {
        let response = metrics_response().await.expect("metrics response");
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect metrics body")
            .to_bytes();
        String::from_utf8(body_bytes.to_vec()).expect("utf-8 metrics body")
    }

    #[test]
    fn records_successful_command_metrics() {
        let cmd = "test_command_metrics_success";

        record_command_start(cmd);
        assert_eq!(COMMAND_INFLIGHT.with_label_values(&[cmd]).get(), 1);

        record_command_result(cmd, Duration::from_millis(120), true);

        assert_eq!(COMMAND_INFLIGHT.with_label_values(&[cmd]).get(), 0);
        assert_eq!(COMMAND_TOTAL.with_label_values(&[cmd, "ok"]).get(), 1);
        assert_eq!(
            COMMAND_DURATION
                .with_label_values(&[cmd])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn records_failed_command_metrics() {
        let cmd = "test_command_metrics_error";

        record_command_start(cmd);
        record_command_result(cmd, Duration::from_secs(2), false);

        assert_eq!(COMMAND_TOTAL.with_label_values(&[cmd, "error"]).get(), 1);
        assert_eq!(COMMAND_INFLIGHT.with_label_values(&[cmd]).get(), 0);
    }

    #[test]
    fn multiple_commands_tracked_separately() {
        let cmd1 = "test_cmd_separate_1";
        let cmd2 = "test_cmd_separate_2";

        record_command_start(cmd1);
        record_command_start(cmd2);
        record_command_result(cmd1, Duration::from_millis(50), true);

        assert_eq!(COMMAND_INFLIGHT.with_label_values(&[cmd1]).get(), 0);
        assert_eq!(COMMAND_INFLIGHT.with_label_values(&[cmd2]).get(), 1);

        record_command_result(cmd2, Duration::from_millis(100), false);
        assert_eq!(COMMAND_INFLIGHT.with_label_values(&[cmd2]).get(), 0);
    }

    #[test]
    fn download_bytes_only_count_successes() {
        let before_ok = DOWNLOADS_TOTAL.with_label_values(&["ok"]).get();
        let before_err = DOWNLOADS_TOTAL.with_label_values(&["error"]).get();
        let before_bytes = DOWNLOADED_BYTES.get();

        record_download(true, 4096);
        record_download(false, 1024);

        assert!(DOWNLOADS_TOTAL.with_label_values(&["ok"]).get() > before_ok);
        assert!(DOWNLOADS_TOTAL.with_label_values(&["error"]).get() > before_err);
        // Other tests may run in parallel, so only a lower bound is stable.
        assert!(DOWNLOADED_BYTES.get() >= before_bytes + 4096);
    }

    #[tokio::test]
    async fn metrics_response_contains_registered_metrics() {
        let cmd = "test_metrics_response";
        record_command_start(cmd);
        record_command_result(cmd, Duration::from_millis(10), true);
        record_download(true, 1);

        let text = body_text().await;
        assert!(text.contains("telegram_media_dl_command_total"));
        assert!(text.contains("telegram_media_dl_command_duration_seconds"));
        assert!(text.contains("telegram_media_dl_downloads_total"));
        assert!(text.contains("telegram_media_dl_downloaded_bytes_total"));
        assert!(text.contains(cmd));
    }

    #[tokio::test]
    async fn metrics_response_has_text_content_type() {
        let response = metrics_response().await.expect("metrics response");
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("text/plain"));
    }
}
