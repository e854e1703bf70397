//! Prometheus metrics HTTP endpoint
//!
//! Exposes fetch and alert counters in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, FETCH_BUCKET_BOUNDS, FETCH_NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Write a counter with park label
fn write_counter(output: &mut String, name: &str, help: &str, park: &str, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name}{{park=\"{park}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    park: &str,
    buckets: &[u64; FETCH_NUM_BUCKETS],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in FETCH_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{park=\"{park}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[FETCH_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{park=\"{park}\",le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(output, "{name}_sum{{park=\"{park}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{park=\"{park}\"}} {cumulative}");
}

/// Format metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(summary: &MetricsSummary, park: &str) -> String {
    let mut output = String::with_capacity(2048);

    let counters = [
        ("waitwatch_fetches_ok_total", "Successful network fetches", summary.fetches_ok),
        ("waitwatch_fetches_failed_total", "Failed network fetches", summary.fetches_failed),
        ("waitwatch_cache_fallbacks_total", "Failed fetches served from cache", summary.cache_fallbacks),
        ("waitwatch_cache_fresh_hits_total", "Fetches served from a fresh cache entry", summary.cache_fresh_hits),
        ("waitwatch_cache_write_failures_total", "Cache writes that failed", summary.cache_write_failures),
        ("waitwatch_cache_corrupt_total", "Corrupt cache entries cleared", summary.cache_corrupt),
        ("waitwatch_checks_total", "Alert checks run", summary.checks_run),
        ("waitwatch_checks_failed_total", "Alert checks without wait times", summary.checks_failed),
        ("waitwatch_alerts_fired_total", "Alerts dispatched and removed", summary.alerts_fired),
    ];
    for (name, help, val) in counters {
        write_counter(&mut output, name, help, park, val);
    }

    write_histogram(
        &mut output,
        "waitwatch_fetch_latency_ms",
        "Network fetch latency in milliseconds",
        park,
        &summary.fetch_latency_buckets,
        summary.fetch_latency_sum_ms,
    );

    output
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    park: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics.report(), &park);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    park: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let park = Arc::new(park);

    info!(port = %port, park = %park, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let park = park.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let park = park.clone();
                                async move { handle_request(req, metrics, park).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
