//! Mock wait-time API server
//!
//! Simulates the park wait-time API for local testing.
//!
//! Endpoint:
//! - GET /v1/waitingtimes (headers: `park`, `language`)
//!   -> JSON array of `{code, name, waitingtime, status}`
//!
//! Behavior:
//! 1. Serves a fixed set of attractions for any park
//! 2. Wait times of open attractions drift with every request
//! 3. With `--fail-every N`, every Nth request answers 503 so the client's
//!    cache fallback can be exercised
//!
//! Usage:
//!   cargo run --bin mock_waittimes -- --port 8080 --fail-every 3
//!   (then set `api.base_url = "http://localhost:8080"`)

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use waitwatch::domain::AttractionWaitTime;

#[derive(Parser, Debug)]
#[command(name = "mock_waittimes")]
#[command(about = "Mock park wait-time API for local simulation")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Answer every Nth request with 503 (0 = never fail)
    #[arg(long, default_value = "0")]
    fail_every: u64,

    /// Minutes added per request to open attractions
    #[arg(long, default_value = "5")]
    drift_step: u32,
}

/// (code, name, base wait, status)
const PARK: &[(&str, &str, u32, &str)] = &[
    ("34", "Taron", 45, "opened"),
    ("12", "Black Mamba", 30, "opened"),
    ("7", "Chiapas", 25, "opened"),
    ("8", "River Quest", 20, "opened"),
    ("21", "F.L.Y.", 60, "opened"),
    ("5", "Colorado Adventure", 15, "opened"),
    ("44", "Winjas Fear", 0, "closed"),
    ("45", "Winjas Force", 0, "refurbishment"),
    ("50", "Maus au Chocolat", 10, "opened"),
];

/// Open attractions cycle through a 60-minute window, 5-minute granularity
fn snapshot(request_no: u64, drift_step: u32) -> Vec<AttractionWaitTime> {
    let drift = (request_no as u32).wrapping_mul(drift_step);
    PARK.iter()
        .map(|&(code, name, base, status)| {
            let wait = if status == "opened" { base.wrapping_add(drift) % 60 / 5 * 5 } else { 0 };
            AttractionWaitTime::new(code, name, wait, status)
        })
        .collect()
}

fn header<'a>(req: &'a Request<hyper::body::Incoming>, name: &str) -> &'a str {
    req.headers().get(name).and_then(|v| v.to_str().ok()).unwrap_or("-")
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    counter: Arc<AtomicU64>,
    fail_every: u64,
    drift_step: u32,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/v1/waitingtimes") => {
            let request_no = counter.fetch_add(1, Ordering::Relaxed) + 1;
            let park = header(&req, "park");
            let language = header(&req, "language");

            if fail_every > 0 && request_no % fail_every == 0 {
                println!("[MOCK] #{} park={} language={} -> 503 (simulated outage)", request_no, park, language);
                return Ok(Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(Full::new(Bytes::from("Service Unavailable")))
                    .expect("static response should not fail"));
            }

            let items = snapshot(request_no, drift_step);
            let body = match serde_json::to_vec(&items) {
                Ok(body) => body,
                Err(e) => {
                    eprintln!("[MOCK] Encoding failed: {}", e);
                    return Ok(Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .body(Full::new(Bytes::new()))
                        .expect("static response should not fail"));
                }
            };

            println!("[MOCK] #{} park={} language={} -> {} attractions", request_no, park, language, items.len());
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              Mock Wait-Time API Server                   ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║ Port:            {:>5}                                   ║", args.port);
    println!("║ Attractions:     {:>5}                                   ║", PARK.len());
    println!("║ Fail every:      {:>5} requests                          ║", args.fail_every);
    println!("║ Drift step:      {:>5} min                               ║", args.drift_step);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let listener = TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    let counter = Arc::new(AtomicU64::new(0));

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let counter = counter.clone();
        let fail_every = args.fail_every;
        let drift_step = args.drift_step;

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, counter.clone(), fail_every, drift_step));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                eprintln!("[MOCK] Connection {} error: {}", peer, e);
            }
        });
    }
}
