//! Live log viewer demo
//!
//! Run with: cargo run --example log_viewer [BIND_ADDR]
//!
//! Then open http://localhost:8000/ in a browser. A background thread emits a
//! synthetic log line every second; each line is printed to stdout and, as
//! JSON, broadcast to every open viewer over `/ws`.
//!
//! Set `RUST_LOG=ws_log_relay=debug` to watch subscribers come and go.

use std::net::SocketAddr;
use std::time::Duration;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use ws_log_relay::{RelayConfig, RelayServer};

const INDEX_HTML: &str = include_str!("index.html");

/// Target of the synthetic events; only these are sent to viewers
const GENERATOR_TARGET: &str = "generator";

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];
const PATHS: [&str; 5] = ["/", "/login", "/api/orders", "/api/users/me", "/static/app.js"];
const FAILURES: [&str; 4] = [
    "connection reset by peer",
    "upstream timed out",
    "invalid session token",
    "disk quota exceeded",
];

fn generate_logs() {
    let mut rng = rand::thread_rng();

    loop {
        let user_id: u32 = rng.gen_range(1000..10000);
        let ip = format!("10.{}.{}.{}", rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>());
        let method = METHODS.choose(&mut rng).copied().unwrap_or("GET");
        let path = PATHS.choose(&mut rng).copied().unwrap_or("/");

        match rng.gen_range(0..3) {
            0 => tracing::info!(target: GENERATOR_TARGET, user_id, %ip, "{} {}", method, path),
            1 => tracing::warn!(target: GENERATOR_TARGET, user_id, %ip, "slow response for {} {}", method, path),
            _ => {
                let failure = FAILURES.choose(&mut rng).copied().unwrap_or("unknown error");
                tracing::error!(target: GENERATOR_TARGET, user_id, %ip, "{} {} failed: {}", method, path, failure)
            }
        }

        std::thread::sleep(Duration::from_secs(1));
    }
}

#[tokio::main]
async fn main() -> ws_log_relay::Result<()> {
    let addr: SocketAddr = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(|| RelayConfig::default().bind_addr);

    let server = RelayServer::new(RelayConfig::default().bind(addr))
        .merge(Router::new().route("/", get(|| async { Html(INDEX_HTML) })));

    let writer = server.engine().sink().into_writer();

    tracing_subscriber::registry()
        .with(
            fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            ),
        )
        .with(
            fmt::layer()
                .json()
                .with_writer(move || writer.clone())
                .with_filter(filter_fn(|meta| meta.target() == GENERATOR_TARGET)),
        )
        .init();

    // SinkWriter blocks while the channel is full, so it runs off the runtime
    std::thread::spawn(generate_logs);

    println!("Viewer: http://{}/", addr);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
