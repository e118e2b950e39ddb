//! Application entry point for the `babywatch-dashboard` service.
//!
//! This binary orchestrates the full startup sequence for the baby monitor
//! dashboard, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the realtime database and identity clients
//! - Spawning the live-update task that follows sign-in state
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests until Ctrl-C
//!
//! # Environment Variables
//! - `FIREBASE_DATABASE_URL` (**required**) – realtime database base URL
//! - `FIREBASE_API_KEY` (**required**) – identity toolkit web API key
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the remaining optional settings.
use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tokio::sync::RwLock;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod auth;
mod chart;
mod config;
mod dashboard;
mod error;
mod evaluator;
mod live;
mod models;
mod routes;
mod source;
mod timeseries;

// Re-exported so that routes/*.rs only depend on their parent module.
pub use auth::{AuthProvider, AuthUser};
pub use dashboard::DashboardController;
pub use error::{AppError, AppResult};
pub use evaluator::ThresholdConfig;
pub use live::SharedDashboard;
pub use timeseries::TimeWindow;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(u64::from(cfg.http_timeout_secs)))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

    let auth = Arc::new(AuthProvider::new(client.clone(), &cfg.auth_url, &cfg.api_key));
    let source = source::RealtimeSource::new(client, &cfg.database_url);
    let dashboard: SharedDashboard = Arc::new(RwLock::new(DashboardController::new(
        ThresholdConfig::DEFAULT,
        cfg.default_window,
        cfg.display_offset,
    )));

    let live_task = live::spawn(
        auth.session().on_auth_change(),
        source,
        cfg.sensor_path.clone(),
        Duration::from_secs(u64::from(cfg.poll_interval_secs)),
        dashboard.clone(),
    );

    // Build app from routes gateway
    let app: Router = routes::router(routes::AppState { auth, dashboard });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    live_task.abort();
    tracing::info!("Shut down cleanly");
    Ok(())
}

// ---

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl-C received, shutting down");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `AXUM_LOG_LEVEL` env var
///
/// Call once at startup, before any logging macro runs.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},reqwest=warn,hyper=warn,hyper_util=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
