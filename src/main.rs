//! OpsGate API - Operation Governance Platform
//!
//! Pre-flight checks for agent tools: before a shell command, file write,
//! or remote call executes, the guard decides whether to allow it
//! silently, allow it with a warning, pause it for deliberation, or block
//! it outright.
//!
//! GUARD PIPELINE: every request runs the same staged cycle:
//! - Fast path: known-safe tools exit immediately
//! - Cache: recent identical requests reuse their decision
//! - Risk: a rule table scores the operation
//! - Chaos: optional probabilistic forcing of the deliberation path
//! - Planning: high-risk requests may pause for deliberation
//! - Routing & Consensus: external judgment, advisory vote as backstop
//!
//! Everything is fail-open: an internal failure lowers confidence, it
//! never blocks the user.

mod backends;
mod config;
mod error;
mod guard;
mod models;
mod routes;
mod state;

use crate::config::Settings;
use crate::guard::GuardService;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting OpsGate - Operation Governance Platform...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.guard.chaos_enabled {
        warn!(
            "🌪️  Chaos injection is ENABLED (p={}) - do not run this in production",
            settings.guard.chaos_probability
        );
    }

    // Build the guard service and install it as the process-wide instance
    let guard = Arc::new(GuardService::new(settings.guard.clone()));
    if GuardService::install(Arc::clone(&guard)).is_err() {
        warn!("⚠️  Guard service was already installed; reusing the existing instance");
    }

    // Periodic cache sweep; lazy expiry covers the hot path
    let sweeper = Arc::clone(&guard);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweeper.sweep_cache().await;
        }
    });

    let state = Arc::new(AppState::new(guard));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Hooks (hot path) ───");
    info!("   POST /hooks/preCheck      - Gate an operation before it runs");
    info!("   POST /hooks/postAnalyze   - Analyze an operation after it ran");
    info!("");
    info!("   ─── Consensus & Chaos ───");
    info!("   POST /consensus/request   - Ask the advisory panel for a verdict");
    info!("   POST /chaos/:id/result    - Report a chaos injection outcome");
    info!("");
    info!("   ─── Introspection ───");
    info!("   GET  /stats               - Running statistics snapshot");
    info!("   POST /stats/clear         - Reset cache and counters");
    info!("   GET  /rules               - Active risk rule table");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,opsgate_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
