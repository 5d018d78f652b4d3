//! SLA Monitor - service uptime and latency monitoring.
//!
//! Probes registered HTTP endpoints on a fixed cadence, records check
//! history, and tracks per-service alert state for future notifications.

mod checker;
mod config;
mod db;
mod probe;
mod scheduler;
mod web;

use config::ServerConfig;
use db::Store;
use probe::HttpProber;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sla_monitor=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting SLA Monitor on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Shared probe client
    let prober = HttpProber::new(cfg.probe_timeout)?;

    // Start the periodic check scheduler
    let scheduler = Scheduler::new(&cfg, store.clone(), prober.clone());
    scheduler.start();
    tracing::info!(
        "Scheduler started, running checks every {}s",
        cfg.check_interval.as_secs()
    );

    // Start web server
    let server = Server::new(cfg, store, prober);
    server.start().await?;

    Ok(())
}
