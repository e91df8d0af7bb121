//! # dwelld — dwell daemon
//!
//! Composition root that wires storage, services and the automation
//! scheduler together.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialise logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Spawn the automation scheduler
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use dwell_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteAmbianceRepository, SqliteAutomationRepository,
    SqliteDeviceRepository,
};
use dwell_app::scheduler::Scheduler;
use dwell_app::services::{AmbianceService, AutomationService, DeviceService};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let device_repo = Arc::new(SqliteDeviceRepository::new(pool.clone()));
    let automation_repo = Arc::new(SqliteAutomationRepository::new(pool.clone()));
    let ambiance_repo = Arc::new(SqliteAmbianceRepository::new(pool));

    // Services
    let device_service = DeviceService::new(Arc::clone(&device_repo));
    let automation_service =
        AutomationService::new(Arc::clone(&device_repo), Arc::clone(&automation_repo));
    let ambiance_service = AmbianceService::new(Arc::clone(&device_repo), ambiance_repo);

    let devices = device_service.list_devices().await?;
    let rules = automation_service.list_automations().await?;
    let modes = ambiance_service.list_modes().await?;
    for rule in rules.iter().filter(|r| r.window.wraps_midnight()) {
        tracing::warn!(rule_id = %rule.id, window = %rule.window, "window crosses midnight and will never activate");
    }
    tracing::info!(
        devices = devices.len(),
        automations = rules.len(),
        ambiance_modes = modes.len(),
        "state loaded"
    );

    // Scheduler
    let scheduler = Scheduler::new(device_repo, automation_repo, config.scheduler_interval());
    let scheduler = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    scheduler.abort();

    Ok(())
}
