use anyhow::{Context, Result};
use attend_core::{
    AttendanceLog, CooldownGate, EventPipeline, GeometryClassifier, LandmarkScheme,
    PlaceholderResolver,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::{BusKind, Config};
use dbus_interface::{AttendService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        log = %config.log_path.display(),
        sources = ?config.sources,
        cooldown_secs = config.cooldown_secs,
        thresholds = ?config.thresholds,
        "attendd starting"
    );

    // An unreadable or foreign log is fatal: the operator has to look at it.
    let log = Arc::new(
        AttendanceLog::open(&config.log_path)
            .with_context(|| format!("cannot open attendance log {}", config.log_path.display()))?,
    );

    let mut handles = Vec::with_capacity(config.sources.len());
    for name in &config.sources {
        let source = engine::open_source(name)?;
        let pipeline = EventPipeline::new(
            GeometryClassifier::new(LandmarkScheme::IBUG_68, config.thresholds),
            PlaceholderResolver::new(config.identity.clone()),
            CooldownGate::new(Duration::from_secs(config.cooldown_secs)),
            Arc::clone(&log),
        );
        handles.push(engine::spawn_source(name, source, pipeline)?);
    }

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, AttendService::new(log, handles))?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus = ?config.bus, name = BUS_NAME, "attendd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("attendd shutting down");

    Ok(())
}
