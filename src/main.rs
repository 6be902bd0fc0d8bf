// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use field_dispatch_engine::{
    telemetry, version, DispatchConfig, DispatchService, InMemoryBookings,
    InMemoryProfileDirectory,
};
use std::{env, sync::Arc};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;
    info!("{}", version::get_version_string());

    let config = match env::var("DISPATCH_CONFIG") {
        Ok(path) => DispatchConfig::from_file(&path)?,
        Err(_) => DispatchConfig::from_env(),
    };
    if let Err(e) = config.validate() {
        anyhow::bail!("invalid dispatch configuration: {}", e);
    }
    info!(?config, "Configuration loaded");

    let service = DispatchService::in_memory(
        config,
        Arc::new(InMemoryBookings::new()),
        Arc::new(InMemoryProfileDirectory::new()),
    );

    let shutdown = CancellationToken::new();
    let sweeper = service.spawn_sweeper(shutdown.clone());

    // Stand-in for the notification collaborator
    let mut events = service.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(event = event.name(), payload = %json, "Dispatch event"),
                    Err(e) => error!(error = %e, "Failed to encode event"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();
    sweeper.await?;
    event_log.abort();
    Ok(())
}
