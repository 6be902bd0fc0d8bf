// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::offers::OfferBroker;

/// Periodically expire offers past their deadline until `shutdown` is cancelled
pub fn spawn_offer_sweeper(
    broker: OfferBroker,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "Offer sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match broker.expire_stale().await {
                        Ok(0) => {}
                        Ok(expired) => debug!(expired, "Stale offers expired"),
                        Err(e) if e.is_retryable() => {
                            debug!(error = %e, "Offer sweep deferred, store unavailable")
                        }
                        Err(e) => error!(error = %e, "Offer sweep failed"),
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutting down offer sweeper");
                    break;
                }
            }
        }
    })
}
