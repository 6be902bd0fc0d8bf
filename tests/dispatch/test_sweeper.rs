// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::common::*;
use chrono::Duration;
use field_dispatch_engine::{DispatchConfig, DispatchEvent, OfferStatus};
use std::time::Duration as StdDuration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_expires_lapsed_offers() {
        let config = DispatchConfig {
            sweep_interval_secs: 1,
            ..DispatchConfig::default()
        };
        let h = Harness::with_config(config);
        h.add_job(job("job-1")).await;
        h.add_agent(agent("a", 0)).await;
        h.add_agent(agent("b", 1)).await;
        h.service.on_job_created("job-1").await.unwrap();

        let mut rx = h.service.subscribe();
        h.clock.advance(Duration::minutes(6));

        let shutdown = CancellationToken::new();
        let sweeper = h.service.spawn_sweeper(shutdown.clone());

        let event = timeout(StdDuration::from_secs(5), rx.recv())
            .await
            .expect("sweeper did not run")
            .unwrap();
        assert_eq!(
            event,
            DispatchEvent::JobReturnedToPool {
                job_id: "job-1".to_string()
            }
        );

        let offers = h.service.offers_for_job("job-1").await.unwrap();
        assert!(offers.iter().all(|o| o.status == OfferStatus::Expired));

        shutdown.cancel();
        timeout(StdDuration::from_secs(5), sweeper)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let h = Harness::new();
        let shutdown = CancellationToken::new();
        let sweeper = h.service.spawn_sweeper(shutdown.clone());

        shutdown.cancel();
        let joined = timeout(StdDuration::from_secs(5), sweeper).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }
}
