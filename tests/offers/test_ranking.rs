// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::common::*;
use chrono::Duration;
use field_dispatch_engine::{
    DispatchConfig, DispatchError, DispatchEvent, GeoPoint, OfferStatus, PriorityLevel,
};

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_pool(h: &Harness) {
        h.add_agent(agent("early", 0)).await;
        h.add_agent(agent("star", 5).with_stats(40, 4.9)).await;
        h.add_agent(agent("good", 1).with_stats(40, 4.6)).await;
        h.add_agent(agent("referral", 10).with_stats(2, 3.1)).await;
        h.add_agent(agent("late", 20)).await;
    }

    #[tokio::test]
    async fn test_offers_follow_priority_order() {
        let h = Harness::new();
        seed_pool(&h).await;
        h.add_job(job("job-1").with_preferred_agent("referral")).await;

        let offers = h.service.on_job_created("job-1").await.unwrap();
        let order: Vec<(&str, PriorityLevel)> = offers
            .iter()
            .map(|o| (o.agent_id.as_str(), o.priority_level))
            .collect();
        assert_eq!(
            order,
            vec![
                ("referral", PriorityLevel::Referral),
                ("star", PriorityLevel::HighRated),
                ("good", PriorityLevel::HighRated),
                ("early", PriorityLevel::FirstCome),
                ("late", PriorityLevel::FirstCome),
            ]
        );
        assert_eq!(offers[0].priority_level.level(), 1);

        for offer in &offers {
            assert_eq!(offer.status, OfferStatus::Pending);
            assert_eq!(offer.offered_at, epoch());
            assert_eq!(offer.expires_at, epoch() + Duration::minutes(5));
        }

        let mut stored = h.service.offers_for_job("job-1").await.unwrap();
        let mut created = offers.clone();
        stored.sort_by_key(|o| o.id);
        created.sort_by_key(|o| o.id);
        assert_eq!(stored, created);
    }

    #[tokio::test]
    async fn test_offer_created_events() {
        let h = Harness::new();
        seed_pool(&h).await;
        h.add_job(job("job-1")).await;
        let mut rx = h.service.subscribe();

        let offers = h.service.on_job_created("job-1").await.unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), offers.len());
        assert!(events.iter().all(|e| matches!(e, DispatchEvent::OfferCreated { job_id, .. } if job_id == "job-1")));
    }

    #[tokio::test]
    async fn test_ineligible_agents_get_no_offer() {
        let h = Harness::new();
        h.add_job(job("job-1")).await;
        h.add_agent(agent("ok", 0)).await;

        let mut manual_only = agent("manual", 1);
        manual_only.auto_booking_enabled = false;
        h.add_agent(manual_only).await;

        let mut wrong_skill = agent("plumber", 2);
        wrong_skill.skills.clear();
        wrong_skill.skills.insert("plumbing".to_string());
        h.add_agent(wrong_skill).await;

        // 2 miles out with a 1 mile area
        let far = agent("far", 3).with_auto_booking(north_of(job_location(), 3_200.0), 1.0);
        h.add_agent(far).await;

        let offers = h.service.on_job_created("job-1").await.unwrap();
        let agents: Vec<&str> = offers.iter().map(|o| o.agent_id.as_str()).collect();
        assert_eq!(agents, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_job_without_location_skips_area_check() {
        let h = Harness::new();
        let mut unlocated = job("job-1");
        unlocated.location = None;
        h.add_job(unlocated).await;
        h.add_agent(
            agent("remote", 0).with_auto_booking(GeoPoint::new(34.05, -118.24).unwrap(), 5.0),
        )
        .await;

        let offers = h.service.on_job_created("job-1").await.unwrap();
        assert_eq!(offers.len(), 1);
    }

    #[tokio::test]
    async fn test_offer_count_is_capped() {
        let config = DispatchConfig {
            max_offers_per_job: 2,
            ..DispatchConfig::default()
        };
        let h = Harness::with_config(config);
        seed_pool(&h).await;
        h.add_job(job("job-1")).await;

        let offers = h.service.on_job_created("job-1").await.unwrap();
        let agents: Vec<&str> = offers.iter().map(|o| o.agent_id.as_str()).collect();
        assert_eq!(agents, vec!["star", "good"]);
    }

    #[tokio::test]
    async fn test_no_eligible_agents_leaves_open_pool() {
        let h = Harness::new();
        h.add_job(job("job-1")).await;

        let offers = h.service.on_job_created("job-1").await.unwrap();
        assert!(offers.is_empty());
        assert!(h.service.offers_for_job("job-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_creation_skips_existing_pairs() {
        let h = Harness::new();
        h.add_job(job("job-1")).await;
        h.add_agent(agent("a", 0)).await;

        assert_eq!(h.service.on_job_created("job-1").await.unwrap().len(), 1);
        h.add_agent(agent("b", 1)).await;

        let second = h.service.on_job_created("job-1").await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].agent_id, "b");
        assert_eq!(h.service.offers_for_job("job-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_offers_refused_for_assigned_job() {
        let h = Harness::new();
        h.assigned("job-1", "agent-1").await;

        // Booking mirror now says assigned
        assert!(matches!(
            h.service.on_job_created("job-1").await,
            Err(DispatchError::JobNotClaimable { .. })
        ));
        assert!(matches!(
            h.service.on_job_created("missing").await,
            Err(DispatchError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_offers_for_agent_hide_lapsed() {
        let h = Harness::new();
        h.add_agent(agent("a", 0)).await;
        h.add_job(job("job-1")).await;
        h.service.on_job_created("job-1").await.unwrap();

        h.clock.advance(Duration::minutes(2));
        h.add_job(job("job-2")).await;
        h.service.on_job_created("job-2").await.unwrap();
        assert_eq!(h.service.pending_offers_for_agent("a").await.unwrap().len(), 2);

        h.clock.advance(Duration::minutes(3));
        let pending = h.service.pending_offers_for_agent("a").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job_id, "job-2");
    }
}
