// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared fixtures for the dispatch integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use field_dispatch_engine::{
    Actor, AgentProfile, DispatchConfig, DispatchEvent, DispatchService, GeoPoint,
    InMemoryAssignmentStore, InMemoryBookings, InMemoryOfferStore, InMemoryProfileDirectory, Job,
    JobAssignment, ManualClock, PriceBreakdown, ProofKind,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const SERVICE: &str = "deep-clean";
pub const METERS_PER_DEGREE_LAT: f64 = 111_194.93;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub fn job_location() -> GeoPoint {
    GeoPoint::new(40.7128, -74.0060).unwrap()
}

/// A point `meters` due north of `base`
pub fn north_of(base: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint::new(base.lat + meters / METERS_PER_DEGREE_LAT, base.lon).unwrap()
}

/// $150 total: $120 labor, $30 materials
pub fn standard_price() -> PriceBreakdown {
    PriceBreakdown::new(15_000, 12_000, 3_000)
}

pub fn job(id: &str) -> Job {
    Job::new(id, SERVICE, standard_price()).with_location(job_location())
}

/// Silver agent (10 jobs, 4.2) living 1km from the job with a 10 mile area.
/// `arrival` orders agents that registered earlier first.
pub fn agent(id: &str, arrival: i64) -> AgentProfile {
    AgentProfile::new(id, epoch() - Duration::days(30) + Duration::minutes(arrival))
        .with_stats(10, 4.2)
        .with_auto_booking(north_of(job_location(), 1_000.0), 10.0)
        .with_skill(SERVICE)
        .with_payout_destination(format!("acct_{}", id))
}

pub struct Harness {
    pub service: DispatchService,
    pub bookings: Arc<InMemoryBookings>,
    pub profiles: Arc<InMemoryProfileDirectory>,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        let bookings = Arc::new(InMemoryBookings::new());
        let profiles = Arc::new(InMemoryProfileDirectory::new());
        let clock = ManualClock::new(epoch());
        let service = DispatchService::new(
            config,
            bookings.clone(),
            profiles.clone(),
            Arc::new(InMemoryAssignmentStore::new()),
            Arc::new(InMemoryOfferStore::new()),
            Arc::new(clock.clone()),
        );
        Self {
            service,
            bookings,
            profiles,
            clock,
        }
    }

    pub async fn add_job(&self, job: Job) {
        self.bookings.insert(job).await;
    }

    pub async fn add_agent(&self, profile: AgentProfile) {
        self.profiles.upsert(profile).await;
    }

    /// Job plus one agent, assigned by an admin
    pub async fn assigned(&self, job_id: &str, agent_id: &str) -> JobAssignment {
        self.add_job(job(job_id)).await;
        self.add_agent(agent(agent_id, 0)).await;
        self.service
            .claim_job(&Actor::admin("admin-1"), job_id, agent_id)
            .await
            .unwrap()
    }

    /// Assigned and checked in at the job location
    pub async fn in_progress(&self, job_id: &str, agent_id: &str) -> JobAssignment {
        let assignment = self.assigned(job_id, agent_id).await;
        self.service
            .check_in(&Actor::agent(agent_id), assignment.id, job_location())
            .await
            .unwrap();
        assignment
    }

    pub async fn upload_both_proofs(&self, agent_id: &str, assignment_id: Uuid) {
        for kind in ProofKind::REQUIRED {
            self.service
                .submit_proof(
                    &Actor::agent(agent_id),
                    assignment_id,
                    kind,
                    &format!("https://media.example/{}/{:?}.jpg", assignment_id, kind),
                    None,
                )
                .await
                .unwrap();
        }
    }

    /// Checked in, both proofs uploaded and checked out
    pub async fn pending_verification(&self, job_id: &str, agent_id: &str) -> JobAssignment {
        let assignment = self.in_progress(job_id, agent_id).await;
        self.upload_both_proofs(agent_id, assignment.id).await;
        self.service
            .check_out(&Actor::agent(agent_id), assignment.id, job_location())
            .await
            .unwrap();
        assignment
    }
}

/// Everything currently buffered on the receiver, by event name
pub fn drain(rx: &mut broadcast::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn names(events: &[DispatchEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
