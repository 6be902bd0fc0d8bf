// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::tier::{AgentStatsChanged, Tier, TierCalculator};
use crate::error::{DispatchError, Result};
use crate::geo::GeoPoint;

/// Agent profile as seen by the dispatch engine. Owned by the identity/profile
/// collaborator; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub total_jobs: u32,
    pub rating: f64,
    pub tier: Tier,
    pub auto_booking_enabled: bool,
    pub service_area_miles: f64,
    pub home_location: Option<GeoPoint>,
    pub skills: HashSet<String>,
    /// Arrival order tiebreak for offer ranking
    pub registered_at: DateTime<Utc>,
    /// Opaque identifier handed to the payment-execution collaborator
    pub payout_destination: Option<String>,
}

impl AgentProfile {
    pub fn new(agent_id: impl Into<String>, registered_at: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.into(),
            total_jobs: 0,
            rating: 0.0,
            tier: Tier::Bronze,
            auto_booking_enabled: false,
            service_area_miles: 0.0,
            home_location: None,
            skills: HashSet::new(),
            registered_at,
            payout_destination: None,
        }
    }

    /// Set job count and rating, re-deriving the tier
    pub fn with_stats(mut self, total_jobs: u32, rating: f64) -> Self {
        self.total_jobs = total_jobs;
        self.rating = rating;
        self.tier = TierCalculator::tier_for(total_jobs, rating);
        self
    }

    pub fn with_auto_booking(mut self, home: GeoPoint, service_area_miles: f64) -> Self {
        self.auto_booking_enabled = true;
        self.home_location = Some(home);
        self.service_area_miles = service_area_miles;
        self
    }

    pub fn with_skill(mut self, service_id: impl Into<String>) -> Self {
        self.skills.insert(service_id.into());
        self
    }

    pub fn with_payout_destination(mut self, destination: impl Into<String>) -> Self {
        self.payout_destination = Some(destination.into());
        self
    }

    pub fn has_skill(&self, service_id: &str) -> bool {
        self.skills.contains(service_id)
    }
}

/// Read access to agent profiles
#[async_trait::async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn agent(&self, agent_id: &str) -> Result<Option<AgentProfile>>;
    async fn agents(&self) -> Result<Vec<AgentProfile>>;
}

/// In-process profile directory. Stands in for the profile collaborator in tests
/// and single-node deployments, and performs the tier recompute it owns.
#[derive(Debug, Default)]
pub struct InMemoryProfileDirectory {
    profiles: Arc<RwLock<HashMap<String, AgentProfile>>>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, profile: AgentProfile) {
        debug!(agent_id = %profile.agent_id, tier = %profile.tier, "Profile upserted");
        self.profiles
            .write()
            .await
            .insert(profile.agent_id.clone(), profile);
    }

    /// Persist new stats and recompute the tier
    pub async fn apply_stats_changed(&self, event: &AgentStatsChanged) -> Result<Tier> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(&event.agent_id)
            .ok_or_else(|| DispatchError::AgentNotFound(event.agent_id.clone()))?;

        let previous = profile.tier;
        profile.total_jobs = event.total_jobs;
        profile.rating = event.rating;
        profile.tier = TierCalculator::apply(event);

        if previous != profile.tier {
            info!(
                agent_id = %event.agent_id,
                from = %previous,
                to = %profile.tier,
                "Agent tier changed"
            );
        }
        Ok(profile.tier)
    }

    /// Count one more completed job for the agent and recompute the tier
    pub async fn record_completed_job(&self, agent_id: &str) -> Result<Tier> {
        let event = {
            let profiles = self.profiles.read().await;
            let profile = profiles
                .get(agent_id)
                .ok_or_else(|| DispatchError::AgentNotFound(agent_id.to_string()))?;
            AgentStatsChanged {
                agent_id: agent_id.to_string(),
                total_jobs: profile.total_jobs.saturating_add(1),
                rating: profile.rating,
            }
        };
        self.apply_stats_changed(&event).await
    }
}

#[async_trait::async_trait]
impl ProfileDirectory for InMemoryProfileDirectory {
    async fn agent(&self, agent_id: &str) -> Result<Option<AgentProfile>> {
        Ok(self.profiles.read().await.get(agent_id).cloned())
    }

    async fn agents(&self) -> Result<Vec<AgentProfile>> {
        Ok(self.profiles.read().await.values().cloned().collect())
    }
}
