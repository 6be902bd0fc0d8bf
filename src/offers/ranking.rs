// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Candidate filtering and ranking for auto-assignment offers

use std::cmp::Ordering;
use tracing::debug;

use super::types::PriorityLevel;
use crate::agents::AgentProfile;
use crate::geo::{miles_to_meters, GeoValidator};
use crate::jobs::Job;

/// An agent selected to receive an offer, in offer order
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub agent_id: String,
    pub priority: PriorityLevel,
    pub rating: f64,
}

#[derive(Debug, Clone)]
pub struct OfferRanking {
    pub high_rating_threshold: f64,
    pub max_offers: usize,
}

impl OfferRanking {
    pub fn new(high_rating_threshold: f64, max_offers: usize) -> Self {
        Self {
            high_rating_threshold,
            max_offers,
        }
    }

    /// Whether the agent may receive an automatic offer for the job
    pub fn is_eligible(agent: &AgentProfile, job: &Job) -> bool {
        if !agent.auto_booking_enabled {
            return false;
        }
        if !agent.has_skill(&job.service_id) {
            return false;
        }
        Self::covers(agent, job)
    }

    /// Service-area coverage. A job or agent without a location is not excluded.
    pub fn covers(agent: &AgentProfile, job: &Job) -> bool {
        let check = GeoValidator::check(
            job.location.as_ref(),
            agent.home_location.as_ref(),
            miles_to_meters(agent.service_area_miles),
        );
        check.location_verified
    }

    /// Filter `agents` down to eligible ones and order them for offering:
    /// referral first, then high-rated by rating, then the rest by arrival.
    pub fn rank(&self, job: &Job, agents: &[AgentProfile]) -> Vec<RankedCandidate> {
        let mut eligible: Vec<&AgentProfile> = agents
            .iter()
            .filter(|a| Self::is_eligible(a, job))
            .collect();
        eligible.sort_by(|a, b| by_arrival(a, b));

        let mut ranked = Vec::with_capacity(eligible.len());

        if let Some(preferred) = job.preferred_agent_id.as_deref() {
            if let Some(pos) = eligible.iter().position(|a| a.agent_id == preferred) {
                let agent = eligible.remove(pos);
                ranked.push(candidate(agent, PriorityLevel::Referral));
            }
        }

        let (mut high, rest): (Vec<&AgentProfile>, Vec<&AgentProfile>) = eligible
            .into_iter()
            .partition(|a| a.rating >= self.high_rating_threshold);

        // Stable sort keeps arrival order among equal ratings
        high.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal));

        ranked.extend(high.into_iter().map(|a| candidate(a, PriorityLevel::HighRated)));
        ranked.extend(rest.into_iter().map(|a| candidate(a, PriorityLevel::FirstCome)));
        ranked.truncate(self.max_offers);

        debug!(job_id = %job.id, candidates = ranked.len(), "Ranked offer candidates");
        ranked
    }
}

fn by_arrival(a: &AgentProfile, b: &AgentProfile) -> Ordering {
    a.registered_at
        .cmp(&b.registered_at)
        .then_with(|| a.agent_id.cmp(&b.agent_id))
}

fn candidate(agent: &AgentProfile, priority: PriorityLevel) -> RankedCandidate {
    RankedCandidate {
        agent_id: agent.agent_id.clone(),
        priority,
        rating: agent.rating,
    }
}
