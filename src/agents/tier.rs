// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

/// Basis-point denominator: 10000 = 100%
pub const BASIS_POINTS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Bronze => write!(f, "bronze"),
            Tier::Silver => write!(f, "silver"),
            Tier::Gold => write!(f, "gold"),
            Tier::Platinum => write!(f, "platinum"),
        }
    }
}

/// Labor commission paid to the agent, in basis points (5500 = 55%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayoutPercent(u32);

impl PayoutPercent {
    pub const fn from_basis_points(bps: u32) -> Self {
        Self(bps)
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / BASIS_POINTS as f64
    }
}

/// Threshold row: both the job count and the rating must be met
struct TierThreshold {
    tier: Tier,
    min_jobs: u32,
    min_rating: f64,
}

// Evaluated highest tier first
const THRESHOLDS: [TierThreshold; 3] = [
    TierThreshold {
        tier: Tier::Platinum,
        min_jobs: 75,
        min_rating: 4.8,
    },
    TierThreshold {
        tier: Tier::Gold,
        min_jobs: 30,
        min_rating: 4.5,
    },
    TierThreshold {
        tier: Tier::Silver,
        min_jobs: 10,
        min_rating: 4.0,
    },
];

/// Emitted by the profile collaborator after it persists new agent stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatsChanged {
    pub agent_id: String,
    pub total_jobs: u32,
    pub rating: f64,
}

pub struct TierCalculator;

impl TierCalculator {
    pub fn tier_for(total_jobs: u32, rating: f64) -> Tier {
        THRESHOLDS
            .iter()
            .find(|t| total_jobs >= t.min_jobs && rating >= t.min_rating)
            .map(|t| t.tier)
            .unwrap_or(Tier::Bronze)
    }

    pub fn payout_percent_for(tier: Tier) -> PayoutPercent {
        match tier {
            Tier::Bronze => PayoutPercent::from_basis_points(5000),
            Tier::Silver => PayoutPercent::from_basis_points(5500),
            Tier::Gold => PayoutPercent::from_basis_points(6000),
            Tier::Platinum => PayoutPercent::from_basis_points(7000),
        }
    }

    /// Re-derive the tier from a stats change. Same inputs always give the same tier.
    pub fn apply(event: &AgentStatsChanged) -> Tier {
        Self::tier_for(event.total_jobs, event.rating)
    }
}
