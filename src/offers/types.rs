// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Offer priority. Lower numbers are offered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    /// The client asked for this agent
    Referral = 1,
    HighRated = 2,
    FirstCome = 3,
}

impl PriorityLevel {
    pub fn level(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl OfferStatus {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferStatus::Pending => write!(f, "pending"),
            OfferStatus::Accepted => write!(f, "accepted"),
            OfferStatus::Declined => write!(f, "declined"),
            OfferStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferDecision {
    Accept,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignmentOffer {
    pub id: Uuid,
    pub job_id: String,
    pub agent_id: String,
    pub priority_level: PriorityLevel,
    pub status: OfferStatus,
    pub offered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl AutoAssignmentOffer {
    pub fn new(
        job_id: impl Into<String>,
        agent_id: impl Into<String>,
        priority_level: PriorityLevel,
        offered_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.into(),
            agent_id: agent_id.into(),
            priority_level,
            status: OfferStatus::Pending,
            offered_at,
            expires_at,
            responded_at: None,
        }
    }

    /// Deadline reached. The boundary instant counts as expired.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
