// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::tier::Tier;
use crate::geo::GeoPoint;
use crate::payouts::PayoutSplit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    PendingVerification,
    Verified,
    Paid,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
    }

    /// Cancellation is only possible before the agent checks out
    pub fn is_cancellable(&self) -> bool {
        matches!(self, AssignmentStatus::Assigned | AssignmentStatus::InProgress)
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentStatus::Assigned => write!(f, "assigned"),
            AssignmentStatus::InProgress => write!(f, "in_progress"),
            AssignmentStatus::PendingVerification => write!(f, "pending_verification"),
            AssignmentStatus::Verified => write!(f, "verified"),
            AssignmentStatus::Paid => write!(f, "paid"),
            AssignmentStatus::Completed => write!(f, "completed"),
            AssignmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignedBy {
    Agent,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub id: Uuid,
    pub job_id: String,
    pub agent_id: String,
    pub assigned_by: AssignedBy,
    pub status: AssignmentStatus,
    pub job_price_cents: u64,
    pub agent_payout_cents: u64,
    pub platform_fee_cents: u64,
    /// Tier whose percentage produced the current payout split
    pub tier_at_pricing: Tier,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub verified_by: Option<String>,
    pub admin_notes: Option<String>,
    pub rejection_count: u32,
}

impl JobAssignment {
    pub fn new(
        job_id: String,
        agent_id: String,
        assigned_by: AssignedBy,
        job_price_cents: u64,
        split: PayoutSplit,
        tier: Tier,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            agent_id,
            assigned_by,
            status: AssignmentStatus::Assigned,
            job_price_cents,
            agent_payout_cents: split.agent_payout_cents,
            platform_fee_cents: split.platform_fee_cents,
            tier_at_pricing: tier,
            assigned_at,
            started_at: None,
            checked_out_at: None,
            verified_at: None,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            verified_by: None,
            admin_notes: None,
            rejection_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != AssignmentStatus::Cancelled
    }

    pub fn payout(&self) -> PayoutSplit {
        PayoutSplit {
            agent_payout_cents: self.agent_payout_cents,
            platform_fee_cents: self.platform_fee_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinKind {
    Checkin,
    Checkout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub assignment_id: Uuid,
    pub kind: CheckinKind,
    /// Position the agent reported
    pub location: GeoPoint,
    pub location_verified: bool,
    /// None when the job has no registered location
    pub distance_meters: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Returned to the agent app after a check-in or check-out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub location_verified: bool,
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    /// Before photo
    Box,
    /// After photo
    Finished,
}

impl ProofKind {
    pub const REQUIRED: [ProofKind; 2] = [ProofKind::Box, ProofKind::Finished];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub assignment_id: Uuid,
    pub kind: ProofKind,
    pub photo_url: String,
    pub notes: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
