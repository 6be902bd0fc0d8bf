// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Booking-side job view
//!
//! Jobs are created and owned by the booking collaborator. The engine reads them
//! and writes the status mirror back as a projection of the assignment lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DispatchError, Result};
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Open pool: no active assignment
    Pending,
    Assigned,
    InProgress,
    PendingVerification,
    Completed,
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::PendingVerification => write!(f, "pending_verification"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Job price in minor currency units (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub total_price_cents: u64,
    pub labor_price_cents: u64,
    pub materials_cost_cents: u64,
}

impl PriceBreakdown {
    pub fn new(total_price_cents: u64, labor_price_cents: u64, materials_cost_cents: u64) -> Self {
        Self {
            total_price_cents,
            labor_price_cents,
            materials_cost_cents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub service_id: String,
    pub price: PriceBreakdown,
    pub location: Option<GeoPoint>,
    /// Referral: agent the client asked for
    pub preferred_agent_id: Option<String>,
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<String>, service_id: impl Into<String>, price: PriceBreakdown) -> Self {
        Self {
            id: id.into(),
            service_id: service_id.into(),
            price,
            location: None,
            preferred_agent_id: None,
            status: JobStatus::Pending,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_preferred_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.preferred_agent_id = Some(agent_id.into());
        self
    }

    /// Whether the booking side still accepts an assignment for this job
    pub fn is_claimable(&self) -> bool {
        !matches!(self.status, JobStatus::Cancelled | JobStatus::Completed)
    }
}

/// Contract with the booking collaborator
#[async_trait::async_trait]
pub trait BookingCollaborator: Send + Sync {
    async fn job(&self, job_id: &str) -> Result<Option<Job>>;
    async fn mirror_status(&self, job_id: &str, status: JobStatus) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryBookings {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl InMemoryBookings {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Booking-side cancellation, before the engine is told about it
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| DispatchError::JobNotFound(job_id.to_string()))?;
        job.status = JobStatus::Cancelled;
        Ok(())
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).map(|j| j.status)
    }
}

#[async_trait::async_trait]
impl BookingCollaborator for InMemoryBookings {
    async fn job(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn mirror_status(&self, job_id: &str, status: JobStatus) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| DispatchError::JobNotFound(job_id.to_string()))?;
        debug!(job_id, from = %job.status, to = %status, "Job status mirrored");
        job.status = status;
        Ok(())
    }
}
