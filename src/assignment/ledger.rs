// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Assignment lifecycle
//!
//! ```text
//! assigned -> in_progress -> pending_verification -> verified -> paid -> completed
//!    |             |  ^               |
//!    +-> cancelled +  +---- reject ---+
//! ```
//!
//! Every transition reads the row, validates the status it found, and writes back
//! through a compare-and-swap on that status. A refused transition leaves the row
//! untouched. The job's booking-side status is a projection written from here.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::proofs::ProofGate;
use super::store::AssignmentStore;
use super::store_error;
use super::types::{
    AssignedBy, AssignmentStatus, CheckResult, CheckinKind, CheckinRecord, JobAssignment,
};
use crate::actor::Actor;
use crate::agents::ProfileDirectory;
use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result, StoreError};
use crate::events::{DispatchEvent, EventBus};
use crate::geo::{GeoPoint, GeoValidator};
use crate::jobs::{BookingCollaborator, Job, JobStatus};
use crate::payouts::PayoutCalculator;

#[derive(Clone)]
pub struct AssignmentLedger {
    store: Arc<dyn AssignmentStore>,
    bookings: Arc<dyn BookingCollaborator>,
    profiles: Arc<dyn ProfileDirectory>,
    proofs: ProofGate,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

impl AssignmentLedger {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        bookings: Arc<dyn BookingCollaborator>,
        profiles: Arc<dyn ProfileDirectory>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        let proofs = ProofGate::new(store.clone(), clock.clone());
        Self {
            store,
            bookings,
            profiles,
            proofs,
            events,
            clock,
            config,
        }
    }

    pub fn proofs(&self) -> &ProofGate {
        &self.proofs
    }

    /// Bind a job to an agent. Agents claim for themselves; admins assign anyone.
    pub async fn claim(&self, actor: &Actor, job_id: &str, agent_id: &str) -> Result<JobAssignment> {
        let assigned_by = match actor {
            Actor::Agent(id) if id == agent_id => AssignedBy::Agent,
            Actor::Agent(_) => return Err(DispatchError::NotYourJob),
            Actor::Admin(_) => AssignedBy::Admin,
            other => {
                return Err(DispatchError::Unauthorized(format!(
                    "{} cannot assign jobs",
                    other.role()
                )))
            }
        };

        let job = self.job(job_id).await?;
        if !job.is_claimable() {
            return Err(DispatchError::JobNotClaimable {
                job_id: job_id.to_string(),
                reason: format!("job is {}", job.status),
            });
        }

        let profile = self
            .profiles
            .agent(agent_id)
            .await?
            .ok_or_else(|| DispatchError::AgentNotFound(agent_id.to_string()))?;

        let split = PayoutCalculator::split_for_tier(&job.price, profile.tier)?;
        let assignment = JobAssignment::new(
            job_id.to_string(),
            agent_id.to_string(),
            assigned_by,
            job.price.total_price_cents,
            split,
            profile.tier,
            self.clock.now(),
        );

        // The store's unique index is the arbiter; no pre-check here
        self.store
            .insert(assignment.clone())
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => DispatchError::AlreadyAssigned {
                    job_id: job_id.to_string(),
                },
                other => store_error(other),
            })?;

        info!(
            assignment_id = %assignment.id,
            job_id,
            agent_id,
            assigned_by = ?assigned_by,
            tier = %profile.tier,
            agent_payout_cents = assignment.agent_payout_cents,
            platform_fee_cents = assignment.platform_fee_cents,
            "Job assigned"
        );

        self.mirror(job_id, JobStatus::Assigned).await;
        self.events.publish(DispatchEvent::JobAssigned {
            assignment_id: assignment.id,
            job_id: job_id.to_string(),
            agent_id: agent_id.to_string(),
            assigned_by,
        });

        Ok(assignment)
    }

    /// Geofenced arrival. Refused outright when outside the radius. Only a job
    /// without a registered location skips the distance check.
    pub async fn check_in(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        location: GeoPoint,
    ) -> Result<CheckResult> {
        let assignment = self.load(assignment_id).await?;
        self.require_owner(actor, &assignment)?;

        let already = self
            .store
            .checkin_records(assignment_id)
            .await
            .map_err(store_error)?
            .iter()
            .any(|r| r.kind == CheckinKind::Checkin);
        if already {
            return Err(DispatchError::AlreadyCheckedIn);
        }

        Self::require_status(&assignment, AssignmentStatus::Assigned, "check in")?;

        let job = self.job(&assignment.job_id).await?;
        let check = GeoValidator::check(
            job.location.as_ref(),
            Some(&location),
            self.config.checkin_radius_meters,
        );
        if !check.location_verified {
            let distance = check.distance_meters.unwrap_or_default();
            warn!(
                assignment_id = %assignment_id,
                distance_meters = distance,
                max_distance = check.radius_meters,
                "Check-in refused by geofence"
            );
            return Err(DispatchError::TooFarFromJob {
                distance_meters: distance,
                max_distance: check.radius_meters,
            });
        }

        let now = self.clock.now();
        let mut updated = assignment.clone();
        updated.status = AssignmentStatus::InProgress;
        updated.started_at = Some(now);

        let record = CheckinRecord {
            assignment_id,
            kind: CheckinKind::Checkin,
            location,
            location_verified: check.location_verified,
            distance_meters: check.distance_meters,
            recorded_at: now,
        };

        if let Err(e) = self
            .store
            .swap_with_checkin(AssignmentStatus::Assigned, updated, record)
            .await
        {
            return self.conflict(e, assignment_id, "check in");
        }

        if check.skipped() {
            debug!(assignment_id = %assignment_id, "Check-in geofence skipped, job has no location");
        }
        info!(
            assignment_id = %assignment_id,
            job_id = %assignment.job_id,
            agent_id = %assignment.agent_id,
            distance_meters = ?check.distance_meters,
            "Agent checked in"
        );

        self.mirror(&assignment.job_id, JobStatus::InProgress).await;
        self.events.publish(DispatchEvent::JobStarted {
            assignment_id,
            job_id: assignment.job_id.clone(),
            agent_id: assignment.agent_id.clone(),
            location_verified: check.location_verified,
        });

        Ok(CheckResult {
            location_verified: check.location_verified,
            distance_meters: check.distance_meters,
        })
    }

    /// Departure. Requires both proofs; a geofence miss is recorded for admin review
    /// but never blocks the agent from leaving.
    pub async fn check_out(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        location: GeoPoint,
    ) -> Result<CheckResult> {
        let assignment = self.load(assignment_id).await?;
        self.require_owner(actor, &assignment)?;
        Self::require_status(&assignment, AssignmentStatus::InProgress, "check out")?;

        let missing = self.proofs.missing(assignment_id).await?;
        if !missing.is_empty() {
            return Err(DispatchError::ProofIncomplete { missing });
        }

        let job = self.job(&assignment.job_id).await?;
        let check = GeoValidator::check(
            job.location.as_ref(),
            Some(&location),
            self.config.checkout_radius_meters,
        );
        if !check.location_verified {
            warn!(
                assignment_id = %assignment_id,
                distance_meters = ?check.distance_meters,
                max_distance = check.radius_meters,
                "Check-out outside geofence, flagged for review"
            );
        }

        let now = self.clock.now();
        let mut updated = assignment.clone();
        updated.status = AssignmentStatus::PendingVerification;
        updated.checked_out_at = Some(now);

        let record = CheckinRecord {
            assignment_id,
            kind: CheckinKind::Checkout,
            location,
            location_verified: check.location_verified,
            distance_meters: check.distance_meters,
            recorded_at: now,
        };

        if let Err(e) = self
            .store
            .swap_with_checkin(AssignmentStatus::InProgress, updated, record)
            .await
        {
            return self.conflict(e, assignment_id, "check out");
        }

        info!(
            assignment_id = %assignment_id,
            job_id = %assignment.job_id,
            location_verified = check.location_verified,
            "Agent checked out"
        );

        self.mirror(&assignment.job_id, JobStatus::PendingVerification)
            .await;
        self.events.publish(DispatchEvent::CheckedOut {
            assignment_id,
            job_id: assignment.job_id.clone(),
            agent_id: assignment.agent_id.clone(),
            location_verified: check.location_verified,
        });

        Ok(CheckResult {
            location_verified: check.location_verified,
            distance_meters: check.distance_meters,
        })
    }

    /// Admin approval. The payout is re-derived here if the agent's tier moved
    /// since the claim.
    pub async fn verify(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        notes: Option<String>,
    ) -> Result<JobAssignment> {
        let admin_id = actor.require_admin("verify")?.to_string();
        let assignment = self.load(assignment_id).await?;
        Self::require_status(&assignment, AssignmentStatus::PendingVerification, "verify")?;

        let mut updated = assignment.clone();
        self.reprice(&mut updated).await?;
        updated.status = AssignmentStatus::Verified;
        updated.verified_at = Some(self.clock.now());
        updated.verified_by = Some(admin_id.clone());
        if notes.is_some() {
            updated.admin_notes = notes;
        }

        self.commit(AssignmentStatus::PendingVerification, updated.clone(), "verify")
            .await?;

        info!(assignment_id = %assignment_id, admin_id = %admin_id, "Assignment verified");
        self.events.publish(DispatchEvent::JobVerified {
            assignment_id,
            verified_by: admin_id,
        });
        Ok(updated)
    }

    /// Admin rejection sends the agent back to work. Proofs are kept.
    pub async fn reject(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        notes: Option<String>,
    ) -> Result<JobAssignment> {
        let admin_id = actor.require_admin("reject")?.to_string();
        let assignment = self.load(assignment_id).await?;
        Self::require_status(&assignment, AssignmentStatus::PendingVerification, "reject")?;

        let mut updated = assignment.clone();
        updated.status = AssignmentStatus::InProgress;
        updated.rejection_count += 1;
        updated.admin_notes = notes.clone();

        self.commit(AssignmentStatus::PendingVerification, updated.clone(), "reject")
            .await?;

        info!(
            assignment_id = %assignment_id,
            admin_id = %admin_id,
            rejection_count = updated.rejection_count,
            "Verification rejected"
        );
        self.mirror(&assignment.job_id, JobStatus::InProgress).await;
        self.events.publish(DispatchEvent::VerificationRejected {
            assignment_id,
            agent_id: assignment.agent_id.clone(),
            notes,
        });
        Ok(updated)
    }

    /// Hand the computed payout to the payment-execution collaborator
    pub async fn mark_paid(&self, actor: &Actor, assignment_id: Uuid) -> Result<JobAssignment> {
        actor.require_operator("mark_paid")?;
        let assignment = self.load(assignment_id).await?;
        Self::require_status(&assignment, AssignmentStatus::Verified, "mark paid")?;

        let mut updated = assignment.clone();
        updated.status = AssignmentStatus::Paid;
        updated.paid_at = Some(self.clock.now());

        self.commit(AssignmentStatus::Verified, updated.clone(), "mark paid")
            .await?;

        let payout_destination = self
            .profiles
            .agent(&assignment.agent_id)
            .await?
            .and_then(|p| p.payout_destination);

        info!(
            assignment_id = %assignment_id,
            agent_id = %assignment.agent_id,
            agent_payout_cents = updated.agent_payout_cents,
            "Payout ready"
        );
        self.events.publish(DispatchEvent::PayoutReady {
            assignment_id,
            agent_id: assignment.agent_id.clone(),
            agent_payout_cents: updated.agent_payout_cents,
            platform_fee_cents: updated.platform_fee_cents,
            payout_destination,
        });
        Ok(updated)
    }

    pub async fn complete(&self, actor: &Actor, assignment_id: Uuid) -> Result<JobAssignment> {
        actor.require_operator("complete")?;
        let assignment = self.load(assignment_id).await?;
        Self::require_status(&assignment, AssignmentStatus::Paid, "complete")?;

        let mut updated = assignment.clone();
        updated.status = AssignmentStatus::Completed;
        updated.completed_at = Some(self.clock.now());

        self.commit(AssignmentStatus::Paid, updated.clone(), "complete")
            .await?;

        info!(assignment_id = %assignment_id, job_id = %assignment.job_id, "Assignment completed");
        self.mirror(&assignment.job_id, JobStatus::Completed).await;
        self.events.publish(DispatchEvent::JobCompleted {
            assignment_id,
            job_id: assignment.job_id.clone(),
            agent_id: assignment.agent_id.clone(),
        });
        Ok(updated)
    }

    /// Terminal cancellation from `assigned` or `in_progress`. Frees the job for
    /// re-offer unless the booking itself was cancelled.
    pub async fn cancel(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        reason: &str,
    ) -> Result<JobAssignment> {
        let assignment = self.load(assignment_id).await?;
        match actor {
            Actor::Agent(_) => self.require_owner(actor, &assignment)?,
            Actor::Admin(_) | Actor::System => {}
            Actor::Client(_) => {
                return Err(DispatchError::Unauthorized(
                    "clients cancel through the booking collaborator".to_string(),
                ))
            }
        }
        if !assignment.status.is_cancellable() {
            return Err(DispatchError::InvalidStatus {
                current: assignment.status,
                operation: "cancel",
            });
        }

        let mut updated = assignment.clone();
        updated.status = AssignmentStatus::Cancelled;
        updated.cancelled_at = Some(self.clock.now());
        updated.cancellation_reason = Some(reason.to_string());

        self.commit(assignment.status, updated.clone(), "cancel")
            .await?;

        info!(
            assignment_id = %assignment_id,
            job_id = %assignment.job_id,
            by = actor.role(),
            reason,
            "Assignment cancelled"
        );

        let booking_cancelled = matches!(
            self.bookings.job(&assignment.job_id).await,
            Ok(Some(Job {
                status: JobStatus::Cancelled,
                ..
            }))
        );
        if !booking_cancelled {
            self.mirror(&assignment.job_id, JobStatus::Pending).await;
        }
        self.events.publish(DispatchEvent::AssignmentCancelled {
            assignment_id,
            job_id: assignment.job_id.clone(),
            reason: reason.to_string(),
        });
        Ok(updated)
    }

    pub async fn assignment(&self, assignment_id: Uuid) -> Result<JobAssignment> {
        self.load(assignment_id).await
    }

    pub async fn active_assignment_for_job(&self, job_id: &str) -> Result<Option<JobAssignment>> {
        self.store.active_for_job(job_id).await.map_err(store_error)
    }

    pub async fn assignments_for_agent(&self, agent_id: &str) -> Result<Vec<JobAssignment>> {
        self.store.for_agent(agent_id).await.map_err(store_error)
    }

    pub async fn checkin_records(&self, assignment_id: Uuid) -> Result<Vec<CheckinRecord>> {
        self.store
            .checkin_records(assignment_id)
            .await
            .map_err(store_error)
    }

    async fn load(&self, assignment_id: Uuid) -> Result<JobAssignment> {
        self.store
            .get(assignment_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| DispatchError::AssignmentNotFound(assignment_id.to_string()))
    }

    async fn job(&self, job_id: &str) -> Result<Job> {
        self.bookings
            .job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.to_string()))
    }

    fn require_owner(&self, actor: &Actor, assignment: &JobAssignment) -> Result<()> {
        match actor {
            Actor::Agent(id) if *id == assignment.agent_id => Ok(()),
            Actor::Agent(_) => Err(DispatchError::NotYourJob),
            other => Err(DispatchError::Unauthorized(format!(
                "only the assigned agent may do this, got {}",
                other.role()
            ))),
        }
    }

    fn require_status(
        assignment: &JobAssignment,
        expected: AssignmentStatus,
        operation: &'static str,
    ) -> Result<()> {
        if assignment.status != expected {
            return Err(DispatchError::InvalidStatus {
                current: assignment.status,
                operation,
            });
        }
        Ok(())
    }

    async fn commit(
        &self,
        expected: AssignmentStatus,
        updated: JobAssignment,
        operation: &'static str,
    ) -> Result<()> {
        let id = updated.id;
        match self.store.compare_and_swap(expected, updated).await {
            Ok(()) => Ok(()),
            Err(e) => self.conflict(e, id, operation),
        }
    }

    /// A lost compare-and-swap means someone else moved the row first; report the
    /// status it moved to.
    fn conflict<T>(&self, err: StoreError, assignment_id: Uuid, operation: &'static str) -> Result<T> {
        match err {
            StoreError::StatusConflict { found, .. } => {
                debug!(assignment_id = %assignment_id, operation, found = %found, "Lost status race");
                Err(DispatchError::InvalidStatus {
                    current: found,
                    operation,
                })
            }
            StoreError::UniqueViolation(_) if operation == "check in" => {
                Err(DispatchError::AlreadyCheckedIn)
            }
            other => Err(store_error(other)),
        }
    }

    async fn reprice(&self, assignment: &mut JobAssignment) -> Result<()> {
        let Some(profile) = self.profiles.agent(&assignment.agent_id).await? else {
            return Ok(());
        };
        if profile.tier == assignment.tier_at_pricing {
            return Ok(());
        }

        let job = self.job(&assignment.job_id).await?;
        let split = PayoutCalculator::split_for_tier(&job.price, profile.tier)?;
        info!(
            assignment_id = %assignment.id,
            from = %assignment.tier_at_pricing,
            to = %profile.tier,
            agent_payout_cents = split.agent_payout_cents,
            "Tier changed before confirmation, payout recomputed"
        );
        assignment.job_price_cents = job.price.total_price_cents;
        assignment.agent_payout_cents = split.agent_payout_cents;
        assignment.platform_fee_cents = split.platform_fee_cents;
        assignment.tier_at_pricing = profile.tier;
        Ok(())
    }

    async fn mirror(&self, job_id: &str, status: JobStatus) {
        if let Err(e) = self.bookings.mirror_status(job_id, status).await {
            warn!(job_id, status = %status, error = %e, "Failed to mirror job status");
        }
    }
}
