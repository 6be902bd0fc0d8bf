// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Entry point for booking hooks, agent actions and admin actions

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::sweeper::spawn_offer_sweeper;
use crate::actor::Actor;
use crate::agents::ProfileDirectory;
use crate::assignment::{
    AssignmentLedger, AssignmentStore, CheckResult, CheckinRecord, InMemoryAssignmentStore,
    JobAssignment, ProofKind, ProofRecord,
};
use crate::clock::{Clock, SystemClock};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::events::{DispatchEvent, EventBus};
use crate::geo::GeoPoint;
use crate::jobs::BookingCollaborator;
use crate::offers::{
    AutoAssignmentOffer, InMemoryOfferStore, OfferBroker, OfferDecision, OfferResponse,
    OfferStore,
};

const BOOKING_CANCELLED_REASON: &str = "booking cancelled";

#[derive(Clone)]
pub struct DispatchService {
    ledger: AssignmentLedger,
    broker: OfferBroker,
    events: EventBus,
    config: DispatchConfig,
}

impl DispatchService {
    pub fn new(
        config: DispatchConfig,
        bookings: Arc<dyn BookingCollaborator>,
        profiles: Arc<dyn ProfileDirectory>,
        assignments: Arc<dyn AssignmentStore>,
        offers: Arc<dyn OfferStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::new(config.event_channel_capacity);
        let ledger = AssignmentLedger::new(
            assignments,
            bookings.clone(),
            profiles.clone(),
            events.clone(),
            clock.clone(),
            config.clone(),
        );
        let broker = OfferBroker::new(
            offers,
            ledger.clone(),
            bookings,
            profiles,
            events.clone(),
            clock,
            config.clone(),
        );
        Self {
            ledger,
            broker,
            events,
            config,
        }
    }

    /// Service over in-process stores and the wall clock
    pub fn in_memory(
        config: DispatchConfig,
        bookings: Arc<dyn BookingCollaborator>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        Self::new(
            config,
            bookings,
            profiles,
            Arc::new(InMemoryAssignmentStore::new()),
            Arc::new(InMemoryOfferStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn ledger(&self) -> &AssignmentLedger {
        &self.ledger
    }

    pub fn broker(&self) -> &OfferBroker {
        &self.broker
    }

    /// Start the periodic offer-expiry sweep. Cancel `shutdown` to stop it.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        spawn_offer_sweeper(self.broker.clone(), self.config.sweep_interval(), shutdown)
    }

    // Booking collaborator hooks

    /// A new job entered the pending pool
    pub async fn on_job_created(&self, job_id: &str) -> Result<Vec<AutoAssignmentOffer>> {
        self.broker.create_offers(job_id).await
    }

    /// The booking collaborator cancelled the job. Withdraws pending offers and
    /// cancels an assignment that has not yet been checked out.
    pub async fn on_job_cancelled(&self, job_id: &str) -> Result<Option<JobAssignment>> {
        self.broker.expire_offers_for_job(job_id).await?;

        let Some(active) = self.ledger.active_assignment_for_job(job_id).await? else {
            info!(job_id, "Booking cancelled with no active assignment");
            return Ok(None);
        };

        if !active.status.is_cancellable() {
            warn!(
                job_id,
                assignment_id = %active.id,
                status = %active.status,
                "Booking cancelled after check-out, assignment left for admin"
            );
            return Err(DispatchError::InvalidStatus {
                current: active.status,
                operation: "cancel",
            });
        }

        let cancelled = self
            .ledger
            .cancel(&Actor::System, active.id, BOOKING_CANCELLED_REASON)
            .await?;
        Ok(Some(cancelled))
    }

    // Agent and admin actions

    /// Manual claim from the open pool by an agent, or an admin assigning directly.
    /// Any outstanding offers for the job are withdrawn.
    pub async fn claim_job(
        &self,
        actor: &Actor,
        job_id: &str,
        agent_id: &str,
    ) -> Result<JobAssignment> {
        let assignment = self.ledger.claim(actor, job_id, agent_id).await?;
        self.broker.expire_offers_for_job(job_id).await?;
        Ok(assignment)
    }

    pub async fn respond_to_offer(
        &self,
        actor: &Actor,
        offer_id: Uuid,
        decision: OfferDecision,
    ) -> Result<OfferResponse> {
        match actor {
            Actor::Agent(agent_id) => self.broker.respond(offer_id, agent_id, decision).await,
            other => Err(DispatchError::Unauthorized(format!(
                "only agents respond to offers, got {}",
                other.role()
            ))),
        }
    }

    pub async fn check_in(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        location: GeoPoint,
    ) -> Result<CheckResult> {
        self.ledger.check_in(actor, assignment_id, location).await
    }

    pub async fn submit_proof(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        kind: ProofKind,
        photo_url: &str,
        notes: Option<String>,
    ) -> Result<ProofRecord> {
        self.ledger
            .proofs()
            .submit(actor, assignment_id, kind, photo_url, notes)
            .await
    }

    pub async fn check_out(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        location: GeoPoint,
    ) -> Result<CheckResult> {
        self.ledger.check_out(actor, assignment_id, location).await
    }

    pub async fn verify(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        notes: Option<String>,
    ) -> Result<JobAssignment> {
        self.ledger.verify(actor, assignment_id, notes).await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        notes: Option<String>,
    ) -> Result<JobAssignment> {
        self.ledger.reject(actor, assignment_id, notes).await
    }

    pub async fn mark_paid(&self, actor: &Actor, assignment_id: Uuid) -> Result<JobAssignment> {
        self.ledger.mark_paid(actor, assignment_id).await
    }

    pub async fn complete(&self, actor: &Actor, assignment_id: Uuid) -> Result<JobAssignment> {
        self.ledger.complete(actor, assignment_id).await
    }

    pub async fn cancel(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        reason: &str,
    ) -> Result<JobAssignment> {
        self.ledger.cancel(actor, assignment_id, reason).await
    }

    pub async fn expire_stale_offers(&self) -> Result<usize> {
        self.broker.expire_stale().await
    }

    // Queries

    pub async fn assignment(&self, assignment_id: Uuid) -> Result<JobAssignment> {
        self.ledger.assignment(assignment_id).await
    }

    pub async fn active_assignment_for_job(&self, job_id: &str) -> Result<Option<JobAssignment>> {
        self.ledger.active_assignment_for_job(job_id).await
    }

    pub async fn assignments_for_agent(&self, agent_id: &str) -> Result<Vec<JobAssignment>> {
        self.ledger.assignments_for_agent(agent_id).await
    }

    pub async fn checkin_records(&self, assignment_id: Uuid) -> Result<Vec<CheckinRecord>> {
        self.ledger.checkin_records(assignment_id).await
    }

    pub async fn proofs(&self, assignment_id: Uuid) -> Result<Vec<ProofRecord>> {
        self.ledger.proofs().proofs(assignment_id).await
    }

    pub async fn pending_offers_for_agent(&self, agent_id: &str) -> Result<Vec<AutoAssignmentOffer>> {
        self.broker.pending_offers_for_agent(agent_id).await
    }

    pub async fn offers_for_job(&self, job_id: &str) -> Result<Vec<AutoAssignmentOffer>> {
        self.broker.offers_for_job(job_id).await
    }
}
