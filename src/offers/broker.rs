// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Auto-assignment offers
//!
//! Per job: no offers -> offers sent -> one accepted (rest expired), or every offer
//! declined/expired and the job returns to the open pool for manual claiming.
//!
//! Responses for one job are serialised by a per-job lock. The sweep takes the same
//! lock before expiring, so "last offer resolved" is observed exactly once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ranking::OfferRanking;
use super::store::OfferStore;
use super::types::{AutoAssignmentOffer, OfferDecision, OfferStatus};
use crate::actor::Actor;
use crate::agents::ProfileDirectory;
use crate::assignment::{AssignmentLedger, JobAssignment};
use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result, StoreError};
use crate::events::{DispatchEvent, EventBus};
use crate::jobs::{BookingCollaborator, JobStatus};

/// Outcome of a successful offer response
#[derive(Debug, Clone, PartialEq)]
pub enum OfferResponse {
    Accepted {
        offer: AutoAssignmentOffer,
        assignment: JobAssignment,
    },
    Declined {
        offer: AutoAssignmentOffer,
    },
}

#[derive(Clone)]
pub struct OfferBroker {
    store: Arc<dyn OfferStore>,
    ledger: AssignmentLedger,
    bookings: Arc<dyn BookingCollaborator>,
    profiles: Arc<dyn ProfileDirectory>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    ranking: OfferRanking,
    job_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl OfferBroker {
    pub fn new(
        store: Arc<dyn OfferStore>,
        ledger: AssignmentLedger,
        bookings: Arc<dyn BookingCollaborator>,
        profiles: Arc<dyn ProfileDirectory>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        let ranking = OfferRanking::new(config.high_rating_threshold, config.max_offers_per_job);
        Self {
            store,
            ledger,
            bookings,
            profiles,
            events,
            clock,
            config,
            ranking,
            job_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn job_lock(&self, job_id: &str) -> Arc<Mutex<()>> {
        self.job_locks
            .lock()
            .await
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Rank eligible agents for a pending job and send each a time-boxed offer.
    /// An empty result leaves the job in the open pool.
    pub async fn create_offers(&self, job_id: &str) -> Result<Vec<AutoAssignmentOffer>> {
        let job = self
            .bookings
            .job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(DispatchError::JobNotClaimable {
                job_id: job_id.to_string(),
                reason: format!("job is {}", job.status),
            });
        }

        let lock = self.job_lock(job_id).await;
        let _guard = lock.lock().await;

        if self.ledger.active_assignment_for_job(job_id).await?.is_some() {
            return Err(DispatchError::AlreadyAssigned {
                job_id: job_id.to_string(),
            });
        }

        let agents = self.profiles.agents().await?;
        let existing = self.store.for_job(job_id).await.map_err(store_error)?;
        let candidates = self.ranking.rank(&job, &agents);

        let now = self.clock.now();
        let expires_at = now + self.config.offer_window();
        let mut created = Vec::new();

        for candidate in candidates {
            if existing.iter().any(|o| o.agent_id == candidate.agent_id) {
                continue;
            }

            let offer = AutoAssignmentOffer::new(
                job_id,
                candidate.agent_id.clone(),
                candidate.priority,
                now,
                expires_at,
            );
            match self.store.insert(offer.clone()).await {
                Ok(()) => {}
                Err(StoreError::UniqueViolation(_)) => continue,
                Err(e) => return Err(store_error(e)),
            }

            self.events.publish(DispatchEvent::OfferCreated {
                offer_id: offer.id,
                job_id: job_id.to_string(),
                agent_id: offer.agent_id.clone(),
                priority: offer.priority_level,
                expires_at,
            });
            created.push(offer);
        }

        if created.is_empty() {
            info!(job_id, "No eligible agents, job stays in open pool");
        } else {
            info!(job_id, offers = created.len(), %expires_at, "Offers sent");
        }
        Ok(created)
    }

    /// Accept or decline an offer on behalf of `agent_id`
    pub async fn respond(
        &self,
        offer_id: Uuid,
        agent_id: &str,
        decision: OfferDecision,
    ) -> Result<OfferResponse> {
        let offer = self.load(offer_id).await?;
        let lock = self.job_lock(&offer.job_id).await;
        let _guard = lock.lock().await;

        // Re-read under the job lock
        let offer = self.load(offer_id).await?;
        if offer.agent_id != agent_id {
            return Err(DispatchError::NotYourJob);
        }
        match offer.status {
            OfferStatus::Pending => {}
            OfferStatus::Expired => {
                return Err(DispatchError::OfferExpired {
                    offer_id: offer_id.to_string(),
                })
            }
            OfferStatus::Accepted | OfferStatus::Declined => {
                return Err(DispatchError::OfferResolved {
                    offer_id: offer_id.to_string(),
                })
            }
        }

        let now = self.clock.now();
        if offer.is_past_deadline(now) {
            self.resolve_quietly(offer_id, OfferStatus::Expired).await;
            self.return_to_pool_if_exhausted(&offer.job_id).await;
            return Err(DispatchError::OfferExpired {
                offer_id: offer_id.to_string(),
            });
        }

        match decision {
            OfferDecision::Decline => {
                let offer = self
                    .store
                    .resolve(offer_id, OfferStatus::Declined, now)
                    .await
                    .map_err(|e| resolution_error(e, offer_id))?;
                info!(offer_id = %offer_id, job_id = %offer.job_id, agent_id, "Offer declined");
                self.return_to_pool_if_exhausted(&offer.job_id).await;
                Ok(OfferResponse::Declined { offer })
            }
            OfferDecision::Accept => self.accept(offer, agent_id).await,
        }
    }

    async fn accept(&self, offer: AutoAssignmentOffer, agent_id: &str) -> Result<OfferResponse> {
        let actor = Actor::agent(agent_id);
        let assignment = match self.ledger.claim(&actor, &offer.job_id, agent_id).await {
            Ok(assignment) => assignment,
            Err(DispatchError::AlreadyAssigned { job_id }) => {
                // Lost to a manual claim
                self.resolve_quietly(offer.id, OfferStatus::Expired).await;
                return Err(DispatchError::AlreadyAssigned { job_id });
            }
            Err(e) => return Err(e),
        };

        let now = self.clock.now();
        match self.store.accept(offer.id, now).await {
            Ok(siblings) => {
                info!(
                    offer_id = %offer.id,
                    job_id = %offer.job_id,
                    agent_id,
                    assignment_id = %assignment.id,
                    siblings_expired = siblings.len(),
                    "Offer accepted"
                );
                let mut offer = offer;
                offer.status = OfferStatus::Accepted;
                offer.responded_at = Some(now);
                Ok(OfferResponse::Accepted { offer, assignment })
            }
            Err(e) => {
                // The sweep expired the offer between the checks and the claim
                warn!(
                    offer_id = %offer.id,
                    assignment_id = %assignment.id,
                    error = %e,
                    "Offer resolved during acceptance, cancelling assignment"
                );
                self.ledger
                    .cancel(&Actor::System, assignment.id, "offer expired during acceptance")
                    .await?;
                self.return_to_pool_if_exhausted(&offer.job_id).await;
                Err(DispatchError::OfferExpired {
                    offer_id: offer.id.to_string(),
                })
            }
        }
    }

    /// Expire every pending offer past its deadline. Returns how many were expired.
    pub async fn expire_stale(&self) -> Result<usize> {
        let now = self.clock.now();
        let stale = self.store.stale(now).await.map_err(store_error)?;

        let mut by_job: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();
        for offer in stale {
            by_job.entry(offer.job_id).or_default().push(offer.id);
        }

        let mut expired = 0;
        for (job_id, offer_ids) in by_job {
            let lock = self.job_lock(&job_id).await;
            let _guard = lock.lock().await;

            for offer_id in offer_ids {
                match self.store.resolve(offer_id, OfferStatus::Expired, now).await {
                    Ok(_) => expired += 1,
                    // Answered while we waited for the lock
                    Err(StoreError::OfferConflict { .. }) => {}
                    Err(e) => return Err(store_error(e)),
                }
            }
            self.return_to_pool_if_exhausted(&job_id).await;
        }

        // Runs on every sweep, stale or not: offers answered or withdrawn before
        // their deadline leave idle lock entries behind.
        let tracked_jobs = self.prune_locks().await;
        if expired > 0 {
            debug!(expired, tracked_jobs, "Offer sweep finished");
        }
        Ok(expired)
    }

    /// Withdraw all pending offers for a job that was claimed manually or cancelled
    pub async fn expire_offers_for_job(&self, job_id: &str) -> Result<usize> {
        let lock = self.job_lock(job_id).await;
        let _guard = lock.lock().await;

        let expired = self
            .store
            .expire_for_job(job_id, self.clock.now())
            .await
            .map_err(store_error)?;
        if !expired.is_empty() {
            info!(job_id, withdrawn = expired.len(), "Pending offers withdrawn");
        }
        Ok(expired.len())
    }

    pub async fn offer(&self, offer_id: Uuid) -> Result<AutoAssignmentOffer> {
        self.load(offer_id).await
    }

    pub async fn pending_offers_for_agent(&self, agent_id: &str) -> Result<Vec<AutoAssignmentOffer>> {
        let now = self.clock.now();
        let offers = self
            .store
            .pending_for_agent(agent_id)
            .await
            .map_err(store_error)?;
        Ok(offers
            .into_iter()
            .filter(|o| !o.is_past_deadline(now))
            .collect())
    }

    pub async fn offers_for_job(&self, job_id: &str) -> Result<Vec<AutoAssignmentOffer>> {
        self.store.for_job(job_id).await.map_err(store_error)
    }

    async fn load(&self, offer_id: Uuid) -> Result<AutoAssignmentOffer> {
        self.store
            .get(offer_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| DispatchError::OfferNotFound(offer_id.to_string()))
    }

    async fn resolve_quietly(&self, offer_id: Uuid, status: OfferStatus) {
        if let Err(e) = self.store.resolve(offer_id, status, self.clock.now()).await {
            debug!(offer_id = %offer_id, error = %e, "Offer already resolved");
        }
    }

    /// Called with the job lock held. When every offer is resolved and none was
    /// accepted, hand the job back to the manual-claim pool.
    async fn return_to_pool_if_exhausted(&self, job_id: &str) {
        let offers = match self.store.for_job(job_id).await {
            Ok(offers) => offers,
            Err(e) => {
                warn!(job_id, error = %e, "Could not read offers for pool check");
                return;
            }
        };
        if offers.is_empty()
            || offers
                .iter()
                .any(|o| matches!(o.status, OfferStatus::Pending | OfferStatus::Accepted))
        {
            return;
        }

        match self.ledger.active_assignment_for_job(job_id).await {
            Ok(None) => {}
            Ok(Some(_)) => return,
            Err(e) => {
                warn!(job_id, error = %e, "Could not read assignment for pool check");
                return;
            }
        }

        let claimable = matches!(self.bookings.job(job_id).await, Ok(Some(job)) if job.is_claimable());
        if !claimable {
            return;
        }

        if let Err(e) = self.bookings.mirror_status(job_id, JobStatus::Pending).await {
            warn!(job_id, error = %e, "Failed to mirror job status");
        }
        info!(job_id, offers = offers.len(), "All offers lapsed, job returned to open pool");
        self.events.publish(DispatchEvent::JobReturnedToPool {
            job_id: job_id.to_string(),
        });
    }

    /// Drop lock entries nobody holds. Returns how many remain.
    async fn prune_locks(&self) -> usize {
        let mut locks = self.job_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.len()
    }
}

fn store_error(err: StoreError) -> DispatchError {
    match err {
        StoreError::NotFound(id) => DispatchError::OfferNotFound(id),
        other => crate::assignment::store_error(other),
    }
}

fn resolution_error(err: StoreError, offer_id: Uuid) -> DispatchError {
    match err {
        StoreError::OfferConflict {
            found: OfferStatus::Expired,
            ..
        } => {
            DispatchError::OfferExpired {
                offer_id: offer_id.to_string(),
            }
        }
        StoreError::OfferConflict { .. } => DispatchError::OfferResolved {
            offer_id: offer_id.to_string(),
        },
        other => store_error(other),
    }
}
