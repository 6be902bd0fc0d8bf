// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistence seam for auto-assignment offers
//!
//! Resolution of an offer is a compare-and-swap from `pending`. Acceptance also
//! expires every pending sibling of the same job in the same critical section, and
//! refuses if a sibling was already accepted.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::types::{AutoAssignmentOffer, OfferStatus};
use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait OfferStore: Send + Sync {
    /// Fails with `UniqueViolation` if the agent already holds an offer for the job
    async fn insert(&self, offer: AutoAssignmentOffer) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<AutoAssignmentOffer>>;

    /// Offers for a job in offer order (priority, then creation)
    async fn for_job(&self, job_id: &str) -> StoreResult<Vec<AutoAssignmentOffer>>;

    async fn pending_for_agent(&self, agent_id: &str) -> StoreResult<Vec<AutoAssignmentOffer>>;

    /// Move a pending offer to `declined` or `expired`
    async fn resolve(
        &self,
        id: Uuid,
        status: OfferStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<AutoAssignmentOffer>;

    /// Accept a pending offer and expire its pending siblings. Returns the siblings
    /// that were expired.
    async fn accept(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<Vec<AutoAssignmentOffer>>;

    /// Expire every pending offer of the job
    async fn expire_for_job(
        &self,
        job_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<AutoAssignmentOffer>>;

    /// Pending offers whose deadline is at or before `now`
    async fn stale(&self, now: DateTime<Utc>) -> StoreResult<Vec<AutoAssignmentOffer>>;
}

#[derive(Debug, Default)]
struct Tables {
    offers: HashMap<Uuid, AutoAssignmentOffer>,
    // Unique index on (job_id, agent_id)
    by_pair: HashMap<(String, String), Uuid>,
}

impl Tables {
    fn pending(&self, id: Uuid) -> StoreResult<&AutoAssignmentOffer> {
        let offer = self
            .offers
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if offer.status.is_resolved() {
            return Err(StoreError::OfferConflict {
                id: id.to_string(),
                found: offer.status,
            });
        }
        Ok(offer)
    }

    fn expire_siblings(
        &mut self,
        job_id: &str,
        except: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Vec<AutoAssignmentOffer> {
        let mut expired = Vec::new();
        for offer in self.offers.values_mut() {
            if offer.job_id == job_id
                && Some(offer.id) != except
                && offer.status == OfferStatus::Pending
            {
                offer.status = OfferStatus::Expired;
                offer.responded_at = Some(at);
                expired.push(offer.clone());
            }
        }
        expired
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryOfferStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryOfferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OfferStore for InMemoryOfferStore {
    async fn insert(&self, offer: AutoAssignmentOffer) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = (offer.job_id.clone(), offer.agent_id.clone());
        if tables.by_pair.contains_key(&key) {
            return Err(StoreError::UniqueViolation(format!(
                "agent {} already has an offer for job {}",
                offer.agent_id, offer.job_id
            )));
        }
        tables.by_pair.insert(key, offer.id);
        tables.offers.insert(offer.id, offer);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AutoAssignmentOffer>> {
        Ok(self.tables.read().await.offers.get(&id).cloned())
    }

    async fn for_job(&self, job_id: &str) -> StoreResult<Vec<AutoAssignmentOffer>> {
        let tables = self.tables.read().await;
        let mut offers: Vec<AutoAssignmentOffer> = tables
            .offers
            .values()
            .filter(|o| o.job_id == job_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| {
            a.priority_level
                .cmp(&b.priority_level)
                .then(a.offered_at.cmp(&b.offered_at))
                .then(a.agent_id.cmp(&b.agent_id))
        });
        Ok(offers)
    }

    async fn pending_for_agent(&self, agent_id: &str) -> StoreResult<Vec<AutoAssignmentOffer>> {
        let tables = self.tables.read().await;
        let mut offers: Vec<AutoAssignmentOffer> = tables
            .offers
            .values()
            .filter(|o| o.agent_id == agent_id && o.status == OfferStatus::Pending)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.expires_at);
        Ok(offers)
    }

    async fn resolve(
        &self,
        id: Uuid,
        status: OfferStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<AutoAssignmentOffer> {
        let mut tables = self.tables.write().await;
        tables.pending(id)?;

        let offer = tables
            .offers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        offer.status = status;
        offer.responded_at = Some(at);
        debug!(offer_id = %id, status = %status, "Offer resolved");
        Ok(offer.clone())
    }

    async fn accept(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<Vec<AutoAssignmentOffer>> {
        let mut tables = self.tables.write().await;
        let job_id = tables.pending(id)?.job_id.clone();

        if let Some(winner) = tables
            .offers
            .values()
            .find(|o| o.job_id == job_id && o.status == OfferStatus::Accepted)
        {
            return Err(StoreError::UniqueViolation(format!(
                "job {} already accepted offer {}",
                job_id, winner.id
            )));
        }

        if let Some(offer) = tables.offers.get_mut(&id) {
            offer.status = OfferStatus::Accepted;
            offer.responded_at = Some(at);
        }
        Ok(tables.expire_siblings(&job_id, Some(id), at))
    }

    async fn expire_for_job(
        &self,
        job_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<AutoAssignmentOffer>> {
        Ok(self.tables.write().await.expire_siblings(job_id, None, at))
    }

    async fn stale(&self, now: DateTime<Utc>) -> StoreResult<Vec<AutoAssignmentOffer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .offers
            .values()
            .filter(|o| o.status == OfferStatus::Pending && o.is_past_deadline(now))
            .cloned()
            .collect())
    }
}
