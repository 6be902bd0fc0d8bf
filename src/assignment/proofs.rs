// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::store::AssignmentStore;
use super::types::{AssignmentStatus, ProofKind, ProofRecord};
use super::store_error;
use crate::actor::Actor;
use crate::clock::Clock;
use crate::error::{DispatchError, Result, StoreError};

/// Proof-of-work tracking. Read-through over the assignment store, no lifecycle
/// of its own.
#[derive(Clone)]
pub struct ProofGate {
    store: Arc<dyn AssignmentStore>,
    clock: Arc<dyn Clock>,
}

impl ProofGate {
    pub fn new(store: Arc<dyn AssignmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a proof photo for the assignment, replacing any earlier upload of the
    /// same kind
    pub async fn submit(
        &self,
        actor: &Actor,
        assignment_id: Uuid,
        kind: ProofKind,
        photo_url: &str,
        notes: Option<String>,
    ) -> Result<ProofRecord> {
        if photo_url.trim().is_empty() {
            return Err(DispatchError::InvalidInput("photo_url is empty".to_string()));
        }

        let assignment = self
            .store
            .get(assignment_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| DispatchError::AssignmentNotFound(assignment_id.to_string()))?;

        match actor {
            Actor::Agent(id) if *id == assignment.agent_id => {}
            Actor::Agent(_) => return Err(DispatchError::NotYourJob),
            other => {
                return Err(DispatchError::Unauthorized(format!(
                    "{} cannot submit proof of work",
                    other.role()
                )))
            }
        }

        if assignment.status != AssignmentStatus::InProgress {
            return Err(DispatchError::InvalidStatus {
                current: assignment.status,
                operation: "submit proof",
            });
        }

        let record = ProofRecord {
            assignment_id,
            kind,
            photo_url: photo_url.to_string(),
            notes,
            uploaded_at: self.clock.now(),
        };
        // Re-checked inside the store write
        match self
            .store
            .upsert_proof(AssignmentStatus::InProgress, record.clone())
            .await
        {
            Ok(()) => {}
            Err(StoreError::StatusConflict { found, .. }) => {
                return Err(DispatchError::InvalidStatus {
                    current: found,
                    operation: "submit proof",
                })
            }
            Err(e) => return Err(store_error(e)),
        }

        info!(assignment_id = %assignment_id, kind = ?kind, "Proof of work submitted");
        Ok(record)
    }

    pub async fn proofs(&self, assignment_id: Uuid) -> Result<Vec<ProofRecord>> {
        self.store.proofs(assignment_id).await.map_err(store_error)
    }

    /// Proof kinds still required before check-out
    pub async fn missing(&self, assignment_id: Uuid) -> Result<Vec<ProofKind>> {
        let present: Vec<ProofKind> = self
            .proofs(assignment_id)
            .await?
            .into_iter()
            .map(|p| p.kind)
            .collect();
        Ok(ProofKind::REQUIRED
            .iter()
            .copied()
            .filter(|k| !present.contains(k))
            .collect())
    }

    pub async fn is_complete(&self, assignment_id: Uuid) -> Result<bool> {
        Ok(self.missing(assignment_id).await?.is_empty())
    }
}
