// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistence seam for assignments, check-in records and proofs
//!
//! Implementations must enforce two contracts inside their own critical section
//! (unique index, transaction or compare-and-swap), never as a read followed by a
//! separate write:
//! - at most one non-cancelled assignment per job
//! - a status update only lands if the row still holds the status the caller read

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::types::{
    AssignmentStatus, CheckinKind, CheckinRecord, JobAssignment, ProofKind, ProofRecord,
};
use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Insert a new assignment. Fails with `UniqueViolation` if the job already has
    /// a non-cancelled assignment.
    async fn insert(&self, assignment: JobAssignment) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<JobAssignment>>;

    async fn active_for_job(&self, job_id: &str) -> StoreResult<Option<JobAssignment>>;

    async fn for_agent(&self, agent_id: &str) -> StoreResult<Vec<JobAssignment>>;

    /// Replace the row if it still holds `expected`. A row moving to `cancelled`
    /// releases the job for a new assignment.
    async fn compare_and_swap(
        &self,
        expected: AssignmentStatus,
        updated: JobAssignment,
    ) -> StoreResult<()>;

    /// Same as `compare_and_swap`, appending a check-in record in the same unit.
    /// A second `checkin` record for one assignment fails with `UniqueViolation`.
    async fn swap_with_checkin(
        &self,
        expected: AssignmentStatus,
        updated: JobAssignment,
        record: CheckinRecord,
    ) -> StoreResult<()>;

    async fn checkin_records(&self, assignment_id: Uuid) -> StoreResult<Vec<CheckinRecord>>;

    /// Insert or replace the active proof for `(assignment_id, kind)`, only while
    /// the assignment still holds `expected`
    async fn upsert_proof(
        &self,
        expected: AssignmentStatus,
        record: ProofRecord,
    ) -> StoreResult<()>;

    async fn proofs(&self, assignment_id: Uuid) -> StoreResult<Vec<ProofRecord>>;
}

#[derive(Debug, Default)]
struct Tables {
    assignments: HashMap<Uuid, JobAssignment>,
    // Unique index: job_id -> non-cancelled assignment
    active_by_job: HashMap<String, Uuid>,
    checkins: HashMap<Uuid, Vec<CheckinRecord>>,
    proofs: HashMap<(Uuid, ProofKind), ProofRecord>,
}

impl Tables {
    fn swap(&mut self, expected: AssignmentStatus, updated: JobAssignment) -> StoreResult<()> {
        let current = self
            .assignments
            .get(&updated.id)
            .ok_or_else(|| StoreError::NotFound(updated.id.to_string()))?;

        if current.status != expected {
            return Err(StoreError::StatusConflict {
                id: updated.id.to_string(),
                expected,
                found: current.status,
            });
        }

        if !updated.is_active()
            && self.active_by_job.get(&updated.job_id) == Some(&updated.id)
        {
            self.active_by_job.remove(&updated.job_id);
        }

        self.assignments.insert(updated.id, updated);
        Ok(())
    }
}

/// In-process store. One lock guards all tables so every trait call is atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssignmentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn insert(&self, assignment: JobAssignment) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.active_by_job.get(&assignment.job_id) {
            return Err(StoreError::UniqueViolation(format!(
                "job {} already has assignment {}",
                assignment.job_id, existing
            )));
        }

        debug!(assignment_id = %assignment.id, job_id = %assignment.job_id, "Assignment row inserted");
        tables
            .active_by_job
            .insert(assignment.job_id.clone(), assignment.id);
        tables.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<JobAssignment>> {
        Ok(self.tables.read().await.assignments.get(&id).cloned())
    }

    async fn active_for_job(&self, job_id: &str) -> StoreResult<Option<JobAssignment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_by_job
            .get(job_id)
            .and_then(|id| tables.assignments.get(id))
            .cloned())
    }

    async fn for_agent(&self, agent_id: &str) -> StoreResult<Vec<JobAssignment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<JobAssignment> = tables
            .assignments
            .values()
            .filter(|a| a.agent_id == agent_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.assigned_at);
        Ok(rows)
    }

    async fn compare_and_swap(
        &self,
        expected: AssignmentStatus,
        updated: JobAssignment,
    ) -> StoreResult<()> {
        self.tables.write().await.swap(expected, updated)
    }

    async fn swap_with_checkin(
        &self,
        expected: AssignmentStatus,
        updated: JobAssignment,
        record: CheckinRecord,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;

        if record.kind == CheckinKind::Checkin {
            let already = tables
                .checkins
                .get(&record.assignment_id)
                .map_or(false, |rows| rows.iter().any(|r| r.kind == CheckinKind::Checkin));
            if already {
                return Err(StoreError::UniqueViolation(format!(
                    "assignment {} already checked in",
                    record.assignment_id
                )));
            }
        }

        tables.swap(expected, updated)?;
        tables
            .checkins
            .entry(record.assignment_id)
            .or_insert_with(Vec::new)
            .push(record);
        Ok(())
    }

    async fn checkin_records(&self, assignment_id: Uuid) -> StoreResult<Vec<CheckinRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .checkins
            .get(&assignment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_proof(
        &self,
        expected: AssignmentStatus,
        record: ProofRecord,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .assignments
            .get(&record.assignment_id)
            .ok_or_else(|| StoreError::NotFound(record.assignment_id.to_string()))?;
        if current.status != expected {
            return Err(StoreError::StatusConflict {
                id: record.assignment_id.to_string(),
                expected,
                found: current.status,
            });
        }
        tables
            .proofs
            .insert((record.assignment_id, record.kind), record);
        Ok(())
    }

    async fn proofs(&self, assignment_id: Uuid) -> StoreResult<Vec<ProofRecord>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ProofRecord> = tables
            .proofs
            .values()
            .filter(|p| p.assignment_id == assignment_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.kind);
        Ok(rows)
    }
}
