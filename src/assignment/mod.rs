// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod ledger;
pub mod proofs;
pub mod store;
pub mod types;

pub use ledger::AssignmentLedger;
pub use proofs::ProofGate;
pub use store::{AssignmentStore, InMemoryAssignmentStore};
pub use types::{
    AssignedBy, AssignmentStatus, CheckResult, CheckinKind, CheckinRecord, JobAssignment,
    ProofKind, ProofRecord,
};

use crate::error::{DispatchError, StoreError};

/// Translate store faults that have no more specific meaning at the call site
pub(crate) fn store_error(err: StoreError) -> DispatchError {
    match err {
        StoreError::Unavailable(msg) => DispatchError::Unavailable(msg),
        StoreError::NotFound(id) => DispatchError::AssignmentNotFound(id),
        StoreError::UniqueViolation(msg) => DispatchError::InvalidInput(msg),
        StoreError::StatusConflict { id, found, .. } => DispatchError::InvalidInput(format!(
            "assignment {} changed concurrently (now {})",
            id, found
        )),
        StoreError::OfferConflict { id, found } => DispatchError::InvalidInput(format!(
            "offer {} changed concurrently (now {})",
            id, found
        )),
    }
}
