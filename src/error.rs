// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the dispatch engine
//!
//! Every business-rule refusal is a distinct variant carrying enough detail for a
//! client to render a message (distance for geofence failures, the status a
//! transition was attempted from, the proofs still missing). Storage faults are kept
//! apart in [`StoreError`] and only `Unavailable` crosses the boundary unchanged.

use thiserror::Error;

use crate::assignment::types::{AssignmentStatus, ProofKind};
use crate::offers::types::OfferStatus;

/// Errors surfaced by the dispatch engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The job already has a non-cancelled assignment
    #[error("Job {job_id} is already assigned")]
    AlreadyAssigned { job_id: String },

    /// The acting agent does not own the assignment or offer
    #[error("Assignment or offer belongs to another agent")]
    NotYourJob,

    /// Transition attempted from a status that does not permit it
    #[error("Cannot {operation} while assignment is {current}")]
    InvalidStatus {
        current: AssignmentStatus,
        operation: &'static str,
    },

    /// Check-in refused by the geofence
    #[error("Too far from job: {distance_meters:.1}m away (max {max_distance:.1}m)")]
    TooFarFromJob {
        distance_meters: f64,
        max_distance: f64,
    },

    /// Check-out attempted before both proof photos were submitted
    #[error("Proof of work incomplete, missing: {missing:?}")]
    ProofIncomplete { missing: Vec<ProofKind> },

    /// The offer deadline has passed or the offer was resolved elsewhere
    #[error("Offer {offer_id} has expired")]
    OfferExpired { offer_id: String },

    /// The offer was already accepted or declined
    #[error("Offer {offer_id} was already resolved")]
    OfferResolved { offer_id: String },

    #[error("Assignment already checked in")]
    AlreadyCheckedIn,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("Offer not found: {0}")]
    OfferNotFound(String),

    /// The booking collaborator no longer accepts assignments for this job
    #[error("Job {job_id} cannot be claimed: {reason}")]
    JobNotClaimable { job_id: String, reason: String },

    /// The actor lacks the role required for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid price breakdown: {0}")]
    InvalidPriceBreakdown(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence is unreachable; the same action may succeed later
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl DispatchError {
    /// True when the caller should retry the same action later rather than try a
    /// different one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Unavailable(_))
    }
}

/// Errors raised by the assignment and offer stores
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Compare-and-swap lost: the assignment no longer holds the expected status
    #[error("Status conflict on {id}: expected {expected}, found {found}")]
    StatusConflict {
        id: String,
        expected: AssignmentStatus,
        found: AssignmentStatus,
    },

    /// The offer was no longer pending
    #[error("Offer {id} already {found}")]
    OfferConflict { id: String, found: OfferStatus },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
