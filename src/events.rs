// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Outbound events
//!
//! Notification and payment collaborators subscribe to the bus. Delivery is
//! fire-and-forget: publishing never fails a transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::assignment::types::AssignedBy;
use crate::offers::types::PriorityLevel;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    OfferCreated {
        offer_id: Uuid,
        job_id: String,
        agent_id: String,
        priority: PriorityLevel,
        expires_at: DateTime<Utc>,
    },
    JobAssigned {
        assignment_id: Uuid,
        job_id: String,
        agent_id: String,
        assigned_by: AssignedBy,
    },
    JobStarted {
        assignment_id: Uuid,
        job_id: String,
        agent_id: String,
        location_verified: bool,
    },
    CheckedOut {
        assignment_id: Uuid,
        job_id: String,
        agent_id: String,
        location_verified: bool,
    },
    VerificationRejected {
        assignment_id: Uuid,
        agent_id: String,
        notes: Option<String>,
    },
    JobVerified {
        assignment_id: Uuid,
        verified_by: String,
    },
    /// Trigger for the payment-execution collaborator
    PayoutReady {
        assignment_id: Uuid,
        agent_id: String,
        agent_payout_cents: u64,
        platform_fee_cents: u64,
        payout_destination: Option<String>,
    },
    /// Stats-change trigger for the profile collaborator
    JobCompleted {
        assignment_id: Uuid,
        job_id: String,
        agent_id: String,
    },
    AssignmentCancelled {
        assignment_id: Uuid,
        job_id: String,
        reason: String,
    },
    JobReturnedToPool {
        job_id: String,
    },
}

impl DispatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::OfferCreated { .. } => "offer_created",
            DispatchEvent::JobAssigned { .. } => "job_assigned",
            DispatchEvent::JobStarted { .. } => "job_started",
            DispatchEvent::CheckedOut { .. } => "checked_out",
            DispatchEvent::VerificationRejected { .. } => "verification_rejected",
            DispatchEvent::JobVerified { .. } => "job_verified",
            DispatchEvent::PayoutReady { .. } => "payout_ready",
            DispatchEvent::JobCompleted { .. } => "job_completed",
            DispatchEvent::AssignmentCancelled { .. } => "assignment_cancelled",
            DispatchEvent::JobReturnedToPool { .. } => "job_returned_to_pool",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DispatchEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "Event published"),
            Err(_) => debug!(event = name, "Event dropped, no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
