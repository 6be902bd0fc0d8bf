// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod actor;
pub mod agents;
pub mod assignment;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod geo;
pub mod jobs;
pub mod offers;
pub mod payouts;
pub mod telemetry;
pub mod version;

pub use actor::Actor;
pub use agents::{
    AgentProfile, AgentStatsChanged, InMemoryProfileDirectory, PayoutPercent, ProfileDirectory,
    Tier, TierCalculator,
};
pub use assignment::{
    AssignedBy, AssignmentLedger, AssignmentStatus, AssignmentStore, CheckResult, CheckinKind,
    CheckinRecord, InMemoryAssignmentStore, JobAssignment, ProofGate, ProofKind, ProofRecord,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DispatchConfig;
pub use dispatch::{spawn_offer_sweeper, DispatchService};
pub use error::{DispatchError, Result, StoreError};
pub use events::{DispatchEvent, EventBus};
pub use geo::{GeoPoint, GeoValidator, GeofenceCheck};
pub use jobs::{BookingCollaborator, InMemoryBookings, Job, JobStatus, PriceBreakdown};
pub use offers::{
    AutoAssignmentOffer, InMemoryOfferStore, OfferBroker, OfferDecision, OfferResponse,
    OfferStatus, OfferStore, PriorityLevel,
};
pub use payouts::{PayoutCalculator, PayoutSplit};
