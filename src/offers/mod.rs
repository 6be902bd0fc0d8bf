// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod broker;
pub mod ranking;
pub mod store;
pub mod types;

pub use broker::{OfferBroker, OfferResponse};
pub use ranking::{OfferRanking, RankedCandidate};
pub use store::{InMemoryOfferStore, OfferStore};
pub use types::{AutoAssignmentOffer, OfferDecision, OfferStatus, PriorityLevel};
