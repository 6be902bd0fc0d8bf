// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod profile;
pub mod tier;

pub use profile::{AgentProfile, InMemoryProfileDirectory, ProfileDirectory};
pub use tier::{AgentStatsChanged, PayoutPercent, Tier, TierCalculator};
