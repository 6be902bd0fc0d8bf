// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agents::tier::{PayoutPercent, Tier, TierCalculator, BASIS_POINTS};
use crate::error::{DispatchError, Result};
use crate::jobs::PriceBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSplit {
    pub agent_payout_cents: u64,
    pub platform_fee_cents: u64,
}

impl PayoutSplit {
    pub fn reconciles(&self, total_price_cents: u64) -> bool {
        self.agent_payout_cents
            .checked_add(self.platform_fee_cents)
            .map_or(false, |sum| sum == total_price_cents)
    }
}

pub struct PayoutCalculator;

impl PayoutCalculator {
    /// Split a job price between agent and platform.
    ///
    /// The labor portion is commissioned at `percent` with round-half-up applied to
    /// the commission only. Materials pass through to the agent at cost. The
    /// platform fee is whatever remains, so both outputs always sum to the total.
    pub fn split(
        total_price_cents: u64,
        labor_price_cents: u64,
        materials_cost_cents: u64,
        percent: PayoutPercent,
    ) -> Result<PayoutSplit> {
        let bps = percent.basis_points();
        if bps > BASIS_POINTS {
            return Err(DispatchError::InvalidPriceBreakdown(format!(
                "payout percentage {} bps exceeds 100%",
                bps
            )));
        }

        let labor = labor_price_cents as u128;
        if labor + materials_cost_cents as u128 > total_price_cents as u128 {
            return Err(DispatchError::InvalidPriceBreakdown(format!(
                "labor {} plus materials {} exceeds total {}",
                labor_price_cents, materials_cost_cents, total_price_cents
            )));
        }

        let half = (BASIS_POINTS / 2) as u128;
        let commission = (labor * bps as u128 + half) / BASIS_POINTS as u128;
        let agent_payout = commission + materials_cost_cents as u128;

        if agent_payout > total_price_cents as u128 {
            return Err(DispatchError::InvalidPriceBreakdown(format!(
                "agent payout {} exceeds total {} (labor {}, materials {})",
                agent_payout, total_price_cents, labor_price_cents, materials_cost_cents
            )));
        }

        // agent_payout <= total, so it fits in u64
        let agent_payout_cents = agent_payout as u64;
        let split = PayoutSplit {
            agent_payout_cents,
            platform_fee_cents: total_price_cents - agent_payout_cents,
        };

        debug!(
            total_price_cents,
            labor_price_cents,
            materials_cost_cents,
            bps,
            agent_payout_cents = split.agent_payout_cents,
            platform_fee_cents = split.platform_fee_cents,
            "Payout split calculated"
        );
        Ok(split)
    }

    pub fn split_for_tier(price: &PriceBreakdown, tier: Tier) -> Result<PayoutSplit> {
        Self::split(
            price.total_price_cents,
            price.labor_price_cents,
            price.materials_cost_cents,
            TierCalculator::payout_percent_for(tier),
        )
    }
}
