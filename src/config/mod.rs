// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the dispatch engine

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Configuration for dispatch, geofencing and offer handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum distance from the job for a check-in to be accepted
    pub checkin_radius_meters: f64,
    /// Distance beyond which a check-out is flagged unverified (never blocked)
    pub checkout_radius_meters: f64,
    /// How long an auto-assignment offer stays open
    pub offer_window_secs: u64,
    /// Period of the background offer-expiry sweep
    pub sweep_interval_secs: u64,
    /// Minimum rating for the high-rated offer priority
    pub high_rating_threshold: f64,
    /// Upper bound on offers created for a single job
    pub max_offers_per_job: usize,
    /// Buffer size of the outbound event channel
    pub event_channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            checkin_radius_meters: 100.0,
            checkout_radius_meters: 100.0,
            offer_window_secs: 300,
            sweep_interval_secs: 30,
            high_rating_threshold: 4.5,
            max_offers_per_job: 10,
            event_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    dispatch: DispatchConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DispatchConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            checkin_radius_meters: env_or(
                "DISPATCH_CHECKIN_RADIUS_METERS",
                defaults.checkin_radius_meters,
            ),
            checkout_radius_meters: env_or(
                "DISPATCH_CHECKOUT_RADIUS_METERS",
                defaults.checkout_radius_meters,
            ),
            offer_window_secs: env_or("DISPATCH_OFFER_WINDOW_SECS", defaults.offer_window_secs),
            sweep_interval_secs: env_or(
                "DISPATCH_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            high_rating_threshold: env_or(
                "DISPATCH_HIGH_RATING_THRESHOLD",
                defaults.high_rating_threshold,
            ),
            max_offers_per_job: env_or("DISPATCH_MAX_OFFERS_PER_JOB", defaults.max_offers_per_job),
            event_channel_capacity: env_or(
                "DISPATCH_EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity,
            ),
        }
    }

    /// Parse the `[dispatch]` table of a TOML document. Missing keys use defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).context("invalid dispatch config TOML")?;
        file.dispatch
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("dispatch config failed validation")?;
        Ok(file.dispatch)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.checkin_radius_meters > 0.0) {
            return Err("Check-in radius must be greater than 0".to_string());
        }
        if !(self.checkout_radius_meters > 0.0) {
            return Err("Check-out radius must be greater than 0".to_string());
        }
        if self.offer_window_secs == 0 {
            return Err("Offer window must be greater than 0".to_string());
        }
        if self.sweep_interval_secs == 0 {
            return Err("Sweep interval must be greater than 0".to_string());
        }
        if self.max_offers_per_job == 0 {
            return Err("Max offers per job must be greater than 0".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err("Event channel capacity must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn offer_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.offer_window_secs as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
