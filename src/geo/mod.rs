// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Geofencing
//!
//! Great-circle distance between two coordinates and within-radius checks. A
//! missing point on either side skips verification and grants trust: a job without
//! a registered location is not the agent's fault.

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Mean Earth radius used by the Haversine formula
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub const METERS_PER_MILE: f64 = 1609.344;

/// A WGS84 coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DispatchError::InvalidInput(format!(
                "latitude {} out of range",
                lat
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(DispatchError::InvalidInput(format!(
                "longitude {} out of range",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// Outcome of a geofence evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceCheck {
    pub location_verified: bool,
    /// None when verification was skipped for lack of a target or reported point
    pub distance_meters: Option<f64>,
    pub radius_meters: f64,
}

impl GeofenceCheck {
    pub fn skipped(&self) -> bool {
        self.distance_meters.is_none()
    }
}

pub struct GeoValidator;

impl GeoValidator {
    /// Haversine distance in meters between two points
    pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
        let lat1 = a.lat.to_radians();
        let lat2 = b.lat.to_radians();
        let dlat = (b.lat - a.lat).to_radians();
        let dlon = (b.lon - a.lon).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * h.sqrt().min(1.0).asin();

        EARTH_RADIUS_METERS * c
    }

    pub fn is_within_radius(distance_meters: f64, radius_meters: f64) -> bool {
        distance_meters <= radius_meters
    }

    /// Evaluate a reported position against a target. Either side missing means the
    /// check is skipped and treated as verified.
    pub fn check(
        target: Option<&GeoPoint>,
        reported: Option<&GeoPoint>,
        radius_meters: f64,
    ) -> GeofenceCheck {
        match (target, reported) {
            (Some(target), Some(reported)) => {
                let distance = Self::distance_meters(target, reported);
                GeofenceCheck {
                    location_verified: Self::is_within_radius(distance, radius_meters),
                    distance_meters: Some(distance),
                    radius_meters,
                }
            }
            _ => GeofenceCheck {
                location_verified: true,
                distance_meters: None,
                radius_meters,
            },
        }
    }
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}
