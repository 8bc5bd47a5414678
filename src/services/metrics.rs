// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run metrics: great-circle distance and average speed.
//!
//! Both computations are pure. [`RunCalculator`] is the seam the run service
//! depends on, so tests can observe (or forbid) calls into the math.

use chrono::{DateTime, Utc};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

const SECONDS_PER_HOUR: f64 = 3600.0;
const METERS_PER_KILOMETER: f64 = 1000.0;

/// Errors from metric calculations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculationError {
    #[error("non-finite input for {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("distance must not be negative: {0}")]
    NegativeDistance(f64),

    #[error("finish time {finish} is before start time {start}")]
    NegativeDuration {
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    },

    #[error("calculation produced a non-finite result")]
    NonFiniteResult,
}

/// Distance and speed calculations used when finishing a run.
pub trait RunCalculator: Send + Sync {
    /// Distance in meters between two points given in decimal degrees.
    fn distance(
        &self,
        start_latitude: f64,
        start_longitude: f64,
        end_latitude: f64,
        end_longitude: f64,
    ) -> Result<f64, CalculationError>;

    /// Average speed in km/h over the interval.
    fn average_speed(
        &self,
        distance_meters: f64,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Result<f64, CalculationError>;
}

/// Default calculator backed by the haversine formula.
#[derive(Debug, Default, Clone, Copy)]
pub struct HaversineCalculator;

impl RunCalculator for HaversineCalculator {
    fn distance(
        &self,
        start_latitude: f64,
        start_longitude: f64,
        end_latitude: f64,
        end_longitude: f64,
    ) -> Result<f64, CalculationError> {
        haversine_distance(start_latitude, start_longitude, end_latitude, end_longitude)
    }

    fn average_speed(
        &self,
        distance_meters: f64,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> Result<f64, CalculationError> {
        average_speed(distance_meters, start, finish)
    }
}

/// Great-circle distance in meters, rounded to hundredths.
pub fn haversine_distance(
    start_latitude: f64,
    start_longitude: f64,
    end_latitude: f64,
    end_longitude: f64,
) -> Result<f64, CalculationError> {
    require_finite("start_latitude", start_latitude)?;
    require_finite("start_longitude", start_longitude)?;
    require_finite("end_latitude", end_latitude)?;
    require_finite("end_longitude", end_longitude)?;

    let delta_lat = (end_latitude - start_latitude).to_radians();
    let delta_lon = (end_longitude - start_longitude).to_radians();
    let start_lat_rad = start_latitude.to_radians();
    let end_lat_rad = end_latitude.to_radians();

    let a = half_versine(delta_lat)
        + start_lat_rad.cos() * end_lat_rad.cos() * half_versine(delta_lon);
    // Accumulated rounding can push `a` just past 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let central_angle = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    let meters = EARTH_RADIUS_METERS * central_angle;
    if !meters.is_finite() {
        return Err(CalculationError::NonFiniteResult);
    }

    let rounded = round_hundredths(meters);
    tracing::debug!(
        start_latitude,
        start_longitude,
        end_latitude,
        end_longitude,
        distance_meters = rounded,
        "Calculated distance"
    );
    Ok(rounded)
}

/// Average speed in km/h, rounded to hundredths.
///
/// The interval is measured in whole seconds. A zero-length interval yields
/// exactly `0.0`.
pub fn average_speed(
    distance_meters: f64,
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
) -> Result<f64, CalculationError> {
    require_finite("distance", distance_meters)?;
    if distance_meters < 0.0 {
        return Err(CalculationError::NegativeDistance(distance_meters));
    }

    let duration_seconds = (finish - start).num_seconds();
    if duration_seconds < 0 {
        return Err(CalculationError::NegativeDuration { start, finish });
    }
    if duration_seconds == 0 {
        return Ok(0.0);
    }

    let hours = duration_seconds as f64 / SECONDS_PER_HOUR;
    let speed = round_hundredths(distance_meters / (hours * METERS_PER_KILOMETER));
    if !speed.is_finite() {
        return Err(CalculationError::NonFiniteResult);
    }

    tracing::debug!(average_speed_kmh = speed, duration_seconds, "Calculated average speed");
    Ok(speed)
}

/// Round half-up at the hundredths digit.
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

fn half_versine(angle: f64) -> f64 {
    (angle / 2.0).sin().powi(2)
}

fn require_finite(field: &'static str, value: f64) -> Result<(), CalculationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CalculationError::NonFinite { field, value })
    }
}
