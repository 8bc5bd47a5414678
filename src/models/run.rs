// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run model and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unit tag for distances.
pub const DISTANCE_UNIT: &str = "meters";
/// Unit tag for average speeds.
pub const AVERAGE_SPEED_UNIT: &str = "km/h";

/// A position at a point in time (start or finish of a run).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    pub at: DateTime<Utc>,
}

/// A value tagged with its unit, as shown to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
}

impl Measurement {
    pub fn meters(value: f64) -> Self {
        Self {
            value,
            unit: DISTANCE_UNIT.to_string(),
        }
    }

    pub fn kilometers_per_hour(value: f64) -> Self {
        Self {
            value,
            unit: AVERAGE_SPEED_UNIT.to_string(),
        }
    }
}

/// Lifecycle state of a run.
///
/// A finished run carries the finish checkpoint and both metrics together,
/// so a partially finished run cannot be represented.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Started,
    Finished {
        finish: Checkpoint,
        /// Distance in meters
        distance: f64,
        /// Average speed in km/h
        average_speed: f64,
    },
}

/// One recorded running session.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start: Checkpoint,
    pub state: RunState,
}

impl Run {
    /// Create a new run in the `Started` state with a fresh id.
    pub fn start(user_id: Uuid, start: Checkpoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            start,
            state: RunState::Started,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Finished { .. })
    }

    pub fn finish(&self) -> Option<&Checkpoint> {
        match &self.state {
            RunState::Started => None,
            RunState::Finished { finish, .. } => Some(finish),
        }
    }

    /// Distance in meters, if finished.
    pub fn distance(&self) -> Option<f64> {
        match self.state {
            RunState::Started => None,
            RunState::Finished { distance, .. } => Some(distance),
        }
    }

    /// Average speed in km/h, if finished.
    pub fn average_speed(&self) -> Option<f64> {
        match self.state {
            RunState::Started => None,
            RunState::Finished { average_speed, .. } => Some(average_speed),
        }
    }
}
