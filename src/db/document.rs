//! Flat storage shape for runs.
//!
//! Document stores hold the finish snapshot and metrics as nullable fields.
//! Conversion back to [`Run`] accepts only "all absent" or "all present".

use crate::db::StoreError;
use crate::models::{Checkpoint, Run, RunState};
use crate::time_utils::{format_sortable, parse_datetime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored run record.
///
/// Timestamps are kept as fixed-width RFC3339 strings so range filters on
/// `start_datetime` compare lexicographically. They hold millisecond
/// precision; finer digits are already dropped when requests are parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDocument {
    pub id: String,
    pub user_id: String,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub start_datetime: String,
    pub finish_latitude: Option<f64>,
    pub finish_longitude: Option<f64>,
    pub finish_datetime: Option<String>,
    /// Meters
    pub distance: Option<f64>,
    pub distance_unit: Option<String>,
    /// km/h
    pub average_speed: Option<f64>,
    pub average_speed_unit: Option<String>,
}

impl From<&Run> for RunDocument {
    fn from(run: &Run) -> Self {
        let mut doc = RunDocument {
            id: run.id.to_string(),
            user_id: run.user_id.to_string(),
            start_latitude: run.start.latitude,
            start_longitude: run.start.longitude,
            start_datetime: format_sortable(run.start.at),
            finish_latitude: None,
            finish_longitude: None,
            finish_datetime: None,
            distance: None,
            distance_unit: None,
            average_speed: None,
            average_speed_unit: None,
        };

        if let RunState::Finished {
            finish,
            distance,
            average_speed,
        } = &run.state
        {
            doc.finish_latitude = Some(finish.latitude);
            doc.finish_longitude = Some(finish.longitude);
            doc.finish_datetime = Some(format_sortable(finish.at));
            doc.distance = Some(*distance);
            doc.distance_unit = Some(crate::models::run::DISTANCE_UNIT.to_string());
            doc.average_speed = Some(*average_speed);
            doc.average_speed_unit = Some(crate::models::run::AVERAGE_SPEED_UNIT.to_string());
        }

        doc
    }
}

impl TryFrom<RunDocument> for Run {
    type Error = StoreError;

    fn try_from(doc: RunDocument) -> Result<Self, Self::Error> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            id: doc.id.clone(),
            reason: reason.to_string(),
        };

        let id = Uuid::parse_str(&doc.id).map_err(|_| corrupt("invalid run id"))?;
        let user_id = Uuid::parse_str(&doc.user_id).map_err(|_| corrupt("invalid user id"))?;
        let start_at =
            parse_datetime(&doc.start_datetime).ok_or_else(|| corrupt("invalid start_datetime"))?;

        let state = match (
            doc.finish_latitude,
            doc.finish_longitude,
            doc.finish_datetime.as_deref(),
            doc.distance,
            doc.average_speed,
        ) {
            (None, None, None, None, None) => RunState::Started,
            (Some(latitude), Some(longitude), Some(finish_at), Some(distance), Some(average_speed)) => {
                let at =
                    parse_datetime(finish_at).ok_or_else(|| corrupt("invalid finish_datetime"))?;
                RunState::Finished {
                    finish: Checkpoint {
                        latitude,
                        longitude,
                        at,
                    },
                    distance,
                    average_speed,
                }
            }
            _ => return Err(corrupt("partially populated finish data")),
        };

        Ok(Run {
            id,
            user_id,
            start: Checkpoint {
                latitude: doc.start_latitude,
                longitude: doc.start_longitude,
                at: start_at,
            },
            state,
        })
    }
}
