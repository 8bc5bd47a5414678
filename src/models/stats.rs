//! Per-user run statistics.
//!
//! Computed fresh from the user's runs on every request; never stored.

use serde::Serialize;

use crate::models::Run;

/// Summary statistics over a set of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserStatistics {
    /// Number of runs considered
    pub total_runs: u32,
    /// Sum of run distances (meters)
    pub total_distance: f64,
    /// Mean of run average speeds (km/h)
    pub average_speed: f64,
}

impl UserStatistics {
    /// Fold runs into statistics.
    ///
    /// Runs without metrics (not yet finished) contribute zero distance and
    /// zero speed, but still count toward `total_runs` and the speed mean.
    pub fn aggregate<'a, I>(runs: I) -> Self
    where
        I: IntoIterator<Item = &'a Run>,
    {
        let mut stats = Self::default();
        let mut speed_sum = 0.0;

        for run in runs {
            stats.total_runs += 1;
            stats.total_distance += run.distance().unwrap_or(0.0);
            speed_sum += run.average_speed().unwrap_or(0.0);
        }

        if stats.total_runs > 0 {
            stats.average_speed = speed_sum / f64::from(stats.total_runs);
        }

        stats
    }
}
