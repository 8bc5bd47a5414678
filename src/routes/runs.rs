// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run endpoints: start, finish, list and statistics.

use crate::error::Result;
use crate::models::{Checkpoint, Measurement, Run, UserStatistics};
use crate::routes::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::services::FinishRun;
use crate::time_utils::{serde_datetime, serde_datetime_opt};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/runs", post(start_run).get(list_runs))
        .route("/api/runs/statistics", get(get_statistics))
        .route("/api/runs/{id}/finish", put(finish_run))
}

// ─── Requests ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StartRunRequest {
    pub user_id: Uuid,
    #[validate(range(min = -90.0, max = 90.0, message = "startLatitude must be between -90 and 90"))]
    pub start_latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "startLongitude must be between -180 and 180"
    ))]
    pub start_longitude: f64,
    #[serde(with = "serde_datetime")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_datetime: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FinishRunRequest {
    #[validate(range(min = -90.0, max = 90.0, message = "finishLatitude must be between -90 and 90"))]
    pub finish_latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "finishLongitude must be between -180 and 180"
    ))]
    pub finish_longitude: f64,
    #[serde(with = "serde_datetime")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub finish_datetime: DateTime<Utc>,
    /// Distance in meters measured by the client; computed when absent
    #[serde(default)]
    #[validate(range(min = 0.0, message = "distance must not be negative"))]
    pub distance: Option<f64>,
}

/// Query for listing runs and statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWindowQuery {
    pub user_id: Uuid,
    #[serde(default, with = "serde_datetime_opt")]
    pub from_datetime: Option<DateTime<Utc>>,
    #[serde(default, with = "serde_datetime_opt")]
    pub to_datetime: Option<DateTime<Utc>>,
}

// ─── Responses ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StartRunResponse {
    pub id: Uuid,
    pub start_latitude: f64,
    pub start_longitude: f64,
    #[serde(with = "serde_datetime")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_datetime: DateTime<Utc>,
}

impl From<&Run> for StartRunResponse {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            start_latitude: run.start.latitude,
            start_longitude: run.start.longitude,
            start_datetime: run.start.at,
        }
    }
}

/// A run as returned by the API. Finish fields are null while in progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RunResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_latitude: f64,
    pub start_longitude: f64,
    #[serde(with = "serde_datetime")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_datetime: DateTime<Utc>,
    pub finish_latitude: Option<f64>,
    pub finish_longitude: Option<f64>,
    #[serde(with = "serde_datetime_opt")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub finish_datetime: Option<DateTime<Utc>>,
    pub distance: Option<Measurement>,
    pub average_speed: Option<Measurement>,
}

impl From<&Run> for RunResponse {
    fn from(run: &Run) -> Self {
        let finish = run.finish();
        Self {
            id: run.id,
            user_id: run.user_id,
            start_latitude: run.start.latitude,
            start_longitude: run.start.longitude,
            start_datetime: run.start.at,
            finish_latitude: finish.map(|f| f.latitude),
            finish_longitude: finish.map(|f| f.longitude),
            finish_datetime: finish.map(|f| f.at),
            distance: run.distance().map(Measurement::meters),
            average_speed: run.average_speed().map(Measurement::kilometers_per_hour),
        }
    }
}

// ─── Handlers ────────────────────────────────────────────────

async fn start_run(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>)> {
    let start = Checkpoint {
        latitude: request.start_latitude,
        longitude: request.start_longitude,
        at: request.start_datetime,
    };
    let run = state.runs.start_run(request.user_id, start).await?;

    Ok((StatusCode::CREATED, Json(StartRunResponse::from(&run))))
}

async fn finish_run(
    State(state): State<Arc<AppState>>,
    ApiPath(run_id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<FinishRunRequest>,
) -> Result<Json<RunResponse>> {
    let finish = FinishRun {
        finish: Checkpoint {
            latitude: request.finish_latitude,
            longitude: request.finish_longitude,
            at: request.finish_datetime,
        },
        distance: request.distance,
    };
    let run = state.runs.finish_run(run_id, finish).await?;

    Ok(Json(RunResponse::from(&run)))
}

async fn list_runs(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RunWindowQuery>,
) -> Result<Json<Vec<RunResponse>>> {
    let runs = state
        .runs
        .list_runs(query.user_id, query.from_datetime, query.to_datetime)
        .await?;

    Ok(Json(runs.iter().map(RunResponse::from).collect()))
}

async fn get_statistics(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RunWindowQuery>,
) -> Result<Json<UserStatistics>> {
    let stats = state
        .runs
        .user_statistics(query.user_id, query.from_datetime, query.to_datetime)
        .await?;

    Ok(Json(stats))
}
