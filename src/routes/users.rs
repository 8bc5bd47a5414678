// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User CRUD endpoints.

use crate::error::Result;
use crate::models::{User, UserProfile};
use crate::routes::extract::{not_blank, ApiPath, ValidatedJson};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", post(create_user).get(list_users))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// Body for creating or replacing a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserRequest {
    #[validate(custom(function = "not_blank", message = "firstName must not be blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank", message = "lastName must not be blank"))]
    pub last_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub birth_date: NaiveDate,
    #[validate(custom(function = "not_blank", message = "sex must not be blank"))]
    pub sex: String,
}

impl From<UserRequest> for UserProfile {
    fn from(request: UserRequest) -> Self {
        Self {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            birth_date: request.birth_date,
            sex: request.sex.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub birth_date: NaiveDate,
    pub sex: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            birth_date: user.birth_date,
            sex: user.sex,
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteUserResponse {
    pub message: String,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state.users.create_user(request.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserResponse>>> {
    let users = state.users.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<UserResponse>> {
    let user = state.users.get_user(user_id).await?;
    Ok(Json(user.into()))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<UserRequest>,
) -> Result<Json<UserResponse>> {
    let user = state.users.update_user(user_id, request.into()).await?;
    Ok(Json(user.into()))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<DeleteUserResponse>> {
    state.users.delete_user(user_id).await?;
    Ok(Json(DeleteUserResponse {
        message: format!("User with id {} successfully deleted", user_id),
    }))
}
