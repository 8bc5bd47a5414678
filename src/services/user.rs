// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile service.

use crate::db::UserStore;
use crate::error::{AppError, Result};
use crate::models::{User, UserProfile};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// CRUD over user profiles.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn create_user(&self, profile: UserProfile) -> Result<User> {
        let started = Instant::now();
        let user = User::new(profile);

        self.users.upsert_user(&user).await.map_err(|e| {
            AppError::Persistence(format!(
                "Failed to save user with firstName {} and lastName {}: {}",
                user.first_name, user.last_name, e
            ))
        })?;

        tracing::info!(
            user_id = %user.id,
            duration_ms = started.elapsed().as_millis() as u64,
            "User saved"
        );
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.users
            .get_user(user_id)
            .await
            .map_err(|e| {
                AppError::Persistence(format!("Failed to find user with id {}: {}", user_id, e))
            })?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.list_users().await.map_err(|e| {
            AppError::Persistence(format!("Error finding all users: {}", e))
        })?;
        tracing::debug!(count = users.len(), "Found users");
        Ok(users)
    }

    /// Replace the editable fields of an existing user.
    pub async fn update_user(&self, user_id: Uuid, profile: UserProfile) -> Result<User> {
        let existing = self.get_user(user_id).await?;
        let user = User::with_id(existing.id, profile);

        self.users.upsert_user(&user).await.map_err(|e| {
            AppError::Persistence(format!("Failed to update user with id {}: {}", user_id, e))
        })?;

        tracing::info!(%user_id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let deleted = self.users.delete_user(user_id).await.map_err(|e| {
            AppError::Persistence(format!("Failed to delete user with id {}: {}", user_id, e))
        })?;

        if !deleted {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        tracing::info!(%user_id, "User deleted");
        Ok(())
    }
}
