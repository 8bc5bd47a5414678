// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by concurrent maps.
//!
//! Used for local development and tests. Data lives as long as the process.

use crate::db::{RunStore, StoreError, UserStore};
use crate::models::{Run, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory database. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<Uuid, User>>,
    runs: Arc<DashMap<Uuid, Run>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_runs<F>(&self, keep: F) -> Vec<Run>
    where
        F: Fn(&Run) -> bool,
    {
        let mut runs: Vec<Run> = self
            .runs
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        runs.sort_by(|a, b| a.start.at.cmp(&b.start.at).then_with(|| a.id.cmp(&b.id)));
        runs
    }
}

#[async_trait]
impl RunStore for MemoryDb {
    async fn set_run(&self, run: &Run) -> Result<(), StoreError> {
        if !run.is_finished() {
            self.runs.insert(run.id, run.clone());
            return Ok(());
        }

        // The entry guard holds the shard lock across check and write.
        let mut stored = self
            .runs
            .get_mut(&run.id)
            .ok_or_else(|| StoreError::Conflict(format!("run {} is not stored", run.id)))?;
        if stored.is_finished() {
            return Err(StoreError::Conflict(format!(
                "run {} is already finished",
                run.id
            )));
        }
        *stored = run.clone();
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.get(&run_id).map(|entry| entry.value().clone()))
    }

    async fn get_runs_for_user(&self, user_id: Uuid) -> Result<Vec<Run>, StoreError> {
        Ok(self.collect_runs(|run| run.user_id == user_id))
    }

    async fn get_runs_for_user_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Run>, StoreError> {
        Ok(self.collect_runs(|run| {
            run.user_id == user_id && run.start.at >= from && run.start.at <= to
        }))
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then_with(|| a.first_name.cmp(&b.first_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(users)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.remove(&user_id).is_some())
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(&user_id))
    }
}
