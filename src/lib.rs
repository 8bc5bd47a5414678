// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Running Tracker: record runs and summarize them per user
//!
//! This crate provides the backend API for starting and finishing runs,
//! computing distance and average speed, and aggregating per-user
//! statistics over a time window.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::{Config, StorageBackend};
use db::{FirestoreDb, MemoryDb, RunStore, StoreError, UserStore};
use services::{RunService, UserService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub runs: RunService,
    pub users: UserService,
}

impl AppState {
    /// Build state around a store that holds both runs and users.
    pub fn with_store<S>(config: Config, store: S) -> Self
    where
        S: RunStore + UserStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            config,
            runs: RunService::new(store.clone(), store.clone()),
            users: UserService::new(store),
        }
    }

    /// Connect the store selected by `config`.
    pub async fn connect(config: Config) -> Result<Self, StoreError> {
        match config.storage_backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::with_store(config, MemoryDb::new()))
            }
            StorageBackend::Firestore => {
                let project_id = config.gcp_project_id.clone().unwrap_or_default();
                let db = FirestoreDb::new(&project_id).await?;
                Ok(Self::with_store(config, db))
            }
        }
    }
}
