//! Database layer.
//!
//! The run and user services depend only on the [`RunStore`] and
//! [`UserStore`] traits. Two backends implement both: an in-process
//! [`MemoryDb`] and [`FirestoreDb`].

pub mod document;
pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::models::{Run, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const RUNS: &str = "runs";
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database not connected (offline mode)")]
    Offline,

    /// A conditional write lost against the stored state.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Database error: {0}")]
    Backend(String),
}

/// Persistence contract for runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Store a run.
    ///
    /// A `Started` run is inserted (or replaced). A `Finished` run only
    /// replaces a stored run that is still `Started`; anything else is a
    /// [`StoreError::Conflict`].
    async fn set_run(&self, run: &Run) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, StoreError>;

    /// All runs owned by a user, oldest start first.
    async fn get_runs_for_user(&self, user_id: Uuid) -> Result<Vec<Run>, StoreError>;

    /// Runs owned by a user whose start time lies in `[from, to]`, oldest first.
    async fn get_runs_for_user_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Run>, StoreError>;
}

/// Persistence contract for users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Delete a user. Returns `false` if there was nothing to delete.
    async fn delete_user(&self, user_id: Uuid) -> Result<bool, StoreError>;

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.get_user(user_id).await?.is_some())
    }
}
