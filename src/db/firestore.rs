// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage)
//! - Runs (flat [`RunDocument`] records keyed by run id)

use crate::db::collections;
use crate::db::document::RunDocument;
use crate::db::{RunStore, StoreError, UserStore};
use crate::models::{Run, User};
use crate::time_utils::format_sortable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore Emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// Every operation fails with [`StoreError::Offline`].
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or(StoreError::Offline)
    }

    fn into_runs(documents: Vec<RunDocument>) -> Result<Vec<Run>, StoreError> {
        documents.into_iter().map(Run::try_from).collect()
    }
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl RunStore for FirestoreDb {
    async fn set_run(&self, run: &Run) -> Result<(), StoreError> {
        let client = self.get_client()?;
        let document = RunDocument::from(run);

        if !run.is_finished() {
            let _: () = client
                .fluent()
                .update()
                .in_col(collections::RUNS)
                .document_id(&document.id)
                .object(&document)
                .execute()
                .await
                .map_err(backend)?;
            return Ok(());
        }

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        // Reading through the transaction makes a concurrent finisher of the
        // same run conflict at commit.
        let current: Option<RunDocument> = client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::RUNS)
            .obj()
            .one(&document.id)
            .await
            .map_err(|e| {
                StoreError::Backend(format!("Failed to read run in transaction: {}", e))
            })?;

        let still_started = matches!(&current, Some(stored) if stored.finish_datetime.is_none());
        if !still_started {
            let _ = transaction.rollback().await;
            return Err(StoreError::Conflict(format!(
                "run {} is missing or already finished",
                run.id
            )));
        }

        client
            .fluent()
            .update()
            .in_col(collections::RUNS)
            .document_id(&document.id)
            .object(&document)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                StoreError::Backend(format!("Failed to add run to transaction: {}", e))
            })?;

        transaction.commit().await.map_err(|e| match e {
            err @ firestore::errors::FirestoreError::DataConflictError(_) => StoreError::Conflict(
                format!("run {} was finished concurrently: {}", run.id, err),
            ),
            other => StoreError::Backend(format!("Transaction commit failed: {}", other)),
        })?;

        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, StoreError> {
        let document: Option<RunDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RUNS)
            .obj()
            .one(&run_id.to_string())
            .await
            .map_err(backend)?;

        document.map(Run::try_from).transpose()
    }

    async fn get_runs_for_user(&self, user_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let user_id = user_id.to_string();
        let documents: Vec<RunDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RUNS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([(
                "start_datetime",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(backend)?;

        Self::into_runs(documents)
    }

    async fn get_runs_for_user_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Run>, StoreError> {
        let user_id = user_id.to_string();
        let from = format_sortable(from);
        let to = format_sortable(to);

        let documents: Vec<RunDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RUNS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("start_datetime").greater_than_or_equal(from.clone()),
                    q.field("start_datetime").less_than_or_equal(to.clone()),
                ])
            })
            .order_by([(
                "start_datetime",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(backend)?;

        Self::into_runs(documents)
    }
}

#[async_trait]
impl UserStore for FirestoreDb {
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(backend)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(backend)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        if self.get_user(user_id).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(user_id.to_string())
            .execute()
            .await
            .map_err(backend)?;

        tracing::debug!(%user_id, "Deleted user profile");
        Ok(true)
    }
}
