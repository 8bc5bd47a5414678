// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run lifecycle service.
//!
//! Handles the core workflow:
//! 1. Start a run for an existing user
//! 2. Finish it, computing distance and average speed exactly once
//! 3. List a user's runs and fold them into statistics over a time window

use crate::db::{RunStore, StoreError, UserStore};
use crate::error::{AppError, Result};
use crate::models::{Checkpoint, Run, RunState, UserStatistics};
use crate::services::metrics::{HaversineCalculator, RunCalculator};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Finish snapshot supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FinishRun {
    pub finish: Checkpoint,
    /// Caller-measured distance in meters; skips the distance calculation.
    pub distance: Option<f64>,
}

/// Owns run state transitions and the queries over a user's runs.
#[derive(Clone)]
pub struct RunService {
    runs: Arc<dyn RunStore>,
    users: Arc<dyn UserStore>,
    calculator: Arc<dyn RunCalculator>,
}

impl RunService {
    pub fn new(runs: Arc<dyn RunStore>, users: Arc<dyn UserStore>) -> Self {
        Self::with_calculator(runs, users, Arc::new(HaversineCalculator))
    }

    pub fn with_calculator(
        runs: Arc<dyn RunStore>,
        users: Arc<dyn UserStore>,
        calculator: Arc<dyn RunCalculator>,
    ) -> Self {
        Self {
            runs,
            users,
            calculator,
        }
    }

    /// Start a run for `user_id`.
    ///
    /// Fails with `NotFound` (and stores nothing) if the user does not exist.
    pub async fn start_run(&self, user_id: Uuid, start: Checkpoint) -> Result<Run> {
        let started = Instant::now();
        let result = self.start_run_inner(user_id, start).await;
        tracing::info!(
            %user_id,
            ok = result.is_ok(),
            duration_ms = elapsed_ms(started),
            "Start run finished"
        );
        result
    }

    async fn start_run_inner(&self, user_id: Uuid, start: Checkpoint) -> Result<Run> {
        let exists = self
            .users
            .user_exists(user_id)
            .await
            .map_err(|e| store_error(format!("Failed to look up user {}", user_id), e))?;
        if !exists {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        let run = Run::start(user_id, start);
        self.runs
            .set_run(&run)
            .await
            .map_err(|e| store_error(format!("Failed to save run for user {}", user_id), e))?;

        tracing::info!(run_id = %run.id, %user_id, "Run created");
        Ok(run)
    }

    /// Finish a started run.
    ///
    /// The distance is the supplied one if present, otherwise the great-circle
    /// distance between start and finish. Finishing a run twice is a conflict.
    pub async fn finish_run(&self, run_id: Uuid, request: FinishRun) -> Result<Run> {
        let started = Instant::now();
        let result = self.finish_run_inner(run_id, request).await;
        tracing::info!(
            %run_id,
            ok = result.is_ok(),
            duration_ms = elapsed_ms(started),
            "Finish run finished"
        );
        result
    }

    async fn finish_run_inner(&self, run_id: Uuid, request: FinishRun) -> Result<Run> {
        let mut run = self
            .runs
            .get_run(run_id)
            .await
            .map_err(|e| store_error(format!("Failed to load run {}", run_id), e))?
            .ok_or_else(|| AppError::NotFound(format!("Run with id {} does not exist", run_id)))?;

        if run.is_finished() {
            return Err(AppError::Conflict(format!(
                "Run with id {} is already finished",
                run_id
            )));
        }

        let finish = request.finish;
        if finish.at < run.start.at {
            return Err(AppError::Validation(format!(
                "Finish time {} is before start time {} for run {}",
                finish.at, run.start.at, run_id
            )));
        }

        let distance = match request.distance {
            Some(distance) if !distance.is_finite() || distance < 0.0 => {
                return Err(AppError::Validation(format!(
                    "Distance must be a non-negative number, got {}",
                    distance
                )));
            }
            Some(distance) => distance,
            None => self.calculator.distance(
                run.start.latitude,
                run.start.longitude,
                finish.latitude,
                finish.longitude,
            )?,
        };
        let average_speed = self
            .calculator
            .average_speed(distance, run.start.at, finish.at)?;

        run.state = RunState::Finished {
            finish,
            distance,
            average_speed,
        };

        self.runs
            .set_run(&run)
            .await
            .map_err(|e| store_error(format!("Failed to save finished run {}", run_id), e))?;

        tracing::info!(
            %run_id,
            user_id = %run.user_id,
            distance_meters = distance,
            average_speed_kmh = average_speed,
            "Run finished"
        );
        Ok(run)
    }

    /// List a user's runs, optionally restricted to a start-time window.
    pub async fn list_runs(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Run>> {
        let started = Instant::now();
        let result = self.find_runs(user_id, from, to).await;
        tracing::info!(
            %user_id,
            count = result.as_ref().map(Vec::len).unwrap_or(0),
            duration_ms = elapsed_ms(started),
            "List runs finished"
        );
        result
    }

    /// Aggregate statistics over a user's runs in the window.
    pub async fn user_statistics(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<UserStatistics> {
        let started = Instant::now();
        let result = self
            .find_runs(user_id, from, to)
            .await
            .map(|runs| UserStatistics::aggregate(&runs));
        tracing::info!(
            %user_id,
            ok = result.is_ok(),
            duration_ms = elapsed_ms(started),
            "User statistics finished"
        );
        result
    }

    async fn find_runs(
        &self,
        user_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Run>> {
        let runs = match resolve_window(from, to, Utc::now()) {
            None => self.runs.get_runs_for_user(user_id).await,
            Some((from, to)) => self.runs.get_runs_for_user_between(user_id, from, to).await,
        }
        .map_err(|e| store_error(format!("Failed to load runs for user {}", user_id), e))?;

        tracing::debug!(%user_id, count = runs.len(), "Found runs");
        Ok(runs)
    }
}

/// Resolve the query window.
///
/// Without a lower bound there is no window (the upper bound is ignored).
/// A lower bound without an upper bound extends to `now`.
pub fn resolve_window(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    from.map(|from| (from, to.unwrap_or(now)))
}

fn store_error(context: String, err: StoreError) -> AppError {
    match err {
        StoreError::Conflict(reason) => AppError::Conflict(format!("{}: {}", context, reason)),
        other => AppError::Persistence(format!("{}: {}", context, other)),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FirestoreDb, MemoryDb};
    use crate::models::{User, UserProfile};
    use crate::services::metrics::CalculationError;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn checkpoint(latitude: f64, longitude: f64, when: DateTime<Utc>) -> Checkpoint {
        Checkpoint {
            latitude,
            longitude,
            at: when,
        }
    }

    async fn service_with_user() -> (RunService, MemoryDb, Uuid) {
        let db = MemoryDb::new();
        let user = User::new(UserProfile {
            first_name: "Jon".to_string(),
            last_name: "Smith".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1999, 10, 1).unwrap(),
            sex: "male".to_string(),
        });
        db.upsert_user(&user).await.unwrap();
        let service = RunService::new(Arc::new(db.clone()), Arc::new(db.clone()));
        (service, db, user.id)
    }

    /// Calculator that counts calls and returns fixed values.
    #[derive(Default)]
    struct CountingCalculator {
        distance_calls: AtomicUsize,
        speed_calls: AtomicUsize,
    }

    impl RunCalculator for CountingCalculator {
        fn distance(
            &self,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
        ) -> std::result::Result<f64, CalculationError> {
            self.distance_calls.fetch_add(1, Ordering::SeqCst);
            Ok(120.0)
        }

        fn average_speed(
            &self,
            _: f64,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> std::result::Result<f64, CalculationError> {
            self.speed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(10.0)
        }
    }

    /// Calculator whose distance computation always fails.
    struct FailingCalculator;

    impl RunCalculator for FailingCalculator {
        fn distance(
            &self,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
        ) -> std::result::Result<f64, CalculationError> {
            Err(CalculationError::NonFiniteResult)
        }

        fn average_speed(
            &self,
            _: f64,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> std::result::Result<f64, CalculationError> {
            Ok(0.0)
        }
    }

    /// Run store that records the window it was asked for.
    #[derive(Default)]
    struct RecordingStore {
        windows: Mutex<Vec<Option<(DateTime<Utc>, DateTime<Utc>)>>>,
    }

    #[async_trait]
    impl RunStore for RecordingStore {
        async fn set_run(&self, _: &Run) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn get_run(&self, _: Uuid) -> std::result::Result<Option<Run>, StoreError> {
            Ok(None)
        }

        async fn get_runs_for_user(&self, _: Uuid) -> std::result::Result<Vec<Run>, StoreError> {
            self.windows.lock().unwrap().push(None);
            Ok(vec![])
        }

        async fn get_runs_for_user_between(
            &self,
            _: Uuid,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> std::result::Result<Vec<Run>, StoreError> {
            self.windows.lock().unwrap().push(Some((from, to)));
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_start_run_creates_started_run() {
        let (service, db, user_id) = service_with_user().await;

        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();

        assert_eq!(run.user_id, user_id);
        assert_eq!(run.state, RunState::Started);
        assert_eq!(db.get_run(run.id).await.unwrap(), Some(run));
    }

    #[tokio::test]
    async fn test_start_run_unknown_user_persists_nothing() {
        let (service, db, _) = service_with_user().await;
        let stranger = Uuid::new_v4();

        let err = service
            .start_run(stranger, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(db.get_runs_for_user(stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_run_store_failure_is_persistence_error() {
        let offline = Arc::new(FirestoreDb::new_mock());
        let service = RunService::new(offline.clone(), offline);

        let err = service
            .start_run(Uuid::new_v4(), checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_finish_run_computes_metrics() {
        let (service, db, user_id) = service_with_user().await;
        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();

        let finished = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(42.0, -72.0, at(8)),
                    distance: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(finished.distance(), Some(278_598.01));
        assert_eq!(finished.average_speed(), Some(278.6));
        assert_eq!(finished.finish(), Some(&checkpoint(42.0, -72.0, at(8))));
        assert_eq!(db.get_run(run.id).await.unwrap(), Some(finished));
    }

    #[tokio::test]
    async fn test_finish_with_supplied_distance_skips_calculator() {
        let (_, db, user_id) = service_with_user().await;
        let calculator = Arc::new(CountingCalculator::default());
        let service = RunService::with_calculator(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            calculator.clone(),
        );

        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();
        let finished = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(12.234, 13.3423, at(8)),
                    distance: Some(100.0),
                },
            )
            .await
            .unwrap();

        assert_eq!(finished.distance(), Some(100.0));
        assert_eq!(calculator.distance_calls.load(Ordering::SeqCst), 0);
        assert_eq!(calculator.speed_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_without_distance_uses_calculator() {
        let (_, db, user_id) = service_with_user().await;
        let calculator = Arc::new(CountingCalculator::default());
        let service = RunService::with_calculator(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            calculator.clone(),
        );

        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();
        let finished = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(12.234, 13.3423, at(8)),
                    distance: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(finished.distance(), Some(120.0));
        assert_eq!(finished.average_speed(), Some(10.0));
        assert_eq!(calculator.distance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_calculation_failure_leaves_run_started() {
        let (_, db, user_id) = service_with_user().await;
        let service = RunService::with_calculator(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(FailingCalculator),
        );

        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();
        let err = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(42.0, -72.0, at(8)),
                    distance: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Calculation(CalculationError::NonFiniteResult)
        ));
        assert_eq!(db.get_run(run.id).await.unwrap(), Some(run));
    }

    #[tokio::test]
    async fn test_finish_unknown_run_is_not_found() {
        let (service, _, _) = service_with_user().await;

        let err = service
            .finish_run(
                Uuid::new_v4(),
                FinishRun {
                    finish: checkpoint(42.0, -72.0, at(8)),
                    distance: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_finish_twice_is_conflict() {
        let (service, db, user_id) = service_with_user().await;
        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();
        let request = FinishRun {
            finish: checkpoint(42.0, -72.0, at(8)),
            distance: None,
        };

        let first = service.finish_run(run.id, request).await.unwrap();
        let err = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(0.0, 0.0, at(9)),
                    distance: Some(1.0),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(db.get_run(run.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_finish_before_start_is_rejected() {
        let (service, db, user_id) = service_with_user().await;
        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(8)))
            .await
            .unwrap();

        let err = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(42.0, -72.0, at(7)),
                    distance: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(!db.get_run(run.id).await.unwrap().unwrap().is_finished());
    }

    #[tokio::test]
    async fn test_finish_rejects_negative_supplied_distance() {
        let (service, _, user_id) = service_with_user().await;
        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();

        let err = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(42.0, -72.0, at(8)),
                    distance: Some(-5.0),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_finish_zero_duration_has_zero_speed() {
        let (service, _, user_id) = service_with_user().await;
        let run = service
            .start_run(user_id, checkpoint(40.0, -70.0, at(7)))
            .await
            .unwrap();

        let finished = service
            .finish_run(
                run.id,
                FinishRun {
                    finish: checkpoint(40.0, -70.0, at(7)),
                    distance: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(finished.distance(), Some(0.0));
        assert_eq!(finished.average_speed(), Some(0.0));
    }

    #[tokio::test]
    async fn test_list_with_only_lower_bound_uses_now() {
        let store = Arc::new(RecordingStore::default());
        let users = Arc::new(MemoryDb::new());
        let service = RunService::new(store.clone(), users);
        let from = Utc::now() - Duration::days(7);

        let before = Utc::now();
        service.list_runs(Uuid::new_v4(), Some(from), None).await.unwrap();
        let after = Utc::now();

        let windows = store.windows.lock().unwrap().clone();
        assert_eq!(windows.len(), 1);
        let (seen_from, seen_to) = windows[0].expect("range query expected");
        assert_eq!(seen_from, from);
        assert!(seen_to >= before && seen_to <= after);
    }

    #[tokio::test]
    async fn test_list_without_lower_bound_ignores_upper_bound() {
        let store = Arc::new(RecordingStore::default());
        let service = RunService::new(store.clone(), Arc::new(MemoryDb::new()));

        service
            .list_runs(Uuid::new_v4(), None, Some(Utc::now()))
            .await
            .unwrap();
        service
            .user_statistics(Uuid::new_v4(), None, Some(Utc::now()))
            .await
            .unwrap();

        assert_eq!(*store.windows.lock().unwrap(), vec![None, None]);
    }

    #[tokio::test]
    async fn test_statistics_with_only_lower_bound_uses_now() {
        let store = Arc::new(RecordingStore::default());
        let service = RunService::new(store.clone(), Arc::new(MemoryDb::new()));
        let from = Utc::now() - Duration::days(1);

        let before = Utc::now();
        let stats = service
            .user_statistics(Uuid::new_v4(), Some(from), None)
            .await
            .unwrap();
        let after = Utc::now();

        assert_eq!(stats, UserStatistics::default());
        let windows = store.windows.lock().unwrap().clone();
        let (_, seen_to) = windows[0].expect("range query expected");
        assert!(seen_to >= before && seen_to <= after);
    }

    #[tokio::test]
    async fn test_statistics_over_window() {
        let (service, _, user_id) = service_with_user().await;

        for (start_hour, distance) in [(6, 1000.0), (8, 3000.0), (12, 9000.0)] {
            let run = service
                .start_run(user_id, checkpoint(40.0, -70.0, at(start_hour)))
                .await
                .unwrap();
            service
                .finish_run(
                    run.id,
                    FinishRun {
                        finish: checkpoint(40.0, -70.0, at(start_hour + 1)),
                        distance: Some(distance),
                    },
                )
                .await
                .unwrap();
        }
        // Started but never finished: counts as zero
        service
            .start_run(user_id, checkpoint(40.0, -70.0, at(9)))
            .await
            .unwrap();

        let stats = service
            .user_statistics(user_id, Some(at(8)), Some(at(10)))
            .await
            .unwrap();
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.total_distance, 3000.0);
        assert_eq!(stats.average_speed, 1.5);

        let all = service.user_statistics(user_id, None, None).await.unwrap();
        assert_eq!(all.total_runs, 4);
        assert_eq!(all.total_distance, 13_000.0);
        assert_eq!(all.average_speed, (1.0 + 3.0 + 9.0) / 4.0);
    }

    #[test]
    fn test_resolve_window() {
        let now = at(12);
        assert_eq!(resolve_window(None, None, now), None);
        assert_eq!(resolve_window(None, Some(at(9)), now), None);
        assert_eq!(resolve_window(Some(at(7)), None, now), Some((at(7), now)));
        assert_eq!(
            resolve_window(Some(at(7)), Some(at(9)), now),
            Some((at(7), at(9)))
        );
    }
}
