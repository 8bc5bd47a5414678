// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod metrics;
pub mod run;
pub mod user;

pub use metrics::{CalculationError, HaversineCalculator, RunCalculator};
pub use run::{FinishRun, RunService};
pub use user::UserService;
