// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod run;
pub mod stats;
pub mod user;

pub use run::{Checkpoint, Measurement, Run, RunState};
pub use stats::UserStatistics;
pub use user::{User, UserProfile};
