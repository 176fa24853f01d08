// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Scholar Core
//!
//! Module trees, the per-student mastery ledger, upward mastery propagation
//! and the learning-profile update pipeline fed by tutoring sessions and
//! released assignment feedback.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services and storage adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
