// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Entities, value types, events and repository contracts for the learning
//! core.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure model; no storage or runtime dependencies

pub mod module;
pub mod mastery;
pub mod profile;
pub mod session;
pub mod signal;
pub mod events;
pub mod error;
pub mod repository;
pub mod config;
