// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on the storage backend
//! configuration. The domain layer only defines the traits; this module picks
//! the infrastructure implementations.
//!
//! The in-memory module and mastery repositories are built together: subtree
//! deletion cascades into the mastery map they share, and mastery writes are
//! checked against the module map.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Select repository implementations for the configured backend

use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::repository::{
    MasteryRepository, ModuleRepository, ProfileRepository, RepositoryError, SessionRepository, StorageBackend,
};
use crate::infrastructure::repositories::{
    InMemoryModuleRepository, InMemoryProfileRepository, InMemorySessionRepository,
    PostgresMasteryRepository, PostgresModuleRepository, PostgresProfileRepository, PostgresSessionRepository,
};

/// One repository per aggregate, ready to hand to the services.
#[derive(Clone)]
pub struct Repositories {
    pub modules: Arc<dyn ModuleRepository>,
    pub mastery: Arc<dyn MasteryRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let modules = InMemoryModuleRepository::new();
        Self {
            mastery: Arc::new(modules.mastery()),
            modules: Arc::new(modules),
            profiles: Arc::new(InMemoryProfileRepository::new()),
            sessions: Arc::new(InMemorySessionRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            modules: Arc::new(PostgresModuleRepository::new(pool.clone())),
            mastery: Arc::new(PostgresMasteryRepository::new(pool.clone())),
            profiles: Arc::new(PostgresProfileRepository::new(pool.clone())),
            sessions: Arc::new(PostgresSessionRepository::new(pool)),
        }
    }
}

/// Creates the repository set for the configured backend. A PostgreSQL
/// backend needs a connected pool.
pub fn create_repositories(backend: &StorageBackend, pool: Option<PgPool>) -> Result<Repositories, RepositoryError> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(Repositories::in_memory()),
        (StorageBackend::PostgreSQL(_), Some(pool)) => Ok(Repositories::postgres(pool)),
        (StorageBackend::PostgreSQL(_), None) => Err(RepositoryError::Database(
            "PostgreSQL backend configured but no connection pool was provided".to_string(),
        )),
    }
}
