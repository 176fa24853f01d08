// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, following the DDD Repository
//! pattern: one repository per aggregate, interface defined in the domain
//! layer, implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Key | Implementations |
//! |-------|-----------|-----|-----------------|
//! | `ModuleRepository` | `Module` (+ resources) | module id | `InMemoryModuleRepository`, `PostgresModuleRepository` |
//! | `MasteryRepository` | `MasteryRecord` | (student, module) | `InMemoryMasteryRepository`, `PostgresMasteryRepository` |
//! | `ProfileRepository` | `LearningProfile` | (student, subject) | `InMemoryProfileRepository`, `PostgresProfileRepository` |
//! | `SessionRepository` | `LearningSession` | session id | `InMemorySessionRepository`, `PostgresSessionRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at startup from the `storage`
//! section of `scholar-config.yaml`. In-memory implementations serve
//! development and tests; PostgreSQL implementations serve production.

use async_trait::async_trait;

use crate::domain::mastery::{MasteryRecord, StudentId};
use crate::domain::module::{Module, ModuleId, ModuleResource, PublicationStatus};
use crate::domain::profile::{LearningProfile, ProfileInsight};
use crate::domain::session::{LearningSession, SessionId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Repository for module trees and the resources attached to modules.
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Insert a module or update its attributes. The child list of a stored
    /// module is left as it is; only `insert_child` and `delete_subtree`
    /// change tree structure.
    async fn save(&self, module: &Module) -> Result<(), RepositoryError>;

    /// Store a new child and append it to its stored parent's child list in
    /// one step. Returns the parent as updated; `NotFound` when the parent is
    /// gone.
    async fn insert_child(&self, child: &Module) -> Result<Module, RepositoryError>;

    /// Find module by ID
    async fn find_by_id(&self, id: ModuleId) -> Result<Option<Module>, RepositoryError>;

    /// Find several modules; result follows the order of `ids`, missing ids
    /// are skipped.
    async fn find_many(&self, ids: &[ModuleId]) -> Result<Vec<Module>, RepositoryError>;

    /// All root modules (one per tree)
    async fn find_roots(&self) -> Result<Vec<Module>, RepositoryError>;

    /// Set the publication status of a stored module; `None` if it is gone.
    async fn set_status(&self, id: ModuleId, status: PublicationStatus) -> Result<Option<Module>, RepositoryError>;

    /// Remove `root`, every module whose parent chain leads to it, and their
    /// resources and mastery records, detaching `root` from its parent in the
    /// same unit of work. Either everything is removed or nothing is.
    /// Returns the number of modules removed.
    async fn delete_subtree(&self, root: ModuleId) -> Result<usize, RepositoryError>;

    /// Save a resource attached to a module
    async fn save_resource(&self, resource: &ModuleResource) -> Result<(), RepositoryError>;

    /// Resources of a module ordered by display position
    async fn find_resources(&self, module_id: ModuleId) -> Result<Vec<ModuleResource>, RepositoryError>;
}

/// Repository for the per-(student, module) mastery ledger.
#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// Find the record for one pair; `None` means "never touched".
    async fn find(&self, student_id: &StudentId, module_id: ModuleId) -> Result<Option<MasteryRecord>, RepositoryError>;

    /// Records that exist for `student_id` among `module_ids`.
    async fn find_many(
        &self,
        student_id: &StudentId,
        module_ids: &[ModuleId],
    ) -> Result<Vec<MasteryRecord>, RepositoryError>;

    /// Upsert a record. Fails with `NotFound` when the module no longer
    /// exists, so a write racing a subtree deletion never resurrects it.
    async fn save(&self, record: &MasteryRecord) -> Result<(), RepositoryError>;

    /// Every record of a student
    async fn find_by_student(&self, student_id: &StudentId) -> Result<Vec<MasteryRecord>, RepositoryError>;
}

/// Repository for per-(student, subject) learning profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, student_id: &StudentId, subject: &str) -> Result<Option<LearningProfile>, RepositoryError>;

    /// Append one insight, creating the profile on first use. Concurrent
    /// appends must never lose entries.
    async fn append(
        &self,
        student_id: &StudentId,
        subject: &str,
        insight: ProfileInsight,
    ) -> Result<LearningProfile, RepositoryError>;

    /// Overwrite the informational fields (learning style, pace)
    async fn save(&self, profile: &LearningProfile) -> Result<(), RepositoryError>;

    async fn find_by_student(&self, student_id: &StudentId) -> Result<Vec<LearningProfile>, RepositoryError>;
}

/// Repository for tutoring session logs.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn save(&self, session: &LearningSession) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: SessionId) -> Result<Option<LearningSession>, RepositoryError>;

    /// Sessions of a student that have not ended, most recent first
    async fn find_active(&self, student_id: &StudentId) -> Result<Vec<LearningSession>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
