// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the learning core.
//!
//! Structural errors (`ParentNotFound`, `DepthExceeded`, `CorruptTree`) are
//! always surfaced and never auto-corrected. `ModuleNotFound` is raised when
//! a producer references a module that no longer exists. `ConcurrencyConflict`
//! means the per-student scope could not be acquired in time; callers may
//! retry. Session errors only concern the tutoring context log.

use thiserror::Error;

use crate::domain::mastery::StudentId;
use crate::domain::module::ModuleId;
use crate::domain::repository::RepositoryError;
use crate::domain::session::SessionId;

#[derive(Debug, Error)]
pub enum MasteryError {
    #[error("Parent module not found: {0}")]
    ParentNotFound(ModuleId),

    #[error("Module tree depth exceeded under parent {parent_id}: depth {depth} is not below the limit of {max_depth} levels")]
    DepthExceeded {
        parent_id: ModuleId,
        depth: u8,
        max_depth: u8,
    },

    #[error("Corrupt module tree at {module_id}: {reason}")]
    CorruptTree { module_id: ModuleId, reason: String },

    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    #[error("Timed out after {waited_ms}ms waiting for exclusive mastery scope of student {student_id}")]
    ConcurrencyConflict { student_id: StudentId, waited_ms: u64 },

    #[error("Invalid mastery signal: {0}")]
    InvalidSignal(String),

    #[error("Learning session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Learning session {0} has already ended")]
    SessionClosed(SessionId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MasteryError {
    pub fn corrupt(module_id: ModuleId, reason: impl Into<String>) -> Self {
        MasteryError::CorruptTree {
            module_id,
            reason: reason.into(),
        }
    }

    /// Structural errors indicate a data-integrity problem in the tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MasteryError::ParentNotFound(_)
                | MasteryError::DepthExceeded { .. }
                | MasteryError::CorruptTree { .. }
        )
    }

    /// Errors a caller may retry without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MasteryError::ConcurrencyConflict { .. })
    }
}
