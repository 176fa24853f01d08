// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning Session Application Service
//!
//! Bounded logs of tutoring turns for one `(student, module)` pair. The
//! tutoring agent reads the recent chat turns as context; assessment
//! outcomes are appended by the update pipeline.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::error::MasteryError;
use crate::domain::mastery::StudentId;
use crate::domain::module::ModuleId;
use crate::domain::repository::SessionRepository;
use crate::domain::session::{ChatRole, LearningSession, SessionEntry, SessionId};

/// Chat turns the tutoring agent receives as history.
pub const AGENT_HISTORY_TURNS: usize = 10;

#[derive(Clone)]
pub struct LearningSessionService {
    repository: Arc<dyn SessionRepository>,
    max_entries: usize,
}

impl LearningSessionService {
    pub fn new(repository: Arc<dyn SessionRepository>, max_entries: usize) -> Self {
        Self {
            repository,
            max_entries,
        }
    }

    pub async fn start(&self, student_id: StudentId, module_id: ModuleId) -> Result<LearningSession, MasteryError> {
        let session = LearningSession::new(student_id, module_id, self.max_entries);
        self.repository.save(&session).await?;
        info!(session_id = %session.id, student_id = %session.student_id, module_id = %module_id, "Started learning session");
        Ok(session)
    }

    pub async fn get(&self, id: SessionId) -> Result<LearningSession, MasteryError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(MasteryError::SessionNotFound(id))
    }

    /// Append an entry to an active session. Returns how many old entries
    /// were dropped to stay within the bound.
    pub async fn append(&self, id: SessionId, entry: SessionEntry) -> Result<usize, MasteryError> {
        let mut session = self.get(id).await?;
        if !session.is_active() {
            return Err(MasteryError::SessionClosed(id));
        }
        let evicted = session.push(entry);
        self.repository.save(&session).await?;
        if evicted > 0 {
            debug!(session_id = %id, evicted, "Session log at capacity, dropped oldest entries");
        }
        Ok(evicted)
    }

    pub async fn append_chat(&self, id: SessionId, role: ChatRole, content: impl Into<String>) -> Result<usize, MasteryError> {
        self.append(
            id,
            SessionEntry::ChatTurn {
                role,
                content: content.into(),
                at: Utc::now(),
            },
        )
        .await
    }

    /// The last `n` chat turns, oldest first.
    pub async fn recent(&self, id: SessionId, n: usize) -> Result<Vec<SessionEntry>, MasteryError> {
        Ok(self.get(id).await?.recent_chat(n))
    }

    pub async fn end(&self, id: SessionId) -> Result<LearningSession, MasteryError> {
        let mut session = self.get(id).await?;
        session.end();
        self.repository.save(&session).await?;
        info!(session_id = %id, entries = session.len(), "Ended learning session");
        Ok(session)
    }

    pub async fn active_for(&self, student_id: &StudentId) -> Result<Vec<LearningSession>, MasteryError> {
        Ok(self.repository.find_active(student_id).await?)
    }
}
