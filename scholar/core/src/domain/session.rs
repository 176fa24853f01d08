// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning sessions
//!
//! One tutoring session for a `(student, module)` pair: a bounded log of chat
//! turns, assessment outcomes and writing analyses. Once the log is full the
//! oldest entries are dropped.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::mastery::StudentId;
use crate::domain::module::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    Student,
    Tutor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEntry {
    ChatTurn {
        role: ChatRole,
        content: String,
        at: DateTime<Utc>,
    },
    AssessmentOutcome {
        concept: String,
        mastery_delta: f64,
        new_score: u8,
        at: DateTime<Utc>,
    },
    WritingAnalysis {
        summary: String,
        #[serde(default)]
        score: Option<f64>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: SessionId,
    pub student_id: StudentId,
    pub module_id: ModuleId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    max_entries: usize,
    entries: VecDeque<SessionEntry>,
}

impl LearningSession {
    pub fn new(student_id: StudentId, module_id: ModuleId, max_entries: usize) -> Self {
        Self {
            id: SessionId::new(),
            student_id,
            module_id,
            started_at: Utc::now(),
            ended_at: None,
            max_entries: max_entries.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SessionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Append an entry, evicting the oldest past the bound. Returns how many
    /// entries were evicted.
    pub fn push(&mut self, entry: SessionEntry) -> usize {
        self.entries.push_back(entry);
        let mut evicted = 0;
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// The last `n` chat turns, oldest first.
    pub fn recent_chat(&self, n: usize) -> Vec<SessionEntry> {
        let mut turns: Vec<SessionEntry> = self
            .entries
            .iter()
            .rev()
            .filter(|e| matches!(e, SessionEntry::ChatTurn { .. }))
            .take(n)
            .cloned()
            .collect();
        turns.reverse();
        turns
    }

    pub fn end(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(content: &str) -> SessionEntry {
        SessionEntry::ChatTurn {
            role: ChatRole::Student,
            content: content.to_string(),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_log_is_bounded() {
        let mut session = LearningSession::new(StudentId::from("s"), ModuleId::new(), 3);
        assert_eq!(session.push(chat("1")), 0);
        session.push(chat("2"));
        session.push(chat("3"));
        assert_eq!(session.push(chat("4")), 1);
        assert_eq!(session.len(), 3);

        let first = session.entries().next().unwrap();
        assert!(matches!(first, SessionEntry::ChatTurn { content, .. } if content == "2"));
    }

    #[test]
    fn test_recent_chat_skips_other_entries() {
        let mut session = LearningSession::new(StudentId::from("s"), ModuleId::new(), 50);
        session.push(chat("a"));
        session.push(SessionEntry::AssessmentOutcome {
            concept: "x".to_string(),
            mastery_delta: 5.0,
            new_score: 5,
            at: Utc::now(),
        });
        session.push(chat("b"));
        session.push(chat("c"));

        let recent = session.recent_chat(2);
        assert_eq!(recent.len(), 2);
        assert!(matches!(&recent[0], SessionEntry::ChatTurn { content, .. } if content == "b"));
        assert!(matches!(&recent[1], SessionEntry::ChatTurn { content, .. } if content == "c"));
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = LearningSession::new(StudentId::from("s"), ModuleId::new(), 0);
        assert_eq!(session.max_entries(), 1);
        session.end();
        let ended = session.ended_at;
        session.end();
        assert_eq!(session.ended_at, ended);
        assert!(!session.is_active());
    }
}
