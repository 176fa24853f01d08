// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Producer signals and their outcomes
//!
//! Two producers feed the mastery ledger: tutoring turns (a bounded delta) and
//! released assignment feedback (an absolute percentage). Both arrive through
//! [`MasterySignal`] and are normalized by the update pipeline.

use serde::{Deserialize, Serialize};

use crate::domain::error::MasteryError;
use crate::domain::mastery::{MasteryStatus, StudentId};
use crate::domain::module::ModuleId;
use crate::domain::profile::{ProfileEntryKind, ProfileInsight};
use crate::domain::session::SessionId;

/// Outcome of one tutoring turn as assessed by the tutoring agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringOutcome {
    pub student_id: StudentId,
    pub module_id: ModuleId,
    pub subject: String,
    /// Expected in `[-10, 10]`; re-clamped by the pipeline regardless.
    pub mastery_delta: f64,
    pub concept: String,
    #[serde(default)]
    pub insight: Option<ProfileInsight>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

impl TutoringOutcome {
    pub fn new(
        student_id: StudentId,
        module_id: ModuleId,
        subject: impl Into<String>,
        mastery_delta: f64,
        concept: impl Into<String>,
    ) -> Self {
        Self {
            student_id,
            module_id,
            subject: subject.into(),
            mastery_delta,
            concept: concept.into(),
            insight: None,
            session_id: None,
        }
    }

    pub fn with_insight(mut self, insight: ProfileInsight) -> Self {
        self.insight = Some(insight);
        self
    }

    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn validate(&self) -> Result<(), MasteryError> {
        if !self.mastery_delta.is_finite() {
            return Err(MasteryError::InvalidSignal(format!(
                "mastery delta must be finite, got {}",
                self.mastery_delta
            )));
        }
        Ok(())
    }
}

/// A graded assignment whose feedback has been released to the student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub student_id: StudentId,
    /// Root of the module tree the assignment is linked to, if any.
    #[serde(default)]
    pub module_id: Option<ModuleId>,
    pub subject: String,
    pub assignment_title: String,
    pub score_percentage: f64,
}

impl AssignmentResult {
    pub fn new(
        student_id: StudentId,
        module_id: Option<ModuleId>,
        subject: impl Into<String>,
        assignment_title: impl Into<String>,
        score_percentage: f64,
    ) -> Self {
        Self {
            student_id,
            module_id,
            subject: subject.into(),
            assignment_title: assignment_title.into(),
            score_percentage,
        }
    }

    pub fn validate(&self) -> Result<(), MasteryError> {
        if !self.score_percentage.is_finite() {
            return Err(MasteryError::InvalidSignal(format!(
                "score percentage must be finite, got {}",
                self.score_percentage
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MasterySignal {
    Tutoring(TutoringOutcome),
    Assignment(AssignmentResult),
}

impl MasterySignal {
    pub fn student_id(&self) -> &StudentId {
        match self {
            MasterySignal::Tutoring(t) => &t.student_id,
            MasterySignal::Assignment(a) => &a.student_id,
        }
    }

    pub fn source(&self) -> SignalSource {
        match self {
            MasterySignal::Tutoring(_) => SignalSource::Tutoring,
            MasterySignal::Assignment(_) => SignalSource::Assignment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Tutoring,
    Assignment,
}

/// One ancestor recomputed during an upward walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorUpdate {
    pub module_id: ModuleId,
    pub previous_score: u8,
    pub new_score: u8,
    pub status: MasteryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringUpdate {
    pub previous_score: u8,
    pub new_score: u8,
    /// The delta actually applied after re-clamping.
    pub change: f64,
    pub status: MasteryStatus,
    pub concept_assessed: String,
    pub ancestors: Vec<AncestorUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    Unlinked,
}

impl NoOpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOpReason::Unlinked => "unlinked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Applied {
        module_id: ModuleId,
        previous_score: u8,
        new_score: u8,
        status: MasteryStatus,
        profile_entry: Option<ProfileEntryKind>,
        ancestors: Vec<AncestorUpdate>,
    },
    NoOp {
        reason: NoOpReason,
    },
}

impl AssignmentOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, AssignmentOutcome::NoOp { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SignalOutcome {
    Tutoring(TutoringUpdate),
    Assignment(AssignmentOutcome),
}
