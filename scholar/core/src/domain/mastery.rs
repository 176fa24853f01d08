// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mastery ledger entities
//!
//! A [`MasteryRecord`] is keyed by `(student, module)` and holds a whole-number
//! score in `[0, 100]`. Records are materialized lazily: an absent key reads as
//! score 0, `not_started`.
//!
//! Status invariant, re-established after every mutation:
//! - `mastered` iff score >= 100
//! - `not_started` iff score == 0 and no activity is recorded
//! - `in_progress` otherwise

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::module::ModuleId;

pub const MIN_SCORE: u8 = 0;
pub const MAX_SCORE: u8 = 100;

/// Identifier of a student (issued by the surrounding application).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StudentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MasteryStatus {
    #[default]
    NotStarted,
    InProgress,
    Mastered,
}

impl MasteryStatus {
    /// Derive a status from a score and whether any activity counts for it.
    pub fn derive(score: u8, has_activity: bool) -> Self {
        if score >= MAX_SCORE {
            MasteryStatus::Mastered
        } else if score == MIN_SCORE && !has_activity {
            MasteryStatus::NotStarted
        } else {
            MasteryStatus::InProgress
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryStatus::NotStarted => "not_started",
            MasteryStatus::InProgress => "in_progress",
            MasteryStatus::Mastered => "mastered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(MasteryStatus::NotStarted),
            "in_progress" => Some(MasteryStatus::InProgress),
            "mastered" => Some(MasteryStatus::Mastered),
            _ => None,
        }
    }
}

impl std::fmt::Display for MasteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round (half to even) and clamp a raw score into `[0, 100]`. Callers
/// reject non-finite input before it gets here; NaN maps to 0.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_SCORE;
    }
    raw.round_ties_even().clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub student_id: StudentId,
    pub module_id: ModuleId,
    mastery_score: u8,
    status: MasteryStatus,
    /// Number of score-changing signals applied directly to this module.
    pub activity_count: u32,
    pub assessments_completed: u32,
    pub time_spent_minutes: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasteryRecord {
    /// The implied record for a `(student, module)` pair with no history.
    pub fn new(student_id: StudentId, module_id: ModuleId) -> Self {
        let now = Utc::now();
        Self {
            student_id,
            module_id,
            mastery_score: MIN_SCORE,
            status: MasteryStatus::NotStarted,
            activity_count: 0,
            assessments_completed: 0,
            time_spent_minutes: 0,
            last_activity: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from storage. The status is taken as stored: an
    /// interior module's status follows its children, not its own activity.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        student_id: StudentId,
        module_id: ModuleId,
        mastery_score: u8,
        status: MasteryStatus,
        activity_count: u32,
        assessments_completed: u32,
        time_spent_minutes: u32,
        last_activity: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            module_id,
            mastery_score: mastery_score.min(MAX_SCORE),
            status,
            activity_count,
            assessments_completed,
            time_spent_minutes,
            last_activity,
            created_at,
            updated_at,
        }
    }

    pub fn score(&self) -> u8 {
        self.mastery_score
    }

    pub fn status(&self) -> MasteryStatus {
        self.status
    }

    pub fn has_activity(&self) -> bool {
        self.activity_count > 0
    }

    /// Nudge the score by `delta`; returns the previous score.
    pub fn apply_delta(&mut self, delta: f64) -> u8 {
        let previous = self.mastery_score;
        self.mastery_score = clamp_score(f64::from(previous) + delta);
        if delta != 0.0 {
            self.touch_activity();
        }
        self.recompute_status();
        self.updated_at = Utc::now();
        previous
    }

    /// Overwrite the score with a final result; returns the previous score.
    pub fn set_absolute(&mut self, score: f64) -> u8 {
        let previous = self.mastery_score;
        self.mastery_score = clamp_score(score);
        self.assessments_completed = self.assessments_completed.saturating_add(1);
        self.touch_activity();
        self.recompute_status();
        self.updated_at = Utc::now();
        previous
    }

    /// Bookkeeping for one tutoring turn.
    pub fn record_tutoring_turn(&mut self) {
        self.assessments_completed = self.assessments_completed.saturating_add(1);
        self.time_spent_minutes = self.time_spent_minutes.saturating_add(1);
        self.last_activity = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Replace an interior module's score with the value rolled up from its
    /// children. Progress shows as soon as any child shows progress.
    pub fn apply_rollup(&mut self, score: u8, any_child_active: bool) {
        self.mastery_score = score.min(MAX_SCORE);
        self.status = MasteryStatus::derive(self.mastery_score, self.mastery_score > MIN_SCORE || any_child_active);
        self.updated_at = Utc::now();
    }

    fn touch_activity(&mut self) {
        self.activity_count = self.activity_count.saturating_add(1);
        self.last_activity = Some(Utc::now());
    }

    fn recompute_status(&mut self) {
        self.status = MasteryStatus::derive(self.mastery_score, self.has_activity());
    }
}
