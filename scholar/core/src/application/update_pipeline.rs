// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mastery Update Pipeline
//!
//! The single normalization point for both producers:
//!
//! - tutoring turns nudge a module's score by a bounded delta and may carry a
//!   profile insight;
//! - released assignment feedback overwrites the linked module's score with
//!   the percentage and records a strength or weakness past the thresholds.
//!
//! For one signal the student's scope is held across the ledger write, the
//! full upward propagation walk and the profile append. Success is reported
//! only after the walk completes; a failure anywhere is returned as an error
//! and the next successful walk recomputes from the children.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Collaborators:** `MasteryLedger`, `PropagationEngine`,
//!   `LearningProfileService`, `LearningSessionService`, `StudentLockTable`

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::ledger::MasteryLedger;
use crate::application::profile_service::LearningProfileService;
use crate::application::propagation::PropagationEngine;
use crate::application::session_service::LearningSessionService;
use crate::application::student_locks::StudentLockTable;
use crate::domain::config::MasteryConfig;
use crate::domain::error::MasteryError;
use crate::domain::events::MasteryEvent;
use crate::domain::mastery::{MasteryRecord, StudentId};
use crate::domain::module::{Module, ModuleId};
use crate::domain::profile::ProfileInsight;
use crate::domain::repository::ModuleRepository;
use crate::domain::session::SessionEntry;
use crate::domain::signal::{
    AncestorUpdate, AssignmentOutcome, AssignmentResult, MasterySignal, NoOpReason, SignalOutcome, SignalSource,
    TutoringOutcome, TutoringUpdate,
};
use crate::infrastructure::event_bus::EventBus;

/// Normalization rules applied to producer signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelinePolicy {
    pub max_tutoring_delta: f64,
    pub strength_threshold: f64,
    pub weakness_threshold: f64,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self::from(&MasteryConfig::default())
    }
}

impl From<&MasteryConfig> for PipelinePolicy {
    fn from(config: &MasteryConfig) -> Self {
        Self {
            max_tutoring_delta: config.max_tutoring_delta.abs(),
            strength_threshold: config.strength_threshold,
            weakness_threshold: config.weakness_threshold,
        }
    }
}

impl PipelinePolicy {
    pub fn clamp_delta(&self, delta: f64) -> f64 {
        delta.clamp(-self.max_tutoring_delta, self.max_tutoring_delta)
    }

    /// Profile entry implied by an assignment score, if any.
    pub fn assignment_insight(&self, result: &AssignmentResult) -> Option<ProfileInsight> {
        let score = result.score_percentage;
        if score >= self.strength_threshold {
            Some(ProfileInsight::Strength {
                topic: result.assignment_title.clone(),
                confidence: (score / 100.0).clamp(0.0, 1.0),
            })
        } else if score < self.weakness_threshold {
            Some(ProfileInsight::Weakness {
                topic: result.assignment_title.clone(),
                confidence: Some((score / 100.0).clamp(0.0, 1.0)),
                notes: format!("Scored {:.0}% on {}", score, result.assignment_title),
            })
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct MasteryUpdatePipeline {
    modules: Arc<dyn ModuleRepository>,
    ledger: MasteryLedger,
    propagation: PropagationEngine,
    profiles: LearningProfileService,
    sessions: LearningSessionService,
    locks: Arc<StudentLockTable>,
    event_bus: EventBus,
    policy: PipelinePolicy,
}

impl MasteryUpdatePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        modules: Arc<dyn ModuleRepository>,
        ledger: MasteryLedger,
        propagation: PropagationEngine,
        profiles: LearningProfileService,
        sessions: LearningSessionService,
        locks: Arc<StudentLockTable>,
        event_bus: EventBus,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            modules,
            ledger,
            propagation,
            profiles,
            sessions,
            locks,
            event_bus,
            policy,
        }
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    /// Dispatch a signal from either producer.
    pub async fn handle(&self, signal: MasterySignal) -> Result<SignalOutcome, MasteryError> {
        match signal {
            MasterySignal::Tutoring(outcome) => Ok(SignalOutcome::Tutoring(self.record_tutoring_outcome(outcome).await?)),
            MasterySignal::Assignment(result) => {
                Ok(SignalOutcome::Assignment(self.record_assignment_result(result).await?))
            }
        }
    }

    pub async fn record_tutoring_outcome(&self, outcome: TutoringOutcome) -> Result<TutoringUpdate, MasteryError> {
        outcome.validate()?;
        let student_id = &outcome.student_id;

        let delta = self.policy.clamp_delta(outcome.mastery_delta);
        if delta != outcome.mastery_delta {
            debug!(
                student_id = %student_id,
                requested = outcome.mastery_delta,
                applied = delta,
                "Re-clamped tutoring delta"
            );
        }

        let guard = self.locks.acquire(student_id).await?;
        let module = self.require_module(outcome.module_id).await?;

        let (previous_score, record) = self
            .ledger
            .update(student_id, module.id, |r| {
                let previous = r.apply_delta(delta);
                r.record_tutoring_turn();
                previous
            })
            .await?;
        let ancestors = self.propagation.propagate_from(student_id, &module).await?;

        if let Some(insight) = outcome.insight.clone() {
            self.profiles.append(student_id, &outcome.subject, insight).await?;
        }
        drop(guard);

        if let Some(session_id) = outcome.session_id {
            let entry = SessionEntry::AssessmentOutcome {
                concept: outcome.concept.clone(),
                mastery_delta: delta,
                new_score: record.score(),
                at: Utc::now(),
            };
            if let Err(e) = self.sessions.append(session_id, entry).await {
                warn!(session_id = %session_id, error = %e, "Could not log assessment outcome to session");
            }
        }

        info!(
            student_id = %student_id,
            module_id = %module.id,
            previous_score,
            new_score = record.score(),
            ancestors = ancestors.len(),
            "Applied tutoring outcome for concept '{}'",
            outcome.concept
        );
        self.publish_updates(student_id, &record, previous_score, SignalSource::Tutoring, &ancestors);

        Ok(TutoringUpdate {
            previous_score,
            new_score: record.score(),
            change: delta,
            status: record.status(),
            concept_assessed: outcome.concept,
            ancestors,
        })
    }

    pub async fn record_assignment_result(&self, result: AssignmentResult) -> Result<AssignmentOutcome, MasteryError> {
        result.validate()?;
        let student_id = &result.student_id;

        let Some(module_id) = result.module_id else {
            debug!(student_id = %student_id, "Assignment '{}' has no linked module", result.assignment_title);
            return Ok(AssignmentOutcome::NoOp {
                reason: NoOpReason::Unlinked,
            });
        };

        let guard = self.locks.acquire(student_id).await?;
        let module = self.require_module(module_id).await?;

        let (previous_score, record) = self
            .ledger
            .update(student_id, module.id, |r| r.set_absolute(result.score_percentage))
            .await?;
        let ancestors = self.propagation.propagate_from(student_id, &module).await?;

        let insight = self.policy.assignment_insight(&result);
        let profile_entry = insight.as_ref().map(ProfileInsight::kind);
        if let Some(insight) = insight {
            self.profiles.append(student_id, &result.subject, insight).await?;
        }
        drop(guard);

        info!(
            student_id = %student_id,
            module_id = %module.id,
            previous_score,
            new_score = record.score(),
            ancestors = ancestors.len(),
            "Applied assignment result '{}'",
            result.assignment_title
        );
        self.publish_updates(student_id, &record, previous_score, SignalSource::Assignment, &ancestors);

        Ok(AssignmentOutcome::Applied {
            module_id: module.id,
            previous_score,
            new_score: record.score(),
            status: record.status(),
            profile_entry,
            ancestors,
        })
    }

    /// Hook for the feedback-release workflow. Never fails: the release
    /// proceeds whatever happens here, so errors are logged and published.
    pub async fn on_feedback_released(&self, result: AssignmentResult) -> Option<AssignmentOutcome> {
        let student_id = result.student_id.clone();
        let module_id = result.module_id;

        match self.record_assignment_result(result).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(
                    student_id = %student_id,
                    module_id = ?module_id,
                    error = %e,
                    "Mastery update after feedback release failed"
                );
                self.event_bus.publish_mastery_event(MasteryEvent::UpdateFailed {
                    student_id,
                    module_id,
                    source: SignalSource::Assignment,
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                None
            }
        }
    }

    async fn require_module(&self, module_id: ModuleId) -> Result<Module, MasteryError> {
        self.modules
            .find_by_id(module_id)
            .await?
            .ok_or(MasteryError::ModuleNotFound(module_id))
    }

    fn publish_updates(
        &self,
        student_id: &StudentId,
        record: &MasteryRecord,
        previous_score: u8,
        source: SignalSource,
        ancestors: &[AncestorUpdate],
    ) {
        let now = Utc::now();
        self.event_bus.publish_mastery_event(MasteryEvent::MasteryUpdated {
            student_id: student_id.clone(),
            module_id: record.module_id,
            source,
            previous_score,
            new_score: record.score(),
            status: record.status(),
            updated_at: now,
        });
        for ancestor in ancestors {
            self.event_bus.publish_mastery_event(MasteryEvent::AncestorRecomputed {
                student_id: student_id.clone(),
                module_id: ancestor.module_id,
                previous_score: ancestor.previous_score,
                new_score: ancestor.new_score,
                status: ancestor.status,
                recomputed_at: now,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f64) -> AssignmentResult {
        AssignmentResult::new(StudentId::from("s"), Some(ModuleId::new()), "Math", "Quiz 2", score)
    }

    #[test]
    fn test_assignment_insight_thresholds() {
        let policy = PipelinePolicy::default();

        match policy.assignment_insight(&result(85.0)) {
            Some(ProfileInsight::Strength { topic, confidence }) => {
                assert_eq!(topic, "Quiz 2");
                assert!((confidence - 0.85).abs() < f64::EPSILON);
            }
            other => panic!("expected strength, got {:?}", other),
        }
        assert!(policy.assignment_insight(&result(80.0)).is_some());
        assert!(policy.assignment_insight(&result(79.9)).is_none());
        assert!(policy.assignment_insight(&result(50.0)).is_none());

        match policy.assignment_insight(&result(40.0)) {
            Some(ProfileInsight::Weakness { notes, .. }) => assert!(notes.contains("40%")),
            other => panic!("expected weakness, got {:?}", other),
        }
    }

    #[test]
    fn test_delta_reclamped() {
        let policy = PipelinePolicy::default();
        assert_eq!(policy.clamp_delta(50.0), 10.0);
        assert_eq!(policy.clamp_delta(-12.5), -10.0);
        assert_eq!(policy.clamp_delta(3.5), 3.5);
    }
}
