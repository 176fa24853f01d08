// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for the mastery update pipeline over in-memory stores.
//!
//! Covers:
//! - min-of-children propagation on a two-leaf course (R with leaves A, B)
//! - assignment scores overwriting rather than accumulating
//! - strength/weakness thresholds on assignment results
//! - unlinked assignments and deleted modules
//! - best-effort handling on feedback release

use scholar_core::application::ScholarServices;
use scholar_core::domain::config::ScholarConfigSpec;
use scholar_core::domain::error::MasteryError;
use scholar_core::domain::events::MasteryEvent;
use scholar_core::domain::mastery::{MasteryStatus, StudentId};
use scholar_core::domain::module::{Module, ModuleDraft};
use scholar_core::domain::profile::{ProfileEntryKind, ProfileInsight};
use scholar_core::domain::session::SessionEntry;
use scholar_core::domain::signal::{AssignmentOutcome, AssignmentResult, MasterySignal, NoOpReason, SignalOutcome, TutoringOutcome};
use scholar_core::infrastructure::event_bus::DomainEvent;

struct Course {
    root: Module,
    a: Module,
    b: Module,
}

async fn course(services: &ScholarServices) -> Course {
    let root = services.tree.create(ModuleDraft::new("Math", "Algebra"), None).await.unwrap();
    let a = services
        .tree
        .create(ModuleDraft::new("Math", "Linear equations"), Some(root.id))
        .await
        .unwrap();
    let b = services
        .tree
        .create(ModuleDraft::new("Math", "Quadratics"), Some(root.id))
        .await
        .unwrap();
    Course { root, a, b }
}

fn services() -> ScholarServices {
    ScholarServices::in_memory(&ScholarConfigSpec::default())
}

#[tokio::test]
async fn test_parent_tracks_weakest_child() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-s");

    let root = services.ledger.get(&student, course.root.id).await.unwrap();
    assert_eq!(root.score(), 0);
    assert_eq!(root.status(), MasteryStatus::NotStarted);

    services.ledger.apply_delta(&student, course.a.id, 100.0).await.unwrap();
    let walk = services.propagation.propagate(&student, course.a.id).await.unwrap();
    assert_eq!(walk.len(), 1);
    assert_eq!(walk[0].module_id, course.root.id);
    assert_eq!(walk[0].new_score, 0);
    assert_eq!(walk[0].status, MasteryStatus::InProgress);

    services.ledger.apply_delta(&student, course.b.id, 250.0).await.unwrap();
    services.propagation.propagate(&student, course.b.id).await.unwrap();

    let b = services.ledger.get(&student, course.b.id).await.unwrap();
    assert_eq!(b.score(), 100);
    let root = services.ledger.get(&student, course.root.id).await.unwrap();
    assert_eq!(root.score(), 100);
    assert_eq!(root.status(), MasteryStatus::Mastered);
}

#[tokio::test]
async fn test_tutoring_outcome_reclamps_and_propagates() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-t");

    let update = services
        .pipeline
        .record_tutoring_outcome(TutoringOutcome::new(
            student.clone(),
            course.a.id,
            "Math",
            35.0,
            "isolating the variable",
        ))
        .await
        .unwrap();

    assert_eq!(update.previous_score, 0);
    assert_eq!(update.new_score, 10);
    assert_eq!(update.change, 10.0);
    assert_eq!(update.status, MasteryStatus::InProgress);
    assert_eq!(update.concept_assessed, "isolating the variable");
    assert_eq!(update.ancestors.len(), 1);

    let a = services.ledger.get(&student, course.a.id).await.unwrap();
    assert_eq!(a.assessments_completed, 1);
    assert_eq!(a.time_spent_minutes, 1);
    assert!(a.last_activity.is_some());

    let root = services.ledger.get(&student, course.root.id).await.unwrap();
    assert_eq!(root.score(), 0);
    assert_eq!(root.status(), MasteryStatus::InProgress);
}

#[tokio::test]
async fn test_tutoring_insight_appended_to_subject_profile() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-i");

    let outcome = TutoringOutcome::new(student.clone(), course.a.id, "Math", -2.0, "sign errors").with_insight(
        ProfileInsight::MistakePattern {
            pattern: "drops negative signs".to_string(),
        },
    );
    services.pipeline.record_tutoring_outcome(outcome).await.unwrap();

    let profile = services.profiles.get(&student, "Math").await.unwrap();
    assert_eq!(profile.mistake_patterns.len(), 1);
    assert_eq!(profile.mistake_patterns[0].frequency, 1);
    assert!(services.profiles.get(&student, "Science").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tutoring_outcome_logged_to_session() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-log");
    let session = services.sessions.start(student.clone(), course.a.id).await.unwrap();

    services
        .pipeline
        .record_tutoring_outcome(
            TutoringOutcome::new(student.clone(), course.a.id, "Math", 4.0, "slope").in_session(session.id),
        )
        .await
        .unwrap();

    let session = services.sessions.get(session.id).await.unwrap();
    let entries: Vec<&SessionEntry> = session.entries().collect();
    assert_eq!(entries.len(), 1);
    assert!(matches!(
        entries[0],
        SessionEntry::AssessmentOutcome { concept, new_score: 4, .. } if concept == "slope"
    ));
}

#[tokio::test]
async fn test_closed_session_does_not_fail_tutoring_update() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-closed");
    let session = services.sessions.start(student.clone(), course.a.id).await.unwrap();
    services.sessions.end(session.id).await.unwrap();

    let update = services
        .pipeline
        .record_tutoring_outcome(
            TutoringOutcome::new(student.clone(), course.a.id, "Math", 6.0, "slope").in_session(session.id),
        )
        .await
        .unwrap();
    assert_eq!(update.new_score, 6);
}

#[tokio::test]
async fn test_assignment_overwrites_score() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-o");

    for _ in 0..3 {
        services
            .pipeline
            .record_tutoring_outcome(TutoringOutcome::new(student.clone(), course.a.id, "Math", 10.0, "x"))
            .await
            .unwrap();
    }
    assert_eq!(services.ledger.get(&student, course.a.id).await.unwrap().score(), 30);

    let outcome = services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.a.id), "Math", "Quiz 1", 75.0))
        .await
        .unwrap();

    match outcome {
        AssignmentOutcome::Applied {
            previous_score,
            new_score,
            profile_entry,
            ..
        } => {
            assert_eq!(previous_score, 30);
            assert_eq!(new_score, 75);
            assert_eq!(profile_entry, None);
        }
        other => panic!("expected applied outcome, got {:?}", other),
    }
    assert!(services.profiles.get(&student, "Math").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_assignment_thresholds_append_one_entry() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-th");

    services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.a.id), "Math", "Quiz 2", 85.0))
        .await
        .unwrap();
    let profile = services.profiles.get(&student, "Math").await.unwrap();
    assert_eq!(profile.strengths.len(), 1);
    assert_eq!(profile.strengths[0].topic, "Quiz 2");
    assert!(profile.weaknesses.is_empty());

    let outcome = services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.b.id), "Math", "Quiz 3", 40.0))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        AssignmentOutcome::Applied {
            profile_entry: Some(ProfileEntryKind::Weakness),
            ..
        }
    ));

    let profile = services.profiles.get(&student, "Math").await.unwrap();
    assert_eq!(profile.strengths.len(), 1);
    assert_eq!(profile.weaknesses.len(), 1);
    assert!(profile.weaknesses[0].notes.contains("40"));

    let root = services.ledger.get(&student, course.root.id).await.unwrap();
    assert_eq!(root.score(), 40);
}

#[tokio::test]
async fn test_repeated_insights_are_not_deduplicated() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-dup");

    for _ in 0..2 {
        services
            .pipeline
            .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.a.id), "Math", "Quiz", 95.0))
            .await
            .unwrap();
    }
    assert_eq!(services.profiles.get(&student, "Math").await.unwrap().strengths.len(), 2);
}

#[tokio::test]
async fn test_unlinked_assignment_is_noop() {
    let services = services();
    let _course = course(&services).await;
    let student = StudentId::from("student-u");

    let outcome = services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), None, "Math", "Essay", 20.0))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        AssignmentOutcome::NoOp {
            reason: NoOpReason::Unlinked
        }
    );
    assert!(services.ledger.records_for(&student).await.unwrap().is_empty());
    assert!(services.profiles.profiles_for(&student).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_module_fails_with_module_not_found() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-d");
    services.tree.delete_subtree(course.b.id).await.unwrap();

    let err = services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.b.id), "Math", "Quiz", 90.0))
        .await
        .unwrap_err();
    assert!(matches!(err, MasteryError::ModuleNotFound(id) if id == course.b.id));
    assert!(services.profiles.get(&student, "Math").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_feedback_release_is_best_effort() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-f");
    let mut events = services.event_bus.subscribe_student(student.clone());
    services.tree.delete_subtree(course.a.id).await.unwrap();

    let outcome = services
        .pipeline
        .on_feedback_released(AssignmentResult::new(student.clone(), Some(course.a.id), "Math", "Quiz", 60.0))
        .await;
    assert!(outcome.is_none());

    match events.try_recv().unwrap() {
        DomainEvent::Mastery(MasteryEvent::UpdateFailed { module_id, reason, .. }) => {
            assert_eq!(module_id, Some(course.a.id));
            assert!(reason.contains("not found"));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let outcome = services
        .pipeline
        .on_feedback_released(AssignmentResult::new(student.clone(), Some(course.b.id), "Math", "Quiz", 60.0))
        .await;
    assert!(matches!(outcome, Some(AssignmentOutcome::Applied { new_score: 60, .. })));
}

#[tokio::test]
async fn test_non_finite_signal_rejected_before_any_write() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-nan");

    let err = services
        .pipeline
        .handle(MasterySignal::Tutoring(TutoringOutcome::new(
            student.clone(),
            course.a.id,
            "Math",
            f64::NAN,
            "x",
        )))
        .await
        .unwrap_err();
    assert!(matches!(err, MasteryError::InvalidSignal(_)));
    assert!(services.ledger.records_for(&student).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_handle_dispatches_by_source() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-h");

    let outcome = services
        .pipeline
        .handle(MasterySignal::Assignment(AssignmentResult::new(
            student.clone(),
            Some(course.b.id),
            "Math",
            "Test",
            100.0,
        )))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SignalOutcome::Assignment(AssignmentOutcome::Applied {
            status: MasteryStatus::Mastered,
            ..
        })
    ));
}

#[tokio::test]
async fn test_updates_published_nearest_first() {
    let services = services();
    let root = services.tree.create(ModuleDraft::new("Science", "Biology"), None).await.unwrap();
    let unit = services
        .tree
        .create(ModuleDraft::new("Science", "Cells"), Some(root.id))
        .await
        .unwrap();
    let leaf = services
        .tree
        .create(ModuleDraft::new("Science", "Membranes"), Some(unit.id))
        .await
        .unwrap();
    let student = StudentId::from("student-e");
    let mut events = services.event_bus.subscribe_student(student.clone());

    services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(leaf.id), "Science", "Lab", 100.0))
        .await
        .unwrap();

    let mut recomputed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::Mastery(MasteryEvent::AncestorRecomputed { module_id, new_score, .. }) = event {
            recomputed.push((module_id, new_score));
        }
    }
    assert_eq!(recomputed, vec![(unit.id, 100), (root.id, 100)]);
}

#[tokio::test]
async fn test_delete_subtree_removes_mastery_records() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-del");

    services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.a.id), "Math", "Q", 70.0))
        .await
        .unwrap();
    assert!(services.ledger.exists(&student, course.a.id).await.unwrap());

    let removed = services.tree.delete_subtree(course.root.id).await.unwrap();
    assert_eq!(removed, 3);
    assert!(!services.ledger.exists(&student, course.a.id).await.unwrap());
    assert!(services.ledger.records_for(&student).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_report_over_subtree() {
    let services = services();
    let course = course(&services).await;
    let student = StudentId::from("student-r");

    services
        .pipeline
        .record_assignment_result(AssignmentResult::new(student.clone(), Some(course.b.id), "Math", "Q", 55.0))
        .await
        .unwrap();

    let modules = services.tree.subtree(course.root.id).await.unwrap();
    let report = services.ledger.progress_report(&student, &modules).await.unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report[0].module_id, course.root.id);
    assert_eq!(report[0].status, MasteryStatus::InProgress);
    let a = report.iter().find(|e| e.module_id == course.a.id).unwrap();
    assert_eq!((a.score, a.status), (0, MasteryStatus::NotStarted));
    let b = report.iter().find(|e| e.module_id == course.b.id).unwrap();
    assert_eq!((b.score, b.is_leaf), (55, true));
}
