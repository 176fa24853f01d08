// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Property-based tests for the mastery ledger and propagation.
//!
//! - Scores stay in [0, 100] under any delta sequence
//! - Status always agrees with score and activity
//! - A parent equals the minimum of its children after propagation
//! - Re-running propagation changes nothing
//! - Full mastery of every leaf reaches the root

use proptest::prelude::*;
use scholar_core::application::ScholarServices;
use scholar_core::domain::config::ScholarConfigSpec;
use scholar_core::domain::mastery::{MasteryRecord, MasteryStatus, StudentId};
use scholar_core::domain::module::{Module, ModuleDraft, ModuleId};

// ============================================================================
// Helpers
// ============================================================================

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

fn status_agrees(record: &MasteryRecord) -> bool {
    let score = record.score();
    match record.status() {
        MasteryStatus::Mastered => score >= 100,
        MasteryStatus::NotStarted => score == 0 && !record.has_activity(),
        MasteryStatus::InProgress => score < 100 && (score > 0 || record.has_activity()),
    }
}

/// Root with `shape.len()` units, unit `i` holding `shape[i]` leaves.
async fn build_tree(services: &ScholarServices, shape: &[usize]) -> (Module, Vec<Module>, Vec<Module>) {
    let root = services.tree.create(ModuleDraft::new("Math", "Root"), None).await.unwrap();
    let mut units = Vec::new();
    let mut leaves = Vec::new();
    for (u, count) in shape.iter().enumerate() {
        let unit = services
            .tree
            .create(ModuleDraft::new("Math", format!("Unit {}", u)), Some(root.id))
            .await
            .unwrap();
        for l in 0..*count {
            leaves.push(
                services
                    .tree
                    .create(ModuleDraft::new("Math", format!("Leaf {}.{}", u, l)), Some(unit.id))
                    .await
                    .unwrap(),
            );
        }
        units.push(unit);
    }
    (root, units, leaves)
}

async fn score_of(services: &ScholarServices, student: &StudentId, id: ModuleId) -> u8 {
    services.ledger.get(student, id).await.unwrap().score()
}

// ============================================================================
// Ledger Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: any delta sequence keeps the score clamped
    #[test]
    fn prop_score_always_clamped(deltas in proptest::collection::vec(-500.0f64..500.0, 0..40)) {
        let mut record = MasteryRecord::new(StudentId::from("s"), ModuleId::new());
        for delta in deltas {
            record.apply_delta(delta);
            prop_assert!(record.score() <= 100);
            prop_assert!(status_agrees(&record));
        }
    }

    /// Property: absolute writes overwrite and clamp
    #[test]
    fn prop_set_absolute_overwrites(before in -50.0f64..50.0, score in -200.0f64..300.0) {
        let mut record = MasteryRecord::new(StudentId::from("s"), ModuleId::new());
        record.apply_delta(before);
        record.set_absolute(score);
        prop_assert_eq!(f64::from(record.score()), score.round_ties_even().clamp(0.0, 100.0));
        prop_assert!(status_agrees(&record));
        prop_assert!(record.status() != MasteryStatus::NotStarted);
    }
}

// ============================================================================
// Propagation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Property: after propagation every interior module is the min of its children
    #[test]
    fn prop_parent_is_min_of_children(
        shape in proptest::collection::vec(1usize..4, 1..4),
        scores in proptest::collection::vec(0.0f64..=100.0, 12),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let services = ScholarServices::in_memory(&ScholarConfigSpec::default());
            let (root, units, leaves) = build_tree(&services, &shape).await;
            let student = StudentId::from("s");

            for (leaf, score) in leaves.iter().zip(scores.iter()) {
                services.ledger.set_absolute(&student, leaf.id, *score).await.unwrap();
                services.propagation.propagate(&student, leaf.id).await.unwrap();
            }

            let mut unit_scores = Vec::new();
            for unit in &units {
                let unit = services.tree.get(unit.id).await.unwrap();
                let mut expected = u8::MAX;
                for child in unit.children_ids() {
                    expected = expected.min(score_of(&services, &student, *child).await);
                }
                let actual = score_of(&services, &student, unit.id).await;
                assert_eq!(actual, expected);
                unit_scores.push(actual);
            }
            let root_score = score_of(&services, &student, root.id).await;
            assert_eq!(Some(root_score), unit_scores.iter().copied().min());
        });
    }

    /// Property: a second walk with no intervening write changes nothing
    #[test]
    fn prop_propagation_idempotent(
        shape in proptest::collection::vec(1usize..4, 1..4),
        deltas in proptest::collection::vec(-10.0f64..=10.0, 12),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let services = ScholarServices::in_memory(&ScholarConfigSpec::default());
            let (_, _, leaves) = build_tree(&services, &shape).await;
            let student = StudentId::from("s");

            for (leaf, delta) in leaves.iter().zip(deltas.iter()) {
                services.ledger.apply_delta(&student, leaf.id, *delta * 5.0).await.unwrap();
            }
            let first = services.propagation.propagate(&student, leaves[0].id).await.unwrap();
            let second = services.propagation.propagate(&student, leaves[0].id).await.unwrap();

            assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                assert_eq!(a.module_id, b.module_id);
                assert_eq!(a.new_score, b.new_score);
                assert_eq!(a.status, b.status);
                assert_eq!(b.previous_score, b.new_score);
            }
        });
    }

    /// Property: all leaves at 100 makes every ancestor 100
    #[test]
    fn prop_full_mastery_reaches_root(shape in proptest::collection::vec(1usize..4, 1..4)) {
        let rt = runtime();
        rt.block_on(async {
            let services = ScholarServices::in_memory(&ScholarConfigSpec::default());
            let (root, units, leaves) = build_tree(&services, &shape).await;
            let student = StudentId::from("s");

            for leaf in &leaves {
                services.ledger.set_absolute(&student, leaf.id, 100.0).await.unwrap();
                services.propagation.propagate(&student, leaf.id).await.unwrap();
            }

            for module in units.iter().chain(std::iter::once(&root)) {
                let record = services.ledger.get(&student, module.id).await.unwrap();
                assert_eq!(record.score(), 100);
                assert_eq!(record.status(), MasteryStatus::Mastered);
            }
        });
    }
}
