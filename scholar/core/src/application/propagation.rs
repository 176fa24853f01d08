// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mastery Propagation Engine
//!
//! Keeps every interior module's score a pure function of its direct
//! children: after a module changes, each ancestor up to the root is
//! recomputed as the minimum of its children's current scores.
//!
//! The walk is a pull-based recompute, so running it again with no
//! intervening write changes nothing. Callers must hold the student's
//! scope (see `StudentLockTable`) for the ledger write and the walk.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::application::ledger::MasteryLedger;
use crate::domain::error::MasteryError;
use crate::domain::mastery::{MasteryRecord, StudentId, MIN_SCORE};
use crate::domain::module::{Module, ModuleId};
use crate::domain::repository::ModuleRepository;
use crate::domain::signal::AncestorUpdate;

#[derive(Clone)]
pub struct PropagationEngine {
    modules: Arc<dyn ModuleRepository>,
    ledger: MasteryLedger,
}

impl PropagationEngine {
    pub fn new(modules: Arc<dyn ModuleRepository>, ledger: MasteryLedger) -> Self {
        Self { modules, ledger }
    }

    /// Walk upward from `mutated`, recomputing every ancestor. Returns the
    /// ancestors in walk order (nearest first).
    pub async fn propagate_from(
        &self,
        student_id: &StudentId,
        mutated: &Module,
    ) -> Result<Vec<AncestorUpdate>, MasteryError> {
        let mut visited = HashSet::from([mutated.id]);
        let mut updates = Vec::new();
        let mut current_id = mutated.id;
        let mut next_parent = mutated.parent_id;

        while let Some(parent_id) = next_parent {
            if !visited.insert(parent_id) {
                return Err(MasteryError::corrupt(parent_id, "cycle in parent chain"));
            }

            let parent = self.modules.find_by_id(parent_id).await?.ok_or_else(|| {
                MasteryError::corrupt(current_id, format!("dangling parent reference {}", parent_id))
            })?;
            if !parent.children_ids().contains(&current_id) {
                return Err(MasteryError::corrupt(
                    parent_id,
                    format!("does not list {} among its children", current_id),
                ));
            }

            let update = self.recompute(student_id, &parent).await?;
            debug!(
                student_id = %student_id,
                module_id = %parent_id,
                previous_score = update.previous_score,
                new_score = update.new_score,
                "Recomputed ancestor mastery"
            );
            updates.push(update);

            current_id = parent_id;
            next_parent = parent.parent_id;
        }

        Ok(updates)
    }

    /// Load `module_id` and walk upward from it.
    pub async fn propagate(&self, student_id: &StudentId, module_id: ModuleId) -> Result<Vec<AncestorUpdate>, MasteryError> {
        let module = self
            .modules
            .find_by_id(module_id)
            .await?
            .ok_or(MasteryError::ModuleNotFound(module_id))?;
        self.propagate_from(student_id, &module).await
    }

    /// Recompute one interior module from its direct children.
    async fn recompute(&self, student_id: &StudentId, parent: &Module) -> Result<AncestorUpdate, MasteryError> {
        let children = parent.children_ids();
        let records = self.ledger.get_many(student_id, children).await?;
        let scores: Vec<u8> = children
            .iter()
            .map(|id| records.get(id).map(MasteryRecord::score).unwrap_or(MIN_SCORE))
            .collect();

        let min = scores.iter().copied().min().unwrap_or(MIN_SCORE);
        let any_child_active = scores.iter().any(|s| *s > MIN_SCORE);

        let mut record = self.ledger.get(student_id, parent.id).await?;
        let previous_score = record.score();
        let previous_status = record.status();
        record.apply_rollup(min, any_child_active);

        // Unchanged rollups are not written, so untouched ancestors stay absent.
        if record.score() != previous_score || record.status() != previous_status {
            self.ledger.save(&record).await?;
        }

        Ok(AncestorUpdate {
            module_id: parent.id,
            previous_score,
            new_score: record.score(),
            status: record.status(),
        })
    }
}
