// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mastery Ledger
//!
//! Read/write access to per-`(student, module)` mastery records with lazy
//! materialization: reading an absent key yields score 0, `not_started`, and
//! nothing is stored until the first write.
//!
//! Writes here do not propagate. Producer signals go through
//! `MasteryUpdatePipeline`, which holds the student's scope and runs the
//! upward walk after every ledger write.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::error::MasteryError;
use crate::domain::mastery::{MasteryRecord, MasteryStatus, StudentId};
use crate::domain::module::{Module, ModuleId};
use crate::domain::repository::{MasteryRepository, RepositoryError};

/// One row of a student's progress through a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub module_id: ModuleId,
    pub title: String,
    pub depth: u8,
    pub is_leaf: bool,
    pub score: u8,
    pub status: MasteryStatus,
}

#[derive(Clone)]
pub struct MasteryLedger {
    repository: Arc<dyn MasteryRepository>,
}

impl MasteryLedger {
    pub fn new(repository: Arc<dyn MasteryRepository>) -> Self {
        Self { repository }
    }

    pub async fn get(&self, student_id: &StudentId, module_id: ModuleId) -> Result<MasteryRecord, MasteryError> {
        Ok(self
            .repository
            .find(student_id, module_id)
            .await?
            .unwrap_or_else(|| MasteryRecord::new(student_id.clone(), module_id)))
    }

    /// Records for `module_ids`, absent keys filled with implied defaults.
    pub async fn get_many(
        &self,
        student_id: &StudentId,
        module_ids: &[ModuleId],
    ) -> Result<HashMap<ModuleId, MasteryRecord>, MasteryError> {
        let mut records: HashMap<ModuleId, MasteryRecord> = self
            .repository
            .find_many(student_id, module_ids)
            .await?
            .into_iter()
            .map(|r| (r.module_id, r))
            .collect();
        for id in module_ids {
            records
                .entry(*id)
                .or_insert_with(|| MasteryRecord::new(student_id.clone(), *id));
        }
        Ok(records)
    }

    /// Whether a record has been materialized for the pair.
    pub async fn exists(&self, student_id: &StudentId, module_id: ModuleId) -> Result<bool, MasteryError> {
        Ok(self.repository.find(student_id, module_id).await?.is_some())
    }

    /// Load (or default) the record, mutate it and store it. Returns the
    /// closure's result alongside the stored record.
    pub async fn update<T>(
        &self,
        student_id: &StudentId,
        module_id: ModuleId,
        mutate: impl FnOnce(&mut MasteryRecord) -> T + Send,
    ) -> Result<(T, MasteryRecord), MasteryError> {
        let mut record = self.get(student_id, module_id).await?;
        let out = mutate(&mut record);
        self.save(&record).await?;
        Ok((out, record))
    }

    pub async fn apply_delta(
        &self,
        student_id: &StudentId,
        module_id: ModuleId,
        delta: f64,
    ) -> Result<MasteryRecord, MasteryError> {
        let (_, record) = self.update(student_id, module_id, |r| r.apply_delta(delta)).await?;
        Ok(record)
    }

    pub async fn set_absolute(
        &self,
        student_id: &StudentId,
        module_id: ModuleId,
        score: f64,
    ) -> Result<MasteryRecord, MasteryError> {
        let (_, record) = self.update(student_id, module_id, |r| r.set_absolute(score)).await?;
        Ok(record)
    }

    /// Store a record. A module deleted since it was read surfaces as
    /// `ModuleNotFound`.
    pub async fn save(&self, record: &MasteryRecord) -> Result<(), MasteryError> {
        self.repository.save(record).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => MasteryError::ModuleNotFound(record.module_id),
            other => other.into(),
        })
    }

    pub async fn records_for(&self, student_id: &StudentId) -> Result<Vec<MasteryRecord>, MasteryError> {
        Ok(self.repository.find_by_student(student_id).await?)
    }

    /// Scores and statuses of `modules` (typically a subtree) for one student.
    pub async fn progress_report(
        &self,
        student_id: &StudentId,
        modules: &[Module],
    ) -> Result<Vec<ProgressEntry>, MasteryError> {
        let ids: Vec<ModuleId> = modules.iter().map(|m| m.id).collect();
        let records = self.get_many(student_id, &ids).await?;

        Ok(modules
            .iter()
            .map(|m| {
                let (score, status) = records
                    .get(&m.id)
                    .map(|r| (r.score(), r.status()))
                    .unwrap_or_default();
                ProgressEntry {
                    module_id: m.id,
                    title: m.title.clone(),
                    depth: m.depth(),
                    is_leaf: m.is_leaf(),
                    score,
                    status,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryMasteryRepository;

    fn ledger() -> MasteryLedger {
        MasteryLedger::new(Arc::new(InMemoryMasteryRepository::new()))
    }

    #[tokio::test]
    async fn test_absent_reads_default_without_materializing() {
        let ledger = ledger();
        let student = StudentId::from("s");
        let module = ModuleId::new();

        let record = ledger.get(&student, module).await.unwrap();
        assert_eq!(record.score(), 0);
        assert_eq!(record.status(), MasteryStatus::NotStarted);
        assert!(!ledger.exists(&student, module).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_delta_upserts() {
        let ledger = ledger();
        let student = StudentId::from("s");
        let module = ModuleId::new();

        ledger.apply_delta(&student, module, 7.0).await.unwrap();
        let record = ledger.apply_delta(&student, module, 5.0).await.unwrap();
        assert_eq!(record.score(), 12);
        assert_eq!(record.activity_count, 2);
        assert!(ledger.exists(&student, module).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_absolute_is_not_additive() {
        let ledger = ledger();
        let student = StudentId::from("s");
        let module = ModuleId::new();

        ledger.apply_delta(&student, module, 40.0).await.unwrap();
        let record = ledger.set_absolute(&student, module, 75.0).await.unwrap();
        assert_eq!(record.score(), 75);
        let record = ledger.set_absolute(&student, module, 130.0).await.unwrap();
        assert_eq!(record.score(), 100);
        assert_eq!(record.status(), MasteryStatus::Mastered);
    }

    #[tokio::test]
    async fn test_get_many_fills_defaults() {
        let ledger = ledger();
        let student = StudentId::from("s");
        let touched = ModuleId::new();
        let untouched = ModuleId::new();
        ledger.apply_delta(&student, touched, 3.0).await.unwrap();

        let records = ledger.get_many(&student, &[touched, untouched]).await.unwrap();
        assert_eq!(records[&touched].score(), 3);
        assert_eq!(records[&untouched].score(), 0);
    }

    #[tokio::test]
    async fn test_write_for_deleted_module_is_module_not_found() {
        use crate::domain::module::ModuleDraft;
        use crate::domain::repository::ModuleRepository;
        use crate::infrastructure::repositories::InMemoryModuleRepository;

        let modules = InMemoryModuleRepository::new();
        let ledger = MasteryLedger::new(Arc::new(modules.mastery()));
        let module = Module::new_root(ModuleDraft::new("Math", "Algebra"));
        modules.save(&module).await.unwrap();
        let student = StudentId::from("s");

        ledger.apply_delta(&student, module.id, 5.0).await.unwrap();
        modules.delete_subtree(module.id).await.unwrap();

        let err = ledger.apply_delta(&student, module.id, 5.0).await.unwrap_err();
        assert!(matches!(err, MasteryError::ModuleNotFound(id) if id == module.id));
        assert!(!ledger.exists(&student, module.id).await.unwrap());
    }
}
