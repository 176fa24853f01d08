// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in
//! the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresModuleRepository** - Module trees and resources
//! - **PostgresMasteryRepository** - Per-student mastery ledger
//! - **PostgresProfileRepository** - Learning profiles (JSONB append)
//! - **PostgresSessionRepository** - Learning-session logs
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for testing, development and offline replay.
//! `InMemoryModuleRepository` owns the mastery map handed out by
//! `InMemoryModuleRepository::mastery`, so deleting a subtree removes modules,
//! resources and mastery records under one set of write locks, and a mastery
//! write for a deleted module is refused.

pub mod postgres_mastery;
pub mod postgres_module;
pub mod postgres_profile;
pub mod postgres_session;

pub use postgres_mastery::PostgresMasteryRepository;
pub use postgres_module::PostgresModuleRepository;
pub use postgres_profile::PostgresProfileRepository;
pub use postgres_session::PostgresSessionRepository;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::mastery::{MasteryRecord, StudentId};
use crate::domain::module::{Module, ModuleId, ModuleResource, PublicationStatus};
use crate::domain::profile::{LearningProfile, ProfileInsight};
use crate::domain::repository::{
    MasteryRepository, ModuleRepository, ProfileRepository, RepositoryError, SessionRepository,
};
use crate::domain::session::{LearningSession, SessionId};

type MasteryMap = Arc<RwLock<HashMap<(StudentId, ModuleId), MasteryRecord>>>;
type ModuleMap = Arc<RwLock<HashMap<ModuleId, Module>>>;

#[derive(Clone, Default)]
pub struct InMemoryMasteryRepository {
    records: MasteryMap,
    /// Module map of the owning `InMemoryModuleRepository`; saves for
    /// modules missing from it are refused.
    modules: Option<ModuleMap>,
}

impl InMemoryMasteryRepository {
    /// Standalone ledger storage that accepts any module id.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MasteryRepository for InMemoryMasteryRepository {
    async fn find(&self, student_id: &StudentId, module_id: ModuleId) -> Result<Option<MasteryRecord>, RepositoryError> {
        let records = self.records.read();
        Ok(records.get(&(student_id.clone(), module_id)).cloned())
    }

    async fn find_many(
        &self,
        student_id: &StudentId,
        module_ids: &[ModuleId],
    ) -> Result<Vec<MasteryRecord>, RepositoryError> {
        let records = self.records.read();
        Ok(module_ids
            .iter()
            .filter_map(|id| records.get(&(student_id.clone(), *id)).cloned())
            .collect())
    }

    async fn save(&self, record: &MasteryRecord) -> Result<(), RepositoryError> {
        // Same lock order as subtree deletion: modules before mastery.
        let modules = self.modules.as_ref().map(|m| m.read());
        if let Some(modules) = &modules {
            if !modules.contains_key(&record.module_id) {
                return Err(RepositoryError::NotFound(format!("Module {} not found", record.module_id)));
            }
        }
        let mut records = self.records.write();
        records.insert((record.student_id.clone(), record.module_id), record.clone());
        Ok(())
    }

    async fn find_by_student(&self, student_id: &StudentId) -> Result<Vec<MasteryRecord>, RepositoryError> {
        let records = self.records.read();
        let mut found: Vec<MasteryRecord> = records
            .values()
            .filter(|r| &r.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }
}

#[derive(Clone)]
pub struct InMemoryModuleRepository {
    modules: ModuleMap,
    resources: Arc<RwLock<HashMap<ModuleId, Vec<ModuleResource>>>>,
    mastery: MasteryMap,
}

impl InMemoryModuleRepository {
    pub fn new() -> Self {
        Self {
            modules: Arc::new(RwLock::new(HashMap::new())),
            resources: Arc::new(RwLock::new(HashMap::new())),
            mastery: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mastery repository over this tree: subtree deletion cascades into it
    /// and it refuses records for modules that are gone.
    pub fn mastery(&self) -> InMemoryMasteryRepository {
        InMemoryMasteryRepository {
            records: self.mastery.clone(),
            modules: Some(self.modules.clone()),
        }
    }
}

impl Default for InMemoryModuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleRepository for InMemoryModuleRepository {
    async fn save(&self, module: &Module) -> Result<(), RepositoryError> {
        let mut modules = self.modules.write();
        let mut stored = module.clone();
        if let Some(existing) = modules.get(&module.id) {
            stored.keep_children_of(existing);
        }
        modules.insert(module.id, stored);
        Ok(())
    }

    async fn insert_child(&self, child: &Module) -> Result<Module, RepositoryError> {
        let parent_id = child
            .parent_id
            .ok_or_else(|| RepositoryError::Unknown(format!("Module {} has no parent", child.id)))?;

        let mut modules = self.modules.write();
        let parent = modules
            .get_mut(&parent_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Module {} not found", parent_id)))?;
        parent.adopt_child(child.id);
        let parent = parent.clone();
        modules.insert(child.id, child.clone());
        Ok(parent)
    }

    async fn find_by_id(&self, id: ModuleId) -> Result<Option<Module>, RepositoryError> {
        let modules = self.modules.read();
        Ok(modules.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[ModuleId]) -> Result<Vec<Module>, RepositoryError> {
        let modules = self.modules.read();
        Ok(ids.iter().filter_map(|id| modules.get(id).cloned()).collect())
    }

    async fn find_roots(&self) -> Result<Vec<Module>, RepositoryError> {
        let modules = self.modules.read();
        let mut roots: Vec<Module> = modules.values().filter(|m| m.is_root()).cloned().collect();
        roots.sort_by_key(|m| m.created_at);
        Ok(roots)
    }

    async fn set_status(&self, id: ModuleId, status: PublicationStatus) -> Result<Option<Module>, RepositoryError> {
        let mut modules = self.modules.write();
        Ok(modules.get_mut(&id).map(|module| {
            module.set_status(status);
            module.clone()
        }))
    }

    async fn delete_subtree(&self, root: ModuleId) -> Result<usize, RepositoryError> {
        // Fixed lock order: modules, resources, mastery.
        let mut modules = self.modules.write();
        let mut resources = self.resources.write();
        let mut mastery = self.mastery.write();

        let parent_id = modules
            .get(&root)
            .ok_or_else(|| RepositoryError::NotFound(format!("Module {} not found", root)))?
            .parent_id;
        if let Some(pid) = parent_id {
            if !modules.contains_key(&pid) {
                return Err(RepositoryError::NotFound(format!("Module {} not found", pid)));
            }
        }

        // Follow parent links rather than child lists, like the foreign-key
        // cascade in PostgreSQL.
        let mut doomed = HashSet::from([root]);
        loop {
            let before = doomed.len();
            for module in modules.values() {
                if module.parent_id.is_some_and(|p| doomed.contains(&p)) {
                    doomed.insert(module.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        for id in &doomed {
            modules.remove(id);
            resources.remove(id);
        }
        mastery.retain(|(_, module_id), _| !doomed.contains(module_id));

        if let Some(parent) = parent_id.and_then(|pid| modules.get_mut(&pid)) {
            parent.remove_child(root);
        }
        Ok(doomed.len())
    }

    async fn save_resource(&self, resource: &ModuleResource) -> Result<(), RepositoryError> {
        let modules = self.modules.read();
        if !modules.contains_key(&resource.module_id) {
            return Err(RepositoryError::NotFound(format!("Module {} not found", resource.module_id)));
        }
        let mut resources = self.resources.write();
        let list = resources.entry(resource.module_id).or_default();
        list.retain(|r| r.id != resource.id);
        list.push(resource.clone());
        Ok(())
    }

    async fn find_resources(&self, module_id: ModuleId) -> Result<Vec<ModuleResource>, RepositoryError> {
        let resources = self.resources.read();
        let mut list = resources.get(&module_id).cloned().unwrap_or_default();
        list.sort_by_key(|r| (r.order, r.created_at));
        Ok(list)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProfileRepository {
    profiles: Arc<RwLock<HashMap<(StudentId, String), LearningProfile>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find(&self, student_id: &StudentId, subject: &str) -> Result<Option<LearningProfile>, RepositoryError> {
        let profiles = self.profiles.read();
        Ok(profiles.get(&(student_id.clone(), subject.to_string())).cloned())
    }

    async fn append(
        &self,
        student_id: &StudentId,
        subject: &str,
        insight: ProfileInsight,
    ) -> Result<LearningProfile, RepositoryError> {
        let mut profiles = self.profiles.write();
        let profile = profiles
            .entry((student_id.clone(), subject.to_string()))
            .or_insert_with(|| LearningProfile::new(student_id.clone(), subject));
        profile.record(insight);
        Ok(profile.clone())
    }

    async fn save(&self, profile: &LearningProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write();
        let key = (profile.student_id.clone(), profile.subject.clone());
        match profiles.get_mut(&key) {
            Some(existing) => {
                existing.learning_style = profile.learning_style.clone();
                existing.pace = profile.pace.clone();
                existing.last_updated = profile.last_updated;
            }
            None => {
                profiles.insert(key, profile.clone());
            }
        }
        Ok(())
    }

    async fn find_by_student(&self, student_id: &StudentId) -> Result<Vec<LearningProfile>, RepositoryError> {
        let profiles = self.profiles.read();
        let mut found: Vec<LearningProfile> = profiles
            .values()
            .filter(|p| &p.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.subject.cmp(&b.subject));
        Ok(found)
    }
}

#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<SessionId, LearningSession>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save(&self, session: &LearningSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<LearningSession>, RepositoryError> {
        let sessions = self.sessions.read();
        Ok(sessions.get(&id).cloned())
    }

    async fn find_active(&self, student_id: &StudentId) -> Result<Vec<LearningSession>, RepositoryError> {
        let sessions = self.sessions.read();
        let mut active: Vec<LearningSession> = sessions
            .values()
            .filter(|s| &s.student_id == student_id && s.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(active)
    }
}
