// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service wiring
//!
//! Builds every application service over one repository set so that the
//! tree service, the ledger and the pipeline all see the same stores.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ledger::MasteryLedger;
use crate::application::module_tree::{ModuleTreeService, StandardModuleTreeService};
use crate::application::profile_service::LearningProfileService;
use crate::application::propagation::PropagationEngine;
use crate::application::repository_factory::Repositories;
use crate::application::session_service::LearningSessionService;
use crate::application::student_locks::StudentLockTable;
use crate::application::update_pipeline::{MasteryUpdatePipeline, PipelinePolicy};
use crate::domain::config::ScholarConfigSpec;
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct ScholarServices {
    pub tree: Arc<dyn ModuleTreeService>,
    pub ledger: MasteryLedger,
    pub propagation: PropagationEngine,
    pub profiles: LearningProfileService,
    pub sessions: LearningSessionService,
    pub pipeline: MasteryUpdatePipeline,
    pub locks: Arc<StudentLockTable>,
    pub event_bus: EventBus,
}

impl ScholarServices {
    pub fn new(repositories: Repositories, spec: &ScholarConfigSpec, event_bus: EventBus) -> Self {
        let tree: Arc<dyn ModuleTreeService> = Arc::new(StandardModuleTreeService::new(
            repositories.modules.clone(),
            event_bus.clone(),
            spec.tree.max_depth,
        ));
        let ledger = MasteryLedger::new(repositories.mastery.clone());
        let propagation = PropagationEngine::new(repositories.modules.clone(), ledger.clone());
        let profiles = LearningProfileService::new(repositories.profiles.clone(), event_bus.clone());
        let sessions = LearningSessionService::new(repositories.sessions.clone(), spec.session.max_entries);
        let locks = Arc::new(StudentLockTable::new(Duration::from_millis(spec.mastery.lock_timeout_ms)));

        let pipeline = MasteryUpdatePipeline::new(
            repositories.modules,
            ledger.clone(),
            propagation.clone(),
            profiles.clone(),
            sessions.clone(),
            locks.clone(),
            event_bus.clone(),
            PipelinePolicy::from(&spec.mastery),
        );

        Self {
            tree,
            ledger,
            propagation,
            profiles,
            sessions,
            pipeline,
            locks,
            event_bus,
        }
    }

    /// Services over fresh in-memory stores.
    pub fn in_memory(spec: &ScholarConfigSpec) -> Self {
        Self::new(Repositories::in_memory(), spec, EventBus::with_default_capacity())
    }
}
