// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod module_tree;
pub mod ledger;
pub mod propagation;
pub mod student_locks;
pub mod profile_service;
pub mod session_service;
pub mod update_pipeline;
pub mod repository_factory;
pub mod services;

// Re-export services for convenience
pub use module_tree::{ModuleTreeNode, ModuleTreeService, StandardModuleTreeService};
pub use ledger::{MasteryLedger, ProgressEntry};
pub use propagation::PropagationEngine;
pub use student_locks::{StudentGuard, StudentLockTable};
pub use profile_service::LearningProfileService;
pub use session_service::{LearningSessionService, AGENT_HISTORY_TURNS};
pub use update_pipeline::{MasteryUpdatePipeline, PipelinePolicy};
pub use repository_factory::{create_repositories, Repositories};
pub use services::ScholarServices;
