// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::mastery::{MasteryStatus, StudentId};
use crate::domain::module::{ModuleId, PublicationStatus, ResourceId};
use crate::domain::profile::ProfileEntryKind;
use crate::domain::signal::SignalSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModuleTreeEvent {
    ModuleCreated {
        module_id: ModuleId,
        parent_id: Option<ModuleId>,
        depth: u8,
        created_at: DateTime<Utc>,
    },
    SubtreeDeleted {
        root_id: ModuleId,
        removed_modules: usize,
        deleted_at: DateTime<Utc>,
    },
    ResourceAttached {
        module_id: ModuleId,
        resource_id: ResourceId,
        attached_at: DateTime<Utc>,
    },
    PublicationChanged {
        module_id: ModuleId,
        status: PublicationStatus,
        changed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MasteryEvent {
    /// A producer signal changed a module's score directly.
    MasteryUpdated {
        student_id: StudentId,
        module_id: ModuleId,
        source: SignalSource,
        previous_score: u8,
        new_score: u8,
        status: MasteryStatus,
        updated_at: DateTime<Utc>,
    },
    /// An ancestor was recomputed from its children.
    AncestorRecomputed {
        student_id: StudentId,
        module_id: ModuleId,
        previous_score: u8,
        new_score: u8,
        status: MasteryStatus,
        recomputed_at: DateTime<Utc>,
    },
    /// A best-effort update failed; the producer's own workflow continued.
    UpdateFailed {
        student_id: StudentId,
        module_id: Option<ModuleId>,
        source: SignalSource,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

impl MasteryEvent {
    pub fn student_id(&self) -> &StudentId {
        match self {
            MasteryEvent::MasteryUpdated { student_id, .. }
            | MasteryEvent::AncestorRecomputed { student_id, .. }
            | MasteryEvent::UpdateFailed { student_id, .. } => student_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProfileEvent {
    InsightRecorded {
        student_id: StudentId,
        subject: String,
        kind: ProfileEntryKind,
        topic: String,
        recorded_at: DateTime<Utc>,
    },
}

impl ProfileEvent {
    pub fn student_id(&self) -> &StudentId {
        match self {
            ProfileEvent::InsightRecorded { student_id, .. } => student_id,
        }
    }
}
