// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning-module tree entities
//!
//! A course is a tree of [`Module`]s: the root is the whole course, leaves are
//! the directly learnable and assessable units. Trees are generated top-down,
//! so a parent always exists before its children are created.
//!
//! Structural invariants owned here:
//! - `depth == parent.depth + 1` (roots have depth 0)
//! - `is_leaf` iff `children_ids` is empty
//! - `children_ids` is an ordered set (no duplicates)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::MasteryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub Uuid);

impl ModuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ModuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of the teacher that owns a module tree (issued by the
/// surrounding application).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeacherId(pub String);

impl From<&str> for TeacherId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PublicationStatus::Draft),
            "published" => Some(PublicationStatus::Published),
            _ => None,
        }
    }
}

/// Content of a module as supplied by tree generation.
///
/// Titles and objectives are not validated; only structure is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleDraft {
    pub teacher_id: Option<TeacherId>,
    pub subject: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<u32>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub visualization: Option<serde_json::Value>,
}

impl ModuleDraft {
    pub fn new(subject: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub teacher_id: Option<TeacherId>,
    pub subject: String,
    pub title: String,
    pub description: String,
    pub parent_id: Option<ModuleId>,
    children_ids: Vec<ModuleId>,
    depth: u8,
    is_leaf: bool,
    pub learning_objectives: Vec<String>,
    pub estimated_duration_minutes: Option<u32>,
    pub status: PublicationStatus,
    /// Teacher-authored instructions handed to the tutoring agent.
    pub custom_prompt: Option<String>,
    /// Opaque layout hints for the tree view.
    pub visualization: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn new_root(draft: ModuleDraft) -> Self {
        Self::build(draft, None, 0)
    }

    /// Create a child one level below `parent`.
    ///
    /// `max_depth` is the number of levels a tree may have, so valid depths
    /// are `0..max_depth`.
    pub fn new_child(draft: ModuleDraft, parent: &Module, max_depth: u8) -> Result<Self, MasteryError> {
        let depth = parent.depth.saturating_add(1);
        if depth >= max_depth {
            return Err(MasteryError::DepthExceeded {
                parent_id: parent.id,
                depth,
                max_depth,
            });
        }
        Ok(Self::build(draft, Some(parent.id), depth))
    }

    fn build(draft: ModuleDraft, parent_id: Option<ModuleId>, depth: u8) -> Self {
        let now = Utc::now();
        Self {
            id: ModuleId::new(),
            teacher_id: draft.teacher_id,
            subject: draft.subject,
            title: draft.title,
            description: draft.description,
            parent_id,
            children_ids: Vec::new(),
            depth,
            is_leaf: true,
            learning_objectives: draft.learning_objectives,
            estimated_duration_minutes: draft.estimated_duration_minutes,
            status: PublicationStatus::Draft,
            custom_prompt: draft.custom_prompt,
            visualization: draft.visualization,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a module from storage. Structural fields are trusted as stored;
    /// `is_leaf` is derived from the child list.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ModuleId,
        parent_id: Option<ModuleId>,
        children_ids: Vec<ModuleId>,
        depth: u8,
        draft: ModuleDraft,
        status: PublicationStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let is_leaf = children_ids.is_empty();
        Self {
            id,
            teacher_id: draft.teacher_id,
            subject: draft.subject,
            title: draft.title,
            description: draft.description,
            parent_id,
            children_ids,
            depth,
            is_leaf,
            learning_objectives: draft.learning_objectives,
            estimated_duration_minutes: draft.estimated_duration_minutes,
            status,
            custom_prompt: draft.custom_prompt,
            visualization: draft.visualization,
            created_at,
            updated_at,
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn children_ids(&self) -> &[ModuleId] {
        &self.children_ids
    }

    /// Register `child` as the last child of this module.
    pub fn adopt_child(&mut self, child: ModuleId) {
        if !self.children_ids.contains(&child) {
            self.children_ids.push(child);
        }
        self.is_leaf = false;
        self.updated_at = Utc::now();
    }

    /// Detach `child`. A module whose last child is removed becomes a leaf.
    pub fn remove_child(&mut self, child: ModuleId) -> bool {
        let before = self.children_ids.len();
        self.children_ids.retain(|c| *c != child);
        let removed = self.children_ids.len() != before;
        if removed {
            self.is_leaf = self.children_ids.is_empty();
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Take the child list of the stored copy; attribute writes never edit
    /// structure.
    pub(crate) fn keep_children_of(&mut self, stored: &Module) {
        self.children_ids = stored.children_ids.clone();
        self.is_leaf = stored.is_leaf;
    }

    pub fn set_status(&mut self, status: PublicationStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Content fields as a draft (used by storage adapters).
    pub fn to_draft(&self) -> ModuleDraft {
        ModuleDraft {
            teacher_id: self.teacher_id.clone(),
            subject: self.subject.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            learning_objectives: self.learning_objectives.clone(),
            estimated_duration_minutes: self.estimated_duration_minutes,
            custom_prompt: self.custom_prompt.clone(),
            visualization: self.visualization.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Video,
    Pdf,
    Link,
    Document,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Video => "video",
            ResourceType::Pdf => "pdf",
            ResourceType::Link => "link",
            ResourceType::Document => "document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(ResourceType::Video),
            "pdf" => Some(ResourceType::Pdf),
            "link" => Some(ResourceType::Link),
            "document" => Some(ResourceType::Document),
            _ => None,
        }
    }
}

/// Learning material a teacher attached to a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResource {
    pub id: ResourceId,
    pub module_id: ModuleId,
    pub resource_type: ResourceType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: Option<String>,
    pub duration_minutes: Option<u32>,
    /// Display position within the module.
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

impl ModuleResource {
    pub fn new(module_id: ModuleId, resource_type: ResourceType, title: impl Into<String>, order: u32) -> Self {
        Self {
            id: ResourceId::new(),
            module_id,
            resource_type,
            title: title.into(),
            description: String::new(),
            url: None,
            duration_minutes: None,
            order,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_module_depth_0() {
        let root = Module::new_root(ModuleDraft::new("Math", "Algebra I"));
        assert_eq!(root.depth(), 0);
        assert!(root.is_root());
        assert!(root.is_leaf());
        assert_eq!(root.status, PublicationStatus::Draft);
    }

    #[test]
    fn test_child_depth_is_parent_plus_one() {
        let root = Module::new_root(ModuleDraft::new("Math", "Algebra I"));
        let child = Module::new_child(ModuleDraft::new("Math", "Linear equations"), &root, 4).unwrap();
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent_id, Some(root.id));
    }

    #[test]
    fn test_depth_limit_enforcement() {
        let root = Module::new_root(ModuleDraft::new("Math", "L0"));
        let l1 = Module::new_child(ModuleDraft::new("Math", "L1"), &root, 4).unwrap();
        let l2 = Module::new_child(ModuleDraft::new("Math", "L2"), &l1, 4).unwrap();
        let l3 = Module::new_child(ModuleDraft::new("Math", "L3"), &l2, 4).unwrap();
        assert_eq!(l3.depth(), 3);

        let err = Module::new_child(ModuleDraft::new("Math", "L4"), &l3, 4).unwrap_err();
        assert!(matches!(err, MasteryError::DepthExceeded { depth: 4, max_depth: 4, .. }));
    }

    #[test]
    fn test_adopt_and_remove_child_toggle_leaf() {
        let mut root = Module::new_root(ModuleDraft::new("Math", "Algebra I"));
        let a = ModuleId::new();
        let b = ModuleId::new();

        root.adopt_child(a);
        root.adopt_child(b);
        root.adopt_child(a);
        assert!(!root.is_leaf());
        assert_eq!(root.children_ids(), &[a, b]);

        assert!(root.remove_child(a));
        assert!(!root.is_leaf());
        assert!(root.remove_child(b));
        assert!(root.is_leaf());
        assert!(!root.remove_child(b));
    }

    #[test]
    fn test_restore_derives_leaf_flag() {
        let child = ModuleId::new();
        let module = Module::restore(
            ModuleId::new(),
            None,
            vec![child],
            0,
            ModuleDraft::new("Science", "Cells"),
            PublicationStatus::Published,
            Utc::now(),
            Utc::now(),
        );
        assert!(!module.is_leaf());
        assert_eq!(module.status, PublicationStatus::Published);
    }

    #[test]
    fn test_module_id_parse() {
        let id = ModuleId::new();
        let parsed: ModuleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ModuleId>().is_err());
    }
}
