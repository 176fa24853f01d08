// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Module Tree Application Service
//!
//! Orchestrates structural operations on module trees, coordinating:
//! - Domain layer: Module aggregate and its structural invariants
//! - Infrastructure layer: ModuleRepository
//! - Event bus: Publishing ModuleTreeEvents for observability
//!
//! Tree walks are explicit loops with a visited set; a cycle, a dangling
//! reference or a parent/child disagreement surfaces as `CorruptTree`.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::error::MasteryError;
use crate::domain::events::ModuleTreeEvent;
use crate::domain::module::{Module, ModuleDraft, ModuleId, ModuleResource, PublicationStatus};
use crate::domain::repository::{ModuleRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

/// A nested module tree as produced by the tree-generation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTreeNode {
    #[serde(flatten)]
    pub draft: ModuleDraft,
    #[serde(default)]
    pub children: Vec<ModuleTreeNode>,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait ModuleTreeService: Send + Sync {
    /// Create a module under `parent_id`, or a new root when `None`.
    async fn create(&self, draft: ModuleDraft, parent_id: Option<ModuleId>) -> Result<Module, MasteryError>;

    /// Create a whole nested tree top-down. Returns the created modules in
    /// creation order (root first).
    async fn import_tree(&self, tree: ModuleTreeNode, parent_id: Option<ModuleId>) -> Result<Vec<Module>, MasteryError>;

    async fn get(&self, id: ModuleId) -> Result<Module, MasteryError>;

    /// Direct children in their stored order.
    async fn children_of(&self, id: ModuleId) -> Result<Vec<Module>, MasteryError>;

    /// The module followed by each ancestor up to its root.
    async fn path_to_root(&self, id: ModuleId) -> Result<Vec<Module>, MasteryError>;

    /// The module and all its descendants, breadth-first.
    async fn subtree(&self, id: ModuleId) -> Result<Vec<Module>, MasteryError>;

    /// Remove a module with all descendants, their resources and mastery
    /// records. Returns the number of modules removed.
    async fn delete_subtree(&self, id: ModuleId) -> Result<usize, MasteryError>;

    async fn roots(&self) -> Result<Vec<Module>, MasteryError>;

    async fn attach_resource(&self, resource: ModuleResource) -> Result<ModuleResource, MasteryError>;

    async fn list_resources(&self, module_id: ModuleId) -> Result<Vec<ModuleResource>, MasteryError>;

    async fn set_publication(&self, id: ModuleId, status: PublicationStatus) -> Result<Module, MasteryError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardModuleTreeService {
    repository: Arc<dyn ModuleRepository>,
    event_bus: EventBus,
    max_depth: u8,
}

impl StandardModuleTreeService {
    pub fn new(repository: Arc<dyn ModuleRepository>, event_bus: EventBus, max_depth: u8) -> Self {
        Self {
            repository,
            event_bus,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    async fn load_children(&self, parent: &Module) -> Result<Vec<Module>, MasteryError> {
        let children = self.repository.find_many(parent.children_ids()).await?;
        if children.len() != parent.children_ids().len() {
            let found: HashSet<ModuleId> = children.iter().map(|c| c.id).collect();
            let missing = parent
                .children_ids()
                .iter()
                .find(|id| !found.contains(id))
                .copied();
            return Err(MasteryError::corrupt(
                parent.id,
                match missing {
                    Some(id) => format!("dangling child reference {}", id),
                    None => "duplicate child reference".to_string(),
                },
            ));
        }
        for child in &children {
            if child.parent_id != Some(parent.id) {
                return Err(MasteryError::corrupt(
                    child.id,
                    format!("listed as child of {} but points at {:?}", parent.id, child.parent_id),
                ));
            }
        }
        Ok(children)
    }
}

#[async_trait]
impl ModuleTreeService for StandardModuleTreeService {
    async fn create(&self, draft: ModuleDraft, parent_id: Option<ModuleId>) -> Result<Module, MasteryError> {
        let module = match parent_id {
            None => {
                let root = Module::new_root(draft);
                self.repository.save(&root).await?;
                root
            }
            Some(pid) => {
                let parent = self
                    .repository
                    .find_by_id(pid)
                    .await?
                    .ok_or(MasteryError::ParentNotFound(pid))?;
                let child = Module::new_child(draft, &parent, self.max_depth)?;
                // The child list is appended to the stored parent, not to this copy.
                self.repository.insert_child(&child).await.map_err(|e| match e {
                    RepositoryError::NotFound(_) => MasteryError::ParentNotFound(pid),
                    other => other.into(),
                })?;
                child
            }
        };

        info!(
            module_id = %module.id,
            parent_id = ?module.parent_id,
            depth = module.depth(),
            "Created module '{}'",
            module.title
        );
        self.event_bus.publish_tree_event(ModuleTreeEvent::ModuleCreated {
            module_id: module.id,
            parent_id: module.parent_id,
            depth: module.depth(),
            created_at: module.created_at,
        });
        Ok(module)
    }

    async fn import_tree(&self, tree: ModuleTreeNode, parent_id: Option<ModuleId>) -> Result<Vec<Module>, MasteryError> {
        let mut created = Vec::new();
        let mut stack = vec![(tree, parent_id)];

        // Children are pushed in reverse so they are created, and adopted, in
        // document order.
        while let Some((node, parent)) = stack.pop() {
            let module = self.create(node.draft, parent).await?;
            for child in node.children.into_iter().rev() {
                stack.push((child, Some(module.id)));
            }
            created.push(module);
        }

        debug!("Imported {} modules", created.len());
        Ok(created)
    }

    async fn get(&self, id: ModuleId) -> Result<Module, MasteryError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(MasteryError::ModuleNotFound(id))
    }

    async fn children_of(&self, id: ModuleId) -> Result<Vec<Module>, MasteryError> {
        let parent = self.get(id).await?;
        self.load_children(&parent).await
    }

    async fn path_to_root(&self, id: ModuleId) -> Result<Vec<Module>, MasteryError> {
        let start = self.get(id).await?;
        let mut visited = HashSet::from([start.id]);
        let mut path = vec![start];

        loop {
            let current = &path[path.len() - 1];
            let Some(parent_id) = current.parent_id else {
                break;
            };
            if !visited.insert(parent_id) {
                return Err(MasteryError::corrupt(parent_id, "cycle in parent chain"));
            }
            let child_id = current.id;
            let parent = self.repository.find_by_id(parent_id).await?.ok_or_else(|| {
                MasteryError::corrupt(child_id, format!("dangling parent reference {}", parent_id))
            })?;
            path.push(parent);
        }

        Ok(path)
    }

    async fn subtree(&self, id: ModuleId) -> Result<Vec<Module>, MasteryError> {
        let root = self.get(id).await?;
        let mut visited = HashSet::from([root.id]);
        let mut queue = VecDeque::from([root]);
        let mut ordered = Vec::new();

        while let Some(module) = queue.pop_front() {
            for child in self.load_children(&module).await? {
                if !visited.insert(child.id) {
                    return Err(MasteryError::corrupt(child.id, "module reachable twice in subtree"));
                }
                queue.push_back(child);
            }
            ordered.push(module);
        }

        Ok(ordered)
    }

    async fn delete_subtree(&self, id: ModuleId) -> Result<usize, MasteryError> {
        // Structural check only; the repository removes whatever is below
        // `id` when the delete runs.
        let modules = self.subtree(id).await?;
        if let Some(pid) = modules[0].parent_id {
            if self.repository.find_by_id(pid).await?.is_none() {
                return Err(MasteryError::corrupt(id, format!("dangling parent reference {}", pid)));
            }
        }

        let removed = self.repository.delete_subtree(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => MasteryError::ModuleNotFound(id),
            other => other.into(),
        })?;

        info!(module_id = %id, removed, "Deleted module subtree");
        self.event_bus.publish_tree_event(ModuleTreeEvent::SubtreeDeleted {
            root_id: id,
            removed_modules: removed,
            deleted_at: Utc::now(),
        });
        Ok(removed)
    }

    async fn roots(&self) -> Result<Vec<Module>, MasteryError> {
        Ok(self.repository.find_roots().await?)
    }

    async fn attach_resource(&self, resource: ModuleResource) -> Result<ModuleResource, MasteryError> {
        self.get(resource.module_id).await?;
        self.repository.save_resource(&resource).await?;

        debug!(module_id = %resource.module_id, "Attached {} resource '{}'", resource.resource_type.as_str(), resource.title);
        self.event_bus.publish_tree_event(ModuleTreeEvent::ResourceAttached {
            module_id: resource.module_id,
            resource_id: resource.id,
            attached_at: resource.created_at,
        });
        Ok(resource)
    }

    async fn list_resources(&self, module_id: ModuleId) -> Result<Vec<ModuleResource>, MasteryError> {
        self.get(module_id).await?;
        Ok(self.repository.find_resources(module_id).await?)
    }

    async fn set_publication(&self, id: ModuleId, status: PublicationStatus) -> Result<Module, MasteryError> {
        let module = self
            .repository
            .set_status(id, status)
            .await?
            .ok_or(MasteryError::ModuleNotFound(id))?;

        info!(module_id = %id, "Module publication set to {}", status.as_str());
        self.event_bus.publish_tree_event(ModuleTreeEvent::PublicationChanged {
            module_id: id,
            status,
            changed_at: module.updated_at,
        });
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::module::ResourceType;
    use crate::infrastructure::repositories::InMemoryModuleRepository;

    fn service() -> (StandardModuleTreeService, Arc<InMemoryModuleRepository>) {
        let repo = Arc::new(InMemoryModuleRepository::new());
        (StandardModuleTreeService::new(repo.clone(), EventBus::new(16), 4), repo)
    }

    #[tokio::test]
    async fn test_create_child_flips_parent_leaf_flag() {
        let (tree, _) = service();
        let root = tree.create(ModuleDraft::new("Math", "Algebra"), None).await.unwrap();
        assert!(root.is_leaf());

        let child = tree.create(ModuleDraft::new("Math", "Lines"), Some(root.id)).await.unwrap();
        let root = tree.get(root.id).await.unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.children_ids(), &[child.id]);
    }

    #[tokio::test]
    async fn test_create_under_missing_parent() {
        let (tree, _) = service();
        let missing = ModuleId::new();
        let err = tree.create(ModuleDraft::new("Math", "Orphan"), Some(missing)).await.unwrap_err();
        assert!(matches!(err, MasteryError::ParentNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_depth_exceeded_leaves_parent_untouched() {
        let (tree, _) = service();
        let mut parent = tree.create(ModuleDraft::new("Math", "L0"), None).await.unwrap();
        for level in 1..4 {
            parent = tree
                .create(ModuleDraft::new("Math", format!("L{}", level)), Some(parent.id))
                .await
                .unwrap();
        }
        let err = tree.create(ModuleDraft::new("Math", "L4"), Some(parent.id)).await.unwrap_err();
        assert!(matches!(err, MasteryError::DepthExceeded { .. }));
        assert!(tree.get(parent.id).await.unwrap().is_leaf());
    }

    #[tokio::test]
    async fn test_import_preserves_document_order() {
        let (tree, _) = service();
        let node = ModuleTreeNode {
            draft: ModuleDraft::new("Science", "Biology"),
            children: vec![
                ModuleTreeNode {
                    draft: ModuleDraft::new("Science", "Cells"),
                    children: vec![ModuleTreeNode {
                        draft: ModuleDraft::new("Science", "Organelles"),
                        children: vec![],
                    }],
                },
                ModuleTreeNode {
                    draft: ModuleDraft::new("Science", "Genetics"),
                    children: vec![],
                },
            ],
        };

        let created = tree.import_tree(node, None).await.unwrap();
        assert_eq!(created.len(), 4);
        let titles: Vec<String> = tree
            .children_of(created[0].id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["Cells", "Genetics"]);
    }

    #[tokio::test]
    async fn test_path_to_root_is_leaf_first() {
        let (tree, _) = service();
        let root = tree.create(ModuleDraft::new("Math", "R"), None).await.unwrap();
        let mid = tree.create(ModuleDraft::new("Math", "M"), Some(root.id)).await.unwrap();
        let leaf = tree.create(ModuleDraft::new("Math", "L"), Some(mid.id)).await.unwrap();

        let ids: Vec<ModuleId> = tree.path_to_root(leaf.id).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![leaf.id, mid.id, root.id]);
    }

    #[tokio::test]
    async fn test_path_to_root_detects_cycle() {
        let (tree, repo) = service();
        let a = ModuleId::new();
        let b = ModuleId::new();
        let now = Utc::now();
        let draft = || ModuleDraft::new("Math", "x");
        repo.save(&Module::restore(a, Some(b), vec![b], 1, draft(), PublicationStatus::Draft, now, now))
            .await
            .unwrap();
        repo.save(&Module::restore(b, Some(a), vec![a], 1, draft(), PublicationStatus::Draft, now, now))
            .await
            .unwrap();

        let err = tree.path_to_root(a).await.unwrap_err();
        assert!(matches!(err, MasteryError::CorruptTree { .. }));
    }

    #[tokio::test]
    async fn test_path_to_root_detects_dangling_parent() {
        let (tree, repo) = service();
        let orphan = Module::restore(
            ModuleId::new(),
            Some(ModuleId::new()),
            vec![],
            1,
            ModuleDraft::new("Math", "orphan"),
            PublicationStatus::Draft,
            Utc::now(),
            Utc::now(),
        );
        repo.save(&orphan).await.unwrap();
        assert!(matches!(
            tree.path_to_root(orphan.id).await.unwrap_err(),
            MasteryError::CorruptTree { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_subtree_restores_leaf_parent() {
        let (tree, _) = service();
        let root = tree.create(ModuleDraft::new("Math", "R"), None).await.unwrap();
        let a = tree.create(ModuleDraft::new("Math", "A"), Some(root.id)).await.unwrap();
        let a1 = tree.create(ModuleDraft::new("Math", "A1"), Some(a.id)).await.unwrap();
        tree.attach_resource(ModuleResource::new(a1.id, ResourceType::Video, "Clip", 0))
            .await
            .unwrap();

        assert_eq!(tree.delete_subtree(a.id).await.unwrap(), 2);
        assert!(matches!(tree.get(a1.id).await, Err(MasteryError::ModuleNotFound(_))));
        assert!(tree.get(root.id).await.unwrap().is_leaf());
        assert!(matches!(
            tree.list_resources(a1.id).await,
            Err(MasteryError::ModuleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_publication() {
        let (tree, _) = service();
        let root = tree.create(ModuleDraft::new("Math", "R"), None).await.unwrap();
        let updated = tree.set_publication(root.id, PublicationStatus::Published).await.unwrap();
        assert_eq!(updated.status, PublicationStatus::Published);
        assert_eq!(tree.roots().await.unwrap().len(), 1);
    }
}
