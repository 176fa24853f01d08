// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Module
//!
//! PostgreSQL persistence for module trees and their attached resources.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `ModuleRepository` over the `modules` and
//!   `module_resources` tables

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::module::{
    Module, ModuleDraft, ModuleId, ModuleResource, PublicationStatus, ResourceId, ResourceType, TeacherId,
};
use crate::domain::repository::{ModuleRepository, RepositoryError};

const MODULE_COLUMNS: &str = r#"
    id, teacher_id, subject, title, description, parent_id, children_ids, depth,
    learning_objectives, estimated_duration_minutes, status, custom_prompt,
    visualization, created_at, updated_at
"#;

// children_ids is written on insert only; after that it changes through
// insert_child and delete_subtree.
const UPSERT_MODULE: &str = r#"
    INSERT INTO modules (
        id, teacher_id, subject, title, description, parent_id, children_ids, depth,
        learning_objectives, estimated_duration_minutes, status, custom_prompt,
        visualization, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
    ON CONFLICT (id) DO UPDATE SET
        teacher_id = EXCLUDED.teacher_id,
        subject = EXCLUDED.subject,
        title = EXCLUDED.title,
        description = EXCLUDED.description,
        learning_objectives = EXCLUDED.learning_objectives,
        estimated_duration_minutes = EXCLUDED.estimated_duration_minutes,
        status = EXCLUDED.status,
        custom_prompt = EXCLUDED.custom_prompt,
        visualization = EXCLUDED.visualization,
        updated_at = EXCLUDED.updated_at
"#;

pub struct PostgresModuleRepository {
    pool: PgPool,
}

impl PostgresModuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn upsert_module<'e, E>(executor: E, module: &Module) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let objectives = serde_json::to_value(&module.learning_objectives)?;
    let children: Vec<Uuid> = module.children_ids().iter().map(|c| c.0).collect();

    sqlx::query(UPSERT_MODULE)
        .bind(module.id.0)
        .bind(module.teacher_id.as_ref().map(|t| t.0.clone()))
        .bind(&module.subject)
        .bind(&module.title)
        .bind(&module.description)
        .bind(module.parent_id.map(|p| p.0))
        .bind(children)
        .bind(i16::from(module.depth()))
        .bind(objectives)
        .bind(module.estimated_duration_minutes.map(|m| m as i32))
        .bind(module.status.as_str())
        .bind(&module.custom_prompt)
        .bind(&module.visualization)
        .bind(module.created_at)
        .bind(module.updated_at)
        .execute(executor)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save module {}: {}", module.id, e)))?;

    Ok(())
}

#[async_trait]
impl ModuleRepository for PostgresModuleRepository {
    async fn save(&self, module: &Module) -> Result<(), RepositoryError> {
        upsert_module(&self.pool, module).await
    }

    async fn insert_child(&self, child: &Module) -> Result<Module, RepositoryError> {
        let parent_id = child
            .parent_id
            .ok_or_else(|| RepositoryError::Unknown(format!("Module {} has no parent", child.id)))?;
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serializes concurrent appends to one parent.
        let row = sqlx::query(&format!(
            r#"
            UPDATE modules
            SET children_ids = array_append(array_remove(children_ids, $1), $1),
                updated_at = $3
            WHERE id = $2
            RETURNING {}
            "#,
            MODULE_COLUMNS
        ))
        .bind(child.id.0)
        .bind(parent_id.0)
        .bind(child.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to update parent {}: {}", parent_id, e)))?;

        let Some(row) = row else {
            return Err(RepositoryError::NotFound(format!("Module {} not found", parent_id)));
        };
        let parent = parse_module_row(row)?;

        upsert_module(&mut *tx, child).await?;
        tx.commit().await?;
        Ok(parent)
    }

    async fn find_by_id(&self, id: ModuleId) -> Result<Option<Module>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM modules WHERE id = $1", MODULE_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_module_row).transpose()
    }

    async fn find_many(&self, ids: &[ModuleId]) -> Result<Vec<Module>, RepositoryError> {
        let raw: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(&format!("SELECT {} FROM modules WHERE id = ANY($1)", MODULE_COLUMNS))
            .bind(&raw)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut found = Vec::with_capacity(rows.len());
        for row in rows {
            found.push(parse_module_row(row)?);
        }
        // Keep the caller's order.
        found.sort_by_key(|m| raw.iter().position(|id| *id == m.id.0));
        Ok(found)
    }

    async fn find_roots(&self) -> Result<Vec<Module>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM modules WHERE parent_id IS NULL ORDER BY created_at ASC",
            MODULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut roots = Vec::with_capacity(rows.len());
        for row in rows {
            roots.push(parse_module_row(row)?);
        }
        Ok(roots)
    }

    async fn set_status(&self, id: ModuleId, status: PublicationStatus) -> Result<Option<Module>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE modules SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(id.0)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to update module {}: {}", id, e)))?;

        row.map(parse_module_row).transpose()
    }

    async fn delete_subtree(&self, root: ModuleId) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let parent: Option<Option<Uuid>> = sqlx::query_scalar("SELECT parent_id FROM modules WHERE id = $1 FOR UPDATE")
            .bind(root.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let Some(parent_id) = parent else {
            return Err(RepositoryError::NotFound(format!("Module {} not found", root)));
        };

        if let Some(parent_id) = parent_id {
            let detached = sqlx::query(
                r#"
                UPDATE modules
                SET children_ids = array_remove(children_ids, $1), updated_at = $3
                WHERE id = $2
                "#,
            )
            .bind(root.0)
            .bind(parent_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to detach module {}: {}", root, e)))?;
            if detached.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(format!("Module {} not found", parent_id)));
            }
        }

        // Count before deleting; descendants, resources and mastery records
        // go through the ON DELETE CASCADE foreign keys.
        let removed: i64 = sqlx::query_scalar(
            r#"
            WITH RECURSIVE doomed(id) AS (
                SELECT id FROM modules WHERE id = $1
                UNION
                SELECT m.id FROM modules m JOIN doomed d ON m.parent_id = d.id
            )
            SELECT COUNT(*) FROM doomed
            "#,
        )
        .bind(root.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(root.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to delete module {}: {}", root, e)))?;

        tx.commit().await?;
        Ok(removed.max(0) as usize)
    }

    async fn save_resource(&self, resource: &ModuleResource) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO module_resources (
                id, module_id, resource_type, title, description, url,
                duration_minutes, position, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                resource_type = EXCLUDED.resource_type,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                url = EXCLUDED.url,
                duration_minutes = EXCLUDED.duration_minutes,
                position = EXCLUDED.position
            "#,
        )
        .bind(resource.id.0)
        .bind(resource.module_id.0)
        .bind(resource.resource_type.as_str())
        .bind(&resource.title)
        .bind(&resource.description)
        .bind(&resource.url)
        .bind(resource.duration_minutes.map(|m| m as i32))
        .bind(resource.order as i32)
        .bind(resource.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save resource: {}", e)))?;

        Ok(())
    }

    async fn find_resources(&self, module_id: ModuleId) -> Result<Vec<ModuleResource>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, module_id, resource_type, title, description, url,
                   duration_minutes, position, created_at
            FROM module_resources
            WHERE module_id = $1
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .bind(module_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut resources = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("resource_type");
            let resource_type = ResourceType::parse(&kind)
                .ok_or_else(|| RepositoryError::Serialization(format!("Unknown resource type: {}", kind)))?;
            let duration: Option<i32> = row.get("duration_minutes");
            let position: i32 = row.get("position");
            resources.push(ModuleResource {
                id: ResourceId(row.get("id")),
                module_id: ModuleId(row.get("module_id")),
                resource_type,
                title: row.get("title"),
                description: row.get("description"),
                url: row.get("url"),
                duration_minutes: duration.map(|d| d.max(0) as u32),
                order: position.max(0) as u32,
                created_at: row.get("created_at"),
            });
        }
        Ok(resources)
    }
}

/// Parse a module from a database row
fn parse_module_row(row: sqlx::postgres::PgRow) -> Result<Module, RepositoryError> {
    let id: Uuid = row.get("id");
    let teacher_id: Option<String> = row.get("teacher_id");
    let parent_id: Option<Uuid> = row.get("parent_id");
    let children_ids: Vec<Uuid> = row.get("children_ids");
    let depth: i16 = row.get("depth");
    let objectives_val: serde_json::Value = row.get("learning_objectives");
    let duration: Option<i32> = row.get("estimated_duration_minutes");
    let status_raw: String = row.get("status");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    let learning_objectives: Vec<String> = serde_json::from_value(objectives_val)
        .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize learning_objectives: {}", e)))?;
    let status = PublicationStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Serialization(format!("Unknown publication status: {}", status_raw)))?;
    let depth = u8::try_from(depth)
        .map_err(|_| RepositoryError::Serialization(format!("Module {} has invalid depth {}", id, depth)))?;

    let draft = ModuleDraft {
        teacher_id: teacher_id.map(TeacherId),
        subject: row.get("subject"),
        title: row.get("title"),
        description: row.get("description"),
        learning_objectives,
        estimated_duration_minutes: duration.map(|d| d.max(0) as u32),
        custom_prompt: row.get("custom_prompt"),
        visualization: row.get("visualization"),
    };

    Ok(Module::restore(
        ModuleId(id),
        parent_id.map(ModuleId),
        children_ids.into_iter().map(ModuleId).collect(),
        depth,
        draft,
        status,
        created_at,
        updated_at,
    ))
}
