// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Mastery
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `MasteryRepository` over the `mastery_records` table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::mastery::{MasteryRecord, MasteryStatus, StudentId};
use crate::domain::module::ModuleId;
use crate::domain::repository::{MasteryRepository, RepositoryError};

const RECORD_COLUMNS: &str = r#"
    student_id, module_id, mastery_score, status, activity_count,
    assessments_completed, time_spent_minutes, last_activity, created_at, updated_at
"#;

pub struct PostgresMasteryRepository {
    pool: PgPool,
}

impl PostgresMasteryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MasteryRepository for PostgresMasteryRepository {
    async fn find(&self, student_id: &StudentId, module_id: ModuleId) -> Result<Option<MasteryRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM mastery_records WHERE student_id = $1 AND module_id = $2",
            RECORD_COLUMNS
        ))
        .bind(&student_id.0)
        .bind(module_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_record_row).transpose()
    }

    async fn find_many(
        &self,
        student_id: &StudentId,
        module_ids: &[ModuleId],
    ) -> Result<Vec<MasteryRecord>, RepositoryError> {
        let raw: Vec<Uuid> = module_ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM mastery_records WHERE student_id = $1 AND module_id = ANY($2)",
            RECORD_COLUMNS
        ))
        .bind(&student_id.0)
        .bind(&raw)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    async fn save(&self, record: &MasteryRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO mastery_records (
                student_id, module_id, mastery_score, status, activity_count,
                assessments_completed, time_spent_minutes, last_activity, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (student_id, module_id) DO UPDATE SET
                mastery_score = EXCLUDED.mastery_score,
                status = EXCLUDED.status,
                activity_count = EXCLUDED.activity_count,
                assessments_completed = EXCLUDED.assessments_completed,
                time_spent_minutes = EXCLUDED.time_spent_minutes,
                last_activity = EXCLUDED.last_activity,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.student_id.0)
        .bind(record.module_id.0)
        .bind(i16::from(record.score()))
        .bind(record.status().as_str())
        .bind(record.activity_count as i32)
        .bind(record.assessments_completed as i32)
        .bind(record.time_spent_minutes as i32)
        .bind(record.last_activity)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            // The module was deleted under us.
            Some(db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound(format!("Module {} not found", record.module_id))
            }
            _ => RepositoryError::Database(format!("Failed to save mastery record: {}", e)),
        })?;

        Ok(())
    }

    async fn find_by_student(&self, student_id: &StudentId) -> Result<Vec<MasteryRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM mastery_records WHERE student_id = $1 ORDER BY created_at ASC",
            RECORD_COLUMNS
        ))
        .bind(&student_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }
}

fn parse_record_row(row: sqlx::postgres::PgRow) -> Result<MasteryRecord, RepositoryError> {
    let student_id: String = row.get("student_id");
    let module_id: Uuid = row.get("module_id");
    let score: i16 = row.get("mastery_score");
    let status_raw: String = row.get("status");
    let activity_count: i32 = row.get("activity_count");
    let assessments_completed: i32 = row.get("assessments_completed");
    let time_spent_minutes: i32 = row.get("time_spent_minutes");
    let last_activity: Option<DateTime<Utc>> = row.get("last_activity");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    let status = MasteryStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Serialization(format!("Unknown mastery status: {}", status_raw)))?;

    Ok(MasteryRecord::restore(
        StudentId(student_id),
        ModuleId(module_id),
        score.clamp(0, 100) as u8,
        status,
        activity_count.max(0) as u32,
        assessments_completed.max(0) as u32,
        time_spent_minutes.max(0) as u32,
        last_activity,
        created_at,
        updated_at,
    ))
}
