// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Profile
//!
//! Learning profiles keep their entry lists in JSONB columns. Appends are a
//! single `INSERT .. ON CONFLICT DO UPDATE` concatenating with `||`, so two
//! concurrent appends to one profile both land.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `ProfileRepository` over the `learning_profiles` table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::mastery::StudentId;
use crate::domain::profile::{LearningProfile, ProfileInsight};
use crate::domain::repository::{ProfileRepository, RepositoryError};

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find(&self, student_id: &StudentId, subject: &str) -> Result<Option<LearningProfile>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT student_id, subject, strengths, weaknesses, mistake_patterns,
                   learning_style, pace, created_at, last_updated
            FROM learning_profiles
            WHERE student_id = $1 AND subject = $2
            "#,
        )
        .bind(&student_id.0)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_profile_row).transpose()
    }

    async fn append(
        &self,
        student_id: &StudentId,
        subject: &str,
        insight: ProfileInsight,
    ) -> Result<LearningProfile, RepositoryError> {
        // Render the single new entry through the aggregate so timestamps and
        // defaults match the in-memory path.
        let mut delta = LearningProfile::new(student_id.clone(), subject);
        delta.record(insight);

        let row = sqlx::query(
            r#"
            INSERT INTO learning_profiles (
                student_id, subject, strengths, weaknesses, mistake_patterns,
                created_at, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (student_id, subject) DO UPDATE SET
                strengths = learning_profiles.strengths || EXCLUDED.strengths,
                weaknesses = learning_profiles.weaknesses || EXCLUDED.weaknesses,
                mistake_patterns = learning_profiles.mistake_patterns || EXCLUDED.mistake_patterns,
                last_updated = EXCLUDED.last_updated
            RETURNING student_id, subject, strengths, weaknesses, mistake_patterns,
                      learning_style, pace, created_at, last_updated
            "#,
        )
        .bind(&student_id.0)
        .bind(subject)
        .bind(serde_json::to_value(&delta.strengths)?)
        .bind(serde_json::to_value(&delta.weaknesses)?)
        .bind(serde_json::to_value(&delta.mistake_patterns)?)
        .bind(delta.last_updated)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to append profile entry: {}", e)))?;

        parse_profile_row(row)
    }

    async fn save(&self, profile: &LearningProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO learning_profiles (
                student_id, subject, strengths, weaknesses, mistake_patterns,
                learning_style, pace, created_at, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (student_id, subject) DO UPDATE SET
                learning_style = EXCLUDED.learning_style,
                pace = EXCLUDED.pace,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(&profile.student_id.0)
        .bind(&profile.subject)
        .bind(serde_json::to_value(&profile.strengths)?)
        .bind(serde_json::to_value(&profile.weaknesses)?)
        .bind(serde_json::to_value(&profile.mistake_patterns)?)
        .bind(&profile.learning_style)
        .bind(&profile.pace)
        .bind(profile.created_at)
        .bind(profile.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save profile: {}", e)))?;

        Ok(())
    }

    async fn find_by_student(&self, student_id: &StudentId) -> Result<Vec<LearningProfile>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, subject, strengths, weaknesses, mistake_patterns,
                   learning_style, pace, created_at, last_updated
            FROM learning_profiles
            WHERE student_id = $1
            ORDER BY subject ASC
            "#,
        )
        .bind(&student_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut profiles = Vec::with_capacity(rows.len());
        for row in rows {
            profiles.push(parse_profile_row(row)?);
        }
        Ok(profiles)
    }
}

fn parse_profile_row(row: sqlx::postgres::PgRow) -> Result<LearningProfile, RepositoryError> {
    let student_id: String = row.get("student_id");
    let strengths_val: serde_json::Value = row.get("strengths");
    let weaknesses_val: serde_json::Value = row.get("weaknesses");
    let mistakes_val: serde_json::Value = row.get("mistake_patterns");
    let created_at: DateTime<Utc> = row.get("created_at");
    let last_updated: DateTime<Utc> = row.get("last_updated");

    Ok(LearningProfile {
        student_id: StudentId(student_id),
        subject: row.get("subject"),
        strengths: serde_json::from_value(strengths_val)
            .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize strengths: {}", e)))?,
        weaknesses: serde_json::from_value(weaknesses_val)
            .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize weaknesses: {}", e)))?,
        mistake_patterns: serde_json::from_value(mistakes_val)
            .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize mistake_patterns: {}", e)))?,
        learning_style: row.get("learning_style"),
        pace: row.get("pace"),
        created_at,
        last_updated,
    })
}
