// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Session
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `SessionRepository`; the bounded entry log is
//!   stored as a JSONB document next to the indexed lookup columns

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::mastery::StudentId;
use crate::domain::repository::{RepositoryError, SessionRepository};
use crate::domain::session::{LearningSession, SessionId};

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn save(&self, session: &LearningSession) -> Result<(), RepositoryError> {
        let body = serde_json::to_value(session)?;

        sqlx::query(
            r#"
            INSERT INTO learning_sessions (id, student_id, module_id, started_at, ended_at, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                ended_at = EXCLUDED.ended_at,
                body = EXCLUDED.body
            "#,
        )
        .bind(session.id.0)
        .bind(&session.student_id.0)
        .bind(session.module_id.0)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save session: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<LearningSession>, RepositoryError> {
        let row = sqlx::query("SELECT body FROM learning_sessions WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        match row {
            Some(row) => {
                let body: serde_json::Value = row.get("body");
                Ok(Some(serde_json::from_value(body)?))
            }
            None => Ok(None),
        }
    }

    async fn find_active(&self, student_id: &StudentId) -> Result<Vec<LearningSession>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM learning_sessions
            WHERE student_id = $1 AND ended_at IS NULL
            ORDER BY started_at DESC
            "#,
        )
        .bind(&student_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let body: serde_json::Value = row.get("body");
            sessions.push(serde_json::from_value(body)?);
        }
        Ok(sessions)
    }
}
