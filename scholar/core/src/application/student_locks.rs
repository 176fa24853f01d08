// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Student Lock Table
//!
//! Per-student mutual exclusion for mastery mutation. One ledger write plus
//! the whole upward propagation walk runs while the student's guard is held;
//! different students never share a lock.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Serialize mastery updates per student with a bounded wait

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::domain::error::MasteryError;
use crate::domain::mastery::StudentId;

/// Held for the duration of one student's update; released on drop.
pub struct StudentGuard {
    student_id: StudentId,
    _guard: OwnedMutexGuard<()>,
}

impl StudentGuard {
    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }
}

pub struct StudentLockTable {
    locks: DashMap<StudentId, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl StudentLockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait up to the configured timeout for exclusive scope over `student_id`.
    pub async fn acquire(&self, student_id: &StudentId) -> Result<StudentGuard, MasteryError> {
        // Clone the Arc while the shard is locked so `prune_idle` sees it in use.
        let lock = self
            .locks
            .entry(student_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(student_id = %student_id, "Acquired student mastery scope");
                Ok(StudentGuard {
                    student_id: student_id.clone(),
                    _guard: guard,
                })
            }
            Err(_) => {
                let waited_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(student_id = %student_id, waited_ms, "Timed out waiting for student mastery scope");
                Err(MasteryError::ConcurrencyConflict {
                    student_id: student_id.clone(),
                    waited_ms,
                })
            }
        }
    }

    /// Drop entries that no task holds or waits on. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for StudentLockTable {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_student_times_out() {
        let table = StudentLockTable::new(Duration::from_millis(20));
        let student = StudentId::from("s-1");

        let _held = table.acquire(&student).await.unwrap();
        let err = table.acquire(&student).await.err().unwrap();
        assert!(matches!(err, MasteryError::ConcurrencyConflict { waited_ms: 20, .. }));
    }

    #[tokio::test]
    async fn test_different_students_do_not_contend() {
        let table = StudentLockTable::new(Duration::from_millis(20));
        let _a = table.acquire(&StudentId::from("a")).await.unwrap();
        let b = table.acquire(&StudentId::from("b")).await.unwrap();
        assert_eq!(b.student_id(), &StudentId::from("b"));
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let table = StudentLockTable::new(Duration::from_millis(20));
        let student = StudentId::from("s-1");
        drop(table.acquire(&student).await.unwrap());
        assert!(table.acquire(&student).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_idle_keeps_held_locks() {
        let table = StudentLockTable::default();
        let held = table.acquire(&StudentId::from("busy")).await.unwrap();
        drop(table.acquire(&StudentId::from("idle")).await.unwrap());
        assert_eq!(table.len(), 2);

        assert_eq!(table.prune_idle(), 1);
        assert_eq!(table.len(), 1);
        drop(held);
        assert_eq!(table.prune_idle(), 1);
        assert!(table.is_empty());
    }
}
