// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning Profile Application Service
//!
//! Appends insights to per-`(student, subject)` profiles and renders the
//! summary handed to the tutoring agent. Profiles are independent of the
//! module tree; no propagation happens here.

use std::sync::Arc;
use tracing::info;

use crate::domain::error::MasteryError;
use crate::domain::events::ProfileEvent;
use crate::domain::mastery::StudentId;
use crate::domain::profile::{LearningProfile, ProfileInsight, ProfileSummary};
use crate::domain::repository::ProfileRepository;
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct LearningProfileService {
    repository: Arc<dyn ProfileRepository>,
    event_bus: EventBus,
}

impl LearningProfileService {
    pub fn new(repository: Arc<dyn ProfileRepository>, event_bus: EventBus) -> Self {
        Self { repository, event_bus }
    }

    /// Append one insight, creating the profile on first use.
    pub async fn append(
        &self,
        student_id: &StudentId,
        subject: &str,
        insight: ProfileInsight,
    ) -> Result<LearningProfile, MasteryError> {
        let kind = insight.kind();
        let topic = insight.subject_text().to_string();
        let profile = self.repository.append(student_id, subject, insight).await?;

        info!(
            student_id = %student_id,
            subject,
            entries = profile.entry_count(),
            "Recorded {:?} insight '{}'",
            kind,
            topic
        );
        self.event_bus.publish_profile_event(ProfileEvent::InsightRecorded {
            student_id: student_id.clone(),
            subject: subject.to_string(),
            kind,
            topic,
            recorded_at: profile.last_updated,
        });
        Ok(profile)
    }

    /// The stored profile, or an empty one when nothing was recorded yet.
    pub async fn get(&self, student_id: &StudentId, subject: &str) -> Result<LearningProfile, MasteryError> {
        Ok(self
            .repository
            .find(student_id, subject)
            .await?
            .unwrap_or_else(|| LearningProfile::new(student_id.clone(), subject)))
    }

    pub async fn summary(&self, student_id: &StudentId, subject: &str) -> Result<ProfileSummary, MasteryError> {
        Ok(self.get(student_id, subject).await?.summary())
    }

    /// Update the informational fields; entries are left as stored.
    pub async fn set_learning_style(
        &self,
        student_id: &StudentId,
        subject: &str,
        learning_style: Option<String>,
        pace: Option<String>,
    ) -> Result<LearningProfile, MasteryError> {
        let mut profile = self.get(student_id, subject).await?;
        profile.learning_style = learning_style;
        profile.pace = pace;
        profile.last_updated = chrono::Utc::now();
        self.repository.save(&profile).await?;
        Ok(profile)
    }

    pub async fn profiles_for(&self, student_id: &StudentId) -> Result<Vec<LearningProfile>, MasteryError> {
        Ok(self.repository.find_by_student(student_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::event_bus::DomainEvent;
    use crate::infrastructure::repositories::InMemoryProfileRepository;

    #[tokio::test]
    async fn test_append_publishes_insight_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let service = LearningProfileService::new(Arc::new(InMemoryProfileRepository::new()), bus);
        let student = StudentId::from("s-1");

        service
            .append(
                &student,
                "Math",
                ProfileInsight::Weakness {
                    topic: "fractions".to_string(),
                    confidence: Some(0.3),
                    notes: String::new(),
                },
            )
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            DomainEvent::Profile(ProfileEvent::InsightRecorded { topic, subject, .. }) => {
                assert_eq!(topic, "fractions");
                assert_eq!(subject, "Math");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_learning_style_survives_later_appends() {
        let service = LearningProfileService::new(Arc::new(InMemoryProfileRepository::new()), EventBus::new(8));
        let student = StudentId::from("s-2");

        service
            .set_learning_style(&student, "Science", Some("visual".to_string()), Some("steady".to_string()))
            .await
            .unwrap();
        service
            .append(&student, "Science", ProfileInsight::MistakePattern { pattern: "units".to_string() })
            .await
            .unwrap();

        let profile = service.get(&student, "Science").await.unwrap();
        assert_eq!(profile.learning_style.as_deref(), Some("visual"));
        assert_eq!(profile.mistake_patterns.len(), 1);
        assert!(service.summary(&student, "Science").await.unwrap().to_string().contains("units"));
    }
}
