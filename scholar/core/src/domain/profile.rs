// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning profiles
//!
//! Per `(student, subject)` accumulation of strengths, weaknesses and mistake
//! patterns. Entries are appended, never overwritten and never de-duplicated:
//! repeated insights on one topic grow the lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::mastery::StudentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthEntry {
    pub topic: String,
    pub confidence: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessEntry {
    pub topic: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakePattern {
    pub pattern: String,
    pub frequency: u32,
    pub first_seen: DateTime<Utc>,
}

/// A single observation about a student, as produced by a tutoring turn or an
/// assignment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileInsight {
    Strength {
        topic: String,
        confidence: f64,
    },
    Weakness {
        topic: String,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default)]
        notes: String,
    },
    MistakePattern {
        pattern: String,
    },
}

impl ProfileInsight {
    pub fn kind(&self) -> ProfileEntryKind {
        match self {
            ProfileInsight::Strength { .. } => ProfileEntryKind::Strength,
            ProfileInsight::Weakness { .. } => ProfileEntryKind::Weakness,
            ProfileInsight::MistakePattern { .. } => ProfileEntryKind::MistakePattern,
        }
    }

    /// Topic or pattern text the insight is about.
    pub fn subject_text(&self) -> &str {
        match self {
            ProfileInsight::Strength { topic, .. } | ProfileInsight::Weakness { topic, .. } => topic,
            ProfileInsight::MistakePattern { pattern } => pattern,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileEntryKind {
    Strength,
    Weakness,
    MistakePattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    pub student_id: StudentId,
    pub subject: String,
    pub strengths: Vec<StrengthEntry>,
    pub weaknesses: Vec<WeaknessEntry>,
    pub mistake_patterns: Vec<MistakePattern>,
    /// Informational only.
    pub learning_style: Option<String>,
    /// Informational only.
    pub pace: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl LearningProfile {
    pub fn new(student_id: StudentId, subject: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            student_id,
            subject: subject.into(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            mistake_patterns: Vec::new(),
            learning_style: None,
            pace: None,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty() && self.weaknesses.is_empty() && self.mistake_patterns.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.strengths.len() + self.weaknesses.len() + self.mistake_patterns.len()
    }

    /// Append an insight.
    pub fn record(&mut self, insight: ProfileInsight) {
        let now = Utc::now();
        match insight {
            ProfileInsight::Strength { topic, confidence } => self.strengths.push(StrengthEntry {
                topic,
                confidence,
                recorded_at: now,
            }),
            ProfileInsight::Weakness { topic, confidence, notes } => self.weaknesses.push(WeaknessEntry {
                topic,
                confidence,
                notes,
                recorded_at: now,
            }),
            ProfileInsight::MistakePattern { pattern } => self.mistake_patterns.push(MistakePattern {
                pattern,
                frequency: 1,
                first_seen: now,
            }),
        }
        self.last_updated = now;
    }

    /// Text digest handed to the tutoring agent as context.
    pub fn summary(&self) -> ProfileSummary {
        let join = |items: Vec<&str>| items.join(", ");
        ProfileSummary {
            strengths: join(self.strengths.iter().map(|s| s.topic.as_str()).collect()),
            weaknesses: join(self.weaknesses.iter().map(|w| w.topic.as_str()).collect()),
            mistakes: join(self.mistake_patterns.iter().map(|m| m.pattern.as_str()).collect()),
            learning_style: self.learning_style.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub strengths: String,
    pub weaknesses: String,
    pub mistakes: String,
    pub learning_style: Option<String>,
}

impl std::fmt::Display for ProfileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
            if value.is_empty() {
                fallback
            } else {
                value
            }
        }
        writeln!(f, "STUDENT PROFILE:")?;
        writeln!(f, "- Strengths: {}", or(&self.strengths, "Not yet identified"))?;
        writeln!(f, "- Areas to improve: {}", or(&self.weaknesses, "Not yet identified"))?;
        writeln!(f, "- Common mistake patterns: {}", or(&self.mistakes, "None recorded"))?;
        write!(f, "- Learning style: {}", self.learning_style.as_deref().unwrap_or("Unknown"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_without_dedup() {
        let mut profile = LearningProfile::new(StudentId::from("s"), "Math");
        for _ in 0..3 {
            profile.record(ProfileInsight::Strength {
                topic: "fractions".to_string(),
                confidence: 0.9,
            });
        }
        assert_eq!(profile.strengths.len(), 3);
        assert_eq!(profile.entry_count(), 3);
    }

    #[test]
    fn test_mistake_pattern_starts_at_frequency_one() {
        let mut profile = LearningProfile::new(StudentId::from("s"), "Math");
        profile.record(ProfileInsight::MistakePattern {
            pattern: "drops negative sign".to_string(),
        });
        assert_eq!(profile.mistake_patterns[0].frequency, 1);
        assert!(profile.last_updated >= profile.created_at);
    }

    #[test]
    fn test_summary_fallbacks() {
        let profile = LearningProfile::new(StudentId::from("s"), "Math");
        let text = profile.summary().to_string();
        assert!(text.contains("Strengths: Not yet identified"));
        assert!(text.contains("Areas to improve: Not yet identified"));
        assert!(text.contains("Common mistake patterns: None recorded"));
        assert!(text.contains("Learning style: Unknown"));
    }

    #[test]
    fn test_summary_lists_topics() {
        let mut profile = LearningProfile::new(StudentId::from("s"), "Math");
        profile.record(ProfileInsight::Strength { topic: "ratios".to_string(), confidence: 0.8 });
        profile.record(ProfileInsight::Weakness {
            topic: "long division".to_string(),
            confidence: None,
            notes: String::new(),
        });
        profile.learning_style = Some("visual".to_string());

        let summary = profile.summary();
        assert_eq!(summary.strengths, "ratios");
        assert_eq!(summary.weaknesses, "long division");
        assert!(summary.to_string().contains("Learning style: visual"));
    }

    #[test]
    fn test_insight_serde_tagging() {
        let insight = ProfileInsight::Weakness {
            topic: "graphs".to_string(),
            confidence: Some(0.4),
            notes: "mixes up axes".to_string(),
        };
        let json = serde_json::to_value(&insight).unwrap();
        assert_eq!(json["kind"], "weakness");
        let back: ProfileInsight = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ProfileEntryKind::Weakness);
        assert_eq!(back.subject_text(), "graphs");
    }
}
