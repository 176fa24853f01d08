// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Manual mastery signals
//!
//! Commands: tutoring, assignment

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use scholar_core::domain::mastery::StudentId;
use scholar_core::domain::module::ModuleId;
use scholar_core::domain::signal::{AncestorUpdate, AssignmentOutcome, AssignmentResult, TutoringOutcome};

use crate::commands::tree::format_score;
use crate::embedded::EmbeddedServices;

#[derive(Subcommand)]
pub enum RecordCommand {
    /// Apply a tutoring outcome (bounded delta)
    Tutoring {
        #[arg(long)]
        student: String,

        #[arg(long, value_name = "MODULE_ID")]
        module: ModuleId,

        #[arg(long)]
        subject: String,

        /// Mastery change; re-clamped to the configured bound
        #[arg(long, allow_hyphen_values = true)]
        delta: f64,

        /// Concept the turn assessed
        #[arg(long)]
        concept: String,
    },

    /// Apply a released assignment result (absolute score)
    Assignment {
        #[arg(long)]
        student: String,

        /// Linked module; omit for an unlinked assignment
        #[arg(long, value_name = "MODULE_ID")]
        module: Option<ModuleId>,

        #[arg(long)]
        subject: String,

        /// Assignment title
        #[arg(long)]
        title: String,

        /// Score percentage
        #[arg(long)]
        score: f64,
    },
}

pub async fn handle_command(command: RecordCommand, config_path: Option<PathBuf>) -> Result<()> {
    let embedded = EmbeddedServices::new(config_path).await?;
    let pipeline = &embedded.services.pipeline;

    match command {
        RecordCommand::Tutoring {
            student,
            module,
            subject,
            delta,
            concept,
        } => {
            let update = pipeline
                .record_tutoring_outcome(TutoringOutcome::new(
                    StudentId::from(student),
                    module,
                    subject,
                    delta,
                    concept,
                ))
                .await?;
            println!(
                "{} {} -> {} (change {:+})",
                "✓ Tutoring outcome applied:".green(),
                update.previous_score,
                format_score(update.new_score, update.status),
                update.change
            );
            print_ancestors(&update.ancestors);
        }
        RecordCommand::Assignment {
            student,
            module,
            subject,
            title,
            score,
        } => {
            let outcome = pipeline
                .record_assignment_result(AssignmentResult::new(StudentId::from(student), module, subject, title, score))
                .await?;
            print_assignment_outcome(&outcome);
        }
    }
    Ok(())
}

pub fn print_assignment_outcome(outcome: &AssignmentOutcome) {
    match outcome {
        AssignmentOutcome::Applied {
            previous_score,
            new_score,
            status,
            profile_entry,
            ancestors,
            ..
        } => {
            println!(
                "{} {} -> {}",
                "✓ Assignment result applied:".green(),
                previous_score,
                format_score(*new_score, *status)
            );
            if let Some(kind) = profile_entry {
                println!("  Profile: recorded {:?}", kind);
            }
            print_ancestors(ancestors);
        }
        AssignmentOutcome::NoOp { reason } => {
            println!("{} ({})", "No mastery change".dimmed(), reason.as_str());
        }
    }
}

pub fn print_ancestors(ancestors: &[AncestorUpdate]) {
    for ancestor in ancestors {
        println!(
            "  ↑ {} {} -> {}",
            ancestor.module_id.to_string().dimmed(),
            ancestor.previous_score,
            format_score(ancestor.new_score, ancestor.status)
        );
    }
}
