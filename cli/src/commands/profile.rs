// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learning profile commands
//!
//! Commands: show

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use scholar_core::domain::mastery::StudentId;
use scholar_core::domain::profile::LearningProfile;

use crate::embedded::EmbeddedServices;

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Show a student's profile for one subject
    Show {
        #[arg(long)]
        student: String,

        #[arg(long)]
        subject: String,

        /// Print the full profile as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: ProfileCommand, config_path: Option<PathBuf>) -> Result<()> {
    let embedded = EmbeddedServices::new(config_path).await?;

    match command {
        ProfileCommand::Show { student, subject, json } => {
            let profile = embedded.services.profiles.get(&StudentId::from(student), &subject).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                print_profile(&profile);
            }
            Ok(())
        }
    }
}

pub fn print_profile(profile: &LearningProfile) {
    println!("{} {} / {}", "Profile:".bold(), profile.student_id, profile.subject);
    if profile.is_empty() {
        println!("{}", "  (no entries recorded)".dimmed());
    }
    println!("{}", profile.summary());
    println!(
        "{}",
        format!(
            "{} strengths, {} weaknesses, {} mistake patterns; last updated {}",
            profile.strengths.len(),
            profile.weaknesses.len(),
            profile.mistake_patterns.len(),
            profile.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .dimmed()
    );
}
