// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Scenario Replay Command
//!
//! Builds module trees and feeds a sequence of signals through the update
//! pipeline on fresh in-memory stores, then prints every student's progress.
//! Useful for checking thresholds and propagation without a database.
//!
//! Signals name modules by title since ids are only assigned on import;
//! titles must therefore be unique within a scenario.
//!
//! ```yaml
//! trees:
//!   - subject: Math
//!     title: Algebra
//!     children:
//!       - { subject: Math, title: Linear equations }
//!       - { subject: Math, title: Quadratics }
//! steps:
//!   - source: tutoring
//!     student: s-1
//!     module: Linear equations
//!     subject: Math
//!     delta: 8
//!     concept: isolating x
//!   - source: assignment
//!     student: s-1
//!     module: Quadratics
//!     subject: Math
//!     title: Quiz 1
//!     score: 85
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use scholar_core::application::{ModuleTreeNode, ScholarServices};
use scholar_core::domain::config::ScholarConfigManifest;
use scholar_core::domain::mastery::StudentId;
use scholar_core::domain::module::ModuleId;
use scholar_core::domain::profile::ProfileInsight;
use scholar_core::domain::signal::{AssignmentResult, MasterySignal, SignalOutcome, TutoringOutcome};

use crate::commands::profile::print_profile;
use crate::commands::record::{print_ancestors, print_assignment_outcome};
use crate::commands::tree::{format_score, print_outline};
use crate::embedded::EmbeddedServices;

#[derive(Args)]
pub struct ReplayCommand {
    /// Scenario file (YAML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Only print the final report
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub trees: Vec<ModuleTreeNode>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ScenarioStep {
    Tutoring {
        student: String,
        module: String,
        subject: String,
        delta: f64,
        concept: String,
        #[serde(default)]
        insight: Option<ProfileInsight>,
    },
    Assignment {
        student: String,
        #[serde(default)]
        module: Option<String>,
        subject: String,
        title: String,
        score: f64,
        /// Go through the feedback-release hook, which never fails.
        #[serde(default)]
        on_release: bool,
    },
}

impl ScenarioStep {
    fn student(&self) -> &str {
        match self {
            ScenarioStep::Tutoring { student, .. } | ScenarioStep::Assignment { student, .. } => student,
        }
    }

    fn subject(&self) -> &str {
        match self {
            ScenarioStep::Tutoring { subject, .. } | ScenarioStep::Assignment { subject, .. } => subject,
        }
    }
}

/// Result of one replayed step; `None` when a release-hook update failed.
pub type StepOutcome = Option<SignalOutcome>;

pub struct ReplayReport {
    pub roots: Vec<ModuleId>,
    pub modules: HashMap<String, ModuleId>,
    pub outcomes: Vec<StepOutcome>,
    /// Students and the subjects they were seen with, in name order.
    pub students: BTreeMap<String, BTreeSet<String>>,
}

pub async fn execute(cmd: ReplayCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = ScholarConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    let embedded = EmbeddedServices::in_memory(config);

    let content = std::fs::read_to_string(&cmd.file).with_context(|| format!("Failed to read {:?}", cmd.file))?;
    let scenario: Scenario =
        serde_yaml::from_str(&content).with_context(|| format!("Invalid scenario in {:?}", cmd.file))?;

    println!("{}", format!("Replaying {}", cmd.file.display()).bold());
    let report = run_scenario(&embedded.services, scenario, !cmd.quiet).await?;

    println!();
    println!("{}", "Final progress:".bold());
    for (student, subjects) in &report.students {
        println!();
        println!("{} {}", "Student".bold(), student.bold());
        let student_id = StudentId::from(student.as_str());
        for root in &report.roots {
            print_outline(&embedded.services, *root, Some(&student_id)).await?;
        }
        for subject in subjects {
            let profile = embedded.services.profiles.get(&student_id, subject).await?;
            print_profile(&profile);
        }
    }
    Ok(())
}

/// Import every tree, then apply the steps in order.
pub async fn run_scenario(services: &ScholarServices, scenario: Scenario, verbose: bool) -> Result<ReplayReport> {
    let mut roots = Vec::new();
    let mut modules = HashMap::new();

    for tree in scenario.trees {
        let created = services.tree.import_tree(tree, None).await.context("Failed to import scenario tree")?;
        if let Some(root) = created.first() {
            roots.push(root.id);
        }
        for module in created {
            if modules.insert(module.title.clone(), module.id).is_some() {
                anyhow::bail!("Module title '{}' appears more than once in the scenario", module.title);
            }
        }
    }

    let lookup = |title: &str| -> Result<ModuleId> {
        modules
            .get(title)
            .copied()
            .with_context(|| format!("Scenario step references unknown module '{}'", title))
    };

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    let mut students: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (index, step) in scenario.steps.into_iter().enumerate() {
        let number = index + 1;
        students
            .entry(step.student().to_string())
            .or_default()
            .insert(step.subject().to_string());

        let outcome = match step {
            ScenarioStep::Tutoring {
                student,
                module,
                subject,
                delta,
                concept,
                insight,
            } => {
                let mut outcome = TutoringOutcome::new(StudentId::from(student), lookup(module.as_str())?, subject, delta, concept);
                outcome.insight = insight;
                Some(
                    services
                        .pipeline
                        .handle(MasterySignal::Tutoring(outcome))
                        .await
                        .with_context(|| format!("Step {} failed", number))?,
                )
            }
            ScenarioStep::Assignment {
                student,
                module,
                subject,
                title,
                score,
                on_release,
            } => {
                let module_id = module.as_deref().map(&lookup).transpose()?;
                let result = AssignmentResult::new(StudentId::from(student), module_id, subject, title, score);
                if on_release {
                    services
                        .pipeline
                        .on_feedback_released(result)
                        .await
                        .map(SignalOutcome::Assignment)
                } else {
                    Some(
                        services
                            .pipeline
                            .handle(MasterySignal::Assignment(result))
                            .await
                            .with_context(|| format!("Step {} failed", number))?,
                    )
                }
            }
        };

        if verbose {
            print_step(number, &outcome);
        }
        outcomes.push(outcome);
    }

    Ok(ReplayReport {
        roots,
        modules,
        outcomes,
        students,
    })
}

fn print_step(number: usize, outcome: &StepOutcome) {
    print!("{} ", format!("[{}]", number).dimmed());
    match outcome {
        Some(SignalOutcome::Tutoring(update)) => {
            println!(
                "tutoring '{}': {} -> {}",
                update.concept_assessed,
                update.previous_score,
                format_score(update.new_score, update.status)
            );
            print_ancestors(&update.ancestors);
        }
        Some(SignalOutcome::Assignment(outcome)) => print_assignment_outcome(outcome),
        None => println!("{}", "mastery update failed (feedback release continued)".yellow()),
    }
}
