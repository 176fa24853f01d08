// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Module tree commands
//!
//! Commands: import, show, roots, publish, delete

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scholar_core::application::{ModuleTreeNode, ProgressEntry, ScholarServices};
use scholar_core::domain::mastery::{MasteryStatus, StudentId};
use scholar_core::domain::module::{Module, ModuleId, PublicationStatus};

use crate::embedded::EmbeddedServices;

#[derive(Subcommand)]
pub enum TreeCommand {
    /// Import a nested module tree from a YAML or JSON file
    Import {
        /// Tree document
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Attach the imported tree below an existing module
        #[arg(long, value_name = "MODULE_ID")]
        parent: Option<ModuleId>,
    },

    /// Print a tree outline, optionally with a student's mastery
    Show {
        #[arg(value_name = "ROOT_ID")]
        root: ModuleId,

        /// Student whose scores to show
        #[arg(long)]
        student: Option<String>,
    },

    /// List root modules
    Roots,

    /// Publish a module or return it to draft
    Publish {
        #[arg(value_name = "MODULE_ID")]
        module: ModuleId,

        /// Set the module back to draft
        #[arg(long)]
        draft: bool,
    },

    /// Delete a module with all of its descendants
    Delete {
        #[arg(value_name = "MODULE_ID")]
        module: ModuleId,
    },
}

pub async fn handle_command(command: TreeCommand, config_path: Option<PathBuf>) -> Result<()> {
    let embedded = EmbeddedServices::new(config_path).await?;
    let services = &embedded.services;

    match command {
        TreeCommand::Import { file, parent } => {
            let tree = load_tree(&file)?;
            let created = services
                .tree
                .import_tree(tree, parent)
                .await
                .context("Failed to import module tree")?;
            let Some(root) = created.first() else {
                anyhow::bail!("Tree document produced no modules");
            };
            println!(
                "{}",
                format!("✓ Imported {} modules under root {}", created.len(), root.id).green()
            );
            print_outline(services, root.id, None).await?;
            if !embedded.is_persistent() {
                println!("{}", "Note: in-memory storage, the tree was not persisted.".yellow());
            }
            Ok(())
        }
        TreeCommand::Show { root, student } => {
            let student = student.map(StudentId::from);
            print_outline(services, root, student.as_ref()).await
        }
        TreeCommand::Roots => {
            let roots = services.tree.roots().await?;
            if roots.is_empty() {
                println!("{}", "No module trees found.".dimmed());
            }
            for root in roots {
                println!("{}  {} [{}] ({})", root.id, root.title.bold(), root.subject, root.status.as_str());
            }
            Ok(())
        }
        TreeCommand::Publish { module, draft } => {
            let status = if draft {
                PublicationStatus::Draft
            } else {
                PublicationStatus::Published
            };
            let module = services.tree.set_publication(module, status).await?;
            println!("{}", format!("✓ '{}' is now {}", module.title, module.status.as_str()).green());
            Ok(())
        }
        TreeCommand::Delete { module } => {
            let removed = services.tree.delete_subtree(module).await?;
            println!("{}", format!("✓ Removed {} modules", removed).green());
            Ok(())
        }
    }
}

/// Parse a tree document; `.json` files are read as JSON, anything else as YAML.
pub fn load_tree(path: &Path) -> Result<ModuleTreeNode> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON tree in {:?}", path))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML tree in {:?}", path))
    }
}

/// Print the tree below `root` in depth-first order.
pub async fn print_outline(services: &ScholarServices, root: ModuleId, student: Option<&StudentId>) -> Result<()> {
    let modules = services.tree.subtree(root).await?;
    let progress: HashMap<ModuleId, ProgressEntry> = match student {
        Some(student) => services
            .ledger
            .progress_report(student, &modules)
            .await?
            .into_iter()
            .map(|e| (e.module_id, e))
            .collect(),
        None => HashMap::new(),
    };
    let by_id: HashMap<ModuleId, &Module> = modules.iter().map(|m| (m.id, m)).collect();

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(module) = by_id.get(&id) else {
            continue;
        };
        let indent = "  ".repeat(usize::from(module.depth()));
        let marker = if module.is_leaf() { "-" } else { "+" };
        match progress.get(&id) {
            Some(entry) => println!(
                "{}{} {} {}",
                indent,
                marker,
                module.title,
                format_score(entry.score, entry.status)
            ),
            None => println!("{}{} {} {}", indent, marker, module.title, module.id.to_string().dimmed()),
        }
        stack.extend(module.children_ids().iter().rev().copied());
    }
    Ok(())
}

pub fn format_score(score: u8, status: MasteryStatus) -> String {
    let text = format!("{:>3}% {}", score, status.as_str());
    match status {
        MasteryStatus::Mastered => text.green().to_string(),
        MasteryStatus::InProgress => text.yellow().to_string(),
        MasteryStatus::NotStarted => text.dimmed().to_string(),
    }
}
