// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use scholar_core::domain::config::{ScholarConfigManifest, StorageBackendKind};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./scholar-config.yaml)
        #[arg(short, long, default_value = "./scholar-config.yaml")]
        output: PathBuf,

        /// Include a commented example of every setting
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ScholarConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SCHOLAR_CONFIG_PATH: {}",
            std::env::var("SCHOLAR_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./scholar-config.yaml");
        println!("  4. ~/.scholar/config.yaml");
        println!("  5. /etc/scholar/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Deployment:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    let spec = &config.spec;
    println!("{}", "Module Trees:".bold());
    println!(
        "  Max depth: {} levels (depths 0-{})",
        spec.tree.max_depth,
        spec.tree.max_depth.saturating_sub(1)
    );
    println!();

    println!("{}", "Mastery:".bold());
    println!("  Lock timeout: {}ms", spec.mastery.lock_timeout_ms);
    println!("  Tutoring delta bound: ±{}", spec.mastery.max_tutoring_delta);
    println!("  Strength at or above: {}%", spec.mastery.strength_threshold);
    println!("  Weakness below: {}%", spec.mastery.weakness_threshold);
    println!("  Session log bound: {} entries", spec.session.max_entries);
    println!();

    println!("{}", "Storage:".bold());
    match spec.storage.backend {
        StorageBackendKind::InMemory => println!("  Backend: in_memory {}", "(not persisted)".dimmed()),
        StorageBackendKind::Postgres => {
            println!("  Backend: postgres");
            println!(
                "  Database URL: {}",
                spec.storage
                    .database_url
                    .as_deref()
                    .map(redact_url)
                    .unwrap_or_else(|| "(missing)".red().to_string())
            );
            println!("  Max connections: {}", spec.storage.max_connections);
        }
    }
    println!();

    let logging = config.logging();
    println!("{}", "Logging:".bold());
    println!("  Level: {}", logging.level);
    println!("  Format: {}", logging.format);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ScholarConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

/// Hide the password component of a connection string.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => match credentials.split_once(':') {
            Some((user, _)) => format!("{}://{}:****@{}", scheme, user, host),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://scholar:secret@db:5432/scholar"),
            "postgres://scholar:****@db:5432/scholar"
        );
        assert_eq!(redact_url("postgres://db/scholar"), "postgres://db/scholar");
    }

    #[test]
    fn test_templates_are_valid_manifests() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config = ScholarConfigManifest::from_yaml_str(template).unwrap();
            config.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scholar-config.yaml");
        generate(path.clone(), false).await.unwrap();

        let config = ScholarConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(config.spec.tree.max_depth, 4);
    }
}
