// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Scholar Configuration Types
//
// Defines the configuration schema for a Scholar deployment:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Module tree limits
// - Mastery update tuning (lock timeout, delta bound, profile thresholds)
// - Learning-session bounds
// - Storage backend selection
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "scholar/v1";
pub const KIND: &str = "ScholarConfig";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfigManifest {
    /// API version (must be "scholar/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ScholarConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: ScholarConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScholarConfigSpec {
    #[serde(default)]
    pub tree: TreeConfig,

    #[serde(default)]
    pub mastery: MasteryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Number of levels a module tree may have (roots count as one)
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryConfig {
    /// Bounded wait for a student's exclusive update scope
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Tutoring deltas are re-clamped into `[-max_tutoring_delta, max_tutoring_delta]`
    #[serde(default = "default_max_tutoring_delta")]
    pub max_tutoring_delta: f64,

    /// Assignment score at or above which a strength is recorded
    #[serde(default = "default_strength_threshold")]
    pub strength_threshold: f64,

    /// Assignment score below which a weakness is recorded
    #[serde(default = "default_weakness_threshold")]
    pub weakness_threshold: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_tutoring_delta: default_max_tutoring_delta(),
            strength_threshold: default_strength_threshold(),
            weakness_threshold: default_weakness_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum entries kept in one learning-session log
    #[serde(default = "default_session_max_entries")]
    pub max_entries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_entries: default_session_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::InMemory,
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_depth() -> u8 {
    4
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_max_tutoring_delta() -> f64 {
    10.0
}

fn default_strength_threshold() -> f64 {
    80.0
}

fn default_weakness_threshold() -> f64 {
    50.0
}

fn default_session_max_entries() -> usize {
    200
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ScholarConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "scholar".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ScholarConfigSpec::default(),
        }
    }
}

impl ScholarConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SCHOLAR_CONFIG_PATH environment variable
    /// 2. ./scholar-config.yaml (working directory)
    /// 3. ~/.scholar/config.yaml (user home)
    /// 4. /etc/scholar/config.yaml (system, Unix) or C:\ProgramData\Scholar\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SCHOLAR_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./scholar-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".scholar").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/scholar/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Scholar\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration: explicit path, then discovery, then defaults.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SCHOLAR_DATABASE_URL") {
            tracing::info!("Environment override: SCHOLAR_DATABASE_URL (storage backend forced to postgres)");
            self.spec.storage.backend = StorageBackendKind::Postgres;
            self.spec.storage.database_url = Some(url);
        }

        if let Some(val) = lookup("SCHOLAR_MAX_DEPTH") {
            match val.parse::<u8>() {
                Ok(depth) => {
                    tracing::info!("Environment override: SCHOLAR_MAX_DEPTH={}", depth);
                    self.spec.tree.max_depth = depth;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for SCHOLAR_MAX_DEPTH: '{}'. Ignoring.", val);
                }
            }
        }

        if let Some(val) = lookup("SCHOLAR_LOCK_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: SCHOLAR_LOCK_TIMEOUT_MS={}", ms);
                    self.spec.mastery.lock_timeout_ms = ms;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for SCHOLAR_LOCK_TIMEOUT_MS: '{}'. Ignoring.", val);
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.tree.max_depth == 0 {
            anyhow::bail!("spec.tree.max_depth must be at least 1");
        }

        let mastery = &self.spec.mastery;
        if mastery.lock_timeout_ms == 0 {
            anyhow::bail!("spec.mastery.lock_timeout_ms must be greater than 0");
        }
        if !mastery.max_tutoring_delta.is_finite() || mastery.max_tutoring_delta < 0.0 {
            anyhow::bail!(
                "spec.mastery.max_tutoring_delta must be a non-negative number, got {}",
                mastery.max_tutoring_delta
            );
        }
        for (name, value) in [
            ("strength_threshold", mastery.strength_threshold),
            ("weakness_threshold", mastery.weakness_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                anyhow::bail!("spec.mastery.{} must be within [0, 100], got {}", name, value);
            }
        }
        if mastery.weakness_threshold >= mastery.strength_threshold {
            anyhow::bail!(
                "spec.mastery.weakness_threshold ({}) must be below strength_threshold ({})",
                mastery.weakness_threshold,
                mastery.strength_threshold
            );
        }

        if self.spec.storage.backend == StorageBackendKind::Postgres {
            match &self.spec.storage.database_url {
                Some(url) if !url.is_empty() => {}
                _ => anyhow::bail!("spec.storage.database_url is required for the postgres backend"),
            }
        }

        Ok(())
    }

    /// Storage backend selection derived from `spec.storage`.
    pub fn storage_backend(&self) -> StorageBackend {
        match (self.spec.storage.backend, &self.spec.storage.database_url) {
            (StorageBackendKind::Postgres, Some(url)) => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: url.clone(),
                max_connections: self.spec.storage.max_connections,
            }),
            _ => StorageBackend::InMemory,
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .map(|o| o.logging.clone())
            .unwrap_or_default()
    }
}
