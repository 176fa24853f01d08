// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedded service wiring
//!
//! Loads the configuration, connects to the configured storage backend and
//! builds the core services in-process.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use scholar_core::application::{create_repositories, ScholarServices};
use scholar_core::domain::config::ScholarConfigManifest;
use scholar_core::domain::repository::StorageBackend;
use scholar_core::infrastructure::db::Database;
use scholar_core::infrastructure::EventBus;

pub struct EmbeddedServices {
    pub config: ScholarConfigManifest,
    pub services: ScholarServices,
    persistent: bool,
}

impl EmbeddedServices {
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = ScholarConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
        config.validate().context("Configuration validation failed")?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: ScholarConfigManifest) -> Result<Self> {
        let backend = config.storage_backend();
        let pool = match &backend {
            StorageBackend::PostgreSQL(pg) => {
                let database = Database::connect(pg).await.context("Failed to connect to database")?;
                info!("Connected to PostgreSQL storage backend");
                Some(database.get_pool().clone())
            }
            StorageBackend::InMemory => {
                warn!("Using in-memory storage; changes are discarded when the command exits");
                None
            }
        };

        let repositories = create_repositories(&backend, pool).context("Failed to create repositories")?;
        let services = ScholarServices::new(repositories, &config.spec, EventBus::with_default_capacity());

        Ok(Self {
            persistent: matches!(backend, StorageBackend::PostgreSQL(_)),
            config,
            services,
        })
    }

    /// In-memory services regardless of the configured backend.
    pub fn in_memory(mut config: ScholarConfigManifest) -> Self {
        config.spec.storage = Default::default();
        let services = ScholarServices::in_memory(&config.spec);
        Self {
            config,
            services,
            persistent: false,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}
