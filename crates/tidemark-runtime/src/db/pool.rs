use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};

use tidemark_core::config::DatabaseConfig;
use tidemark_core::error::{MigrateError, Result};

/// Connection pools for a migration target.
///
/// The maintenance pool is connected eagerly and is used for database-level
/// DDL. The target pool is lazy because the target database may not exist
/// until bootstrap has created it.
#[derive(Clone)]
pub struct Database {
    /// Pool on the maintenance database.
    maintenance: Arc<PgPool>,

    /// Pool on the target database.
    target: Arc<PgPool>,

    /// Configuration.
    config: DatabaseConfig,
}

impl Database {
    /// Create the pools from configuration.
    ///
    /// Fails if the maintenance database cannot be reached.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let maintenance = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout())
            .connect_with(config.maintenance_options())
            .await
            .map_err(|e| {
                MigrateError::Connection(format!(
                    "Failed to connect to maintenance database '{}': {}",
                    config.maintenance_database, e
                ))
            })?;

        let target = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.connect_timeout())
            .connect_lazy_with(config.connect_options());

        Ok(Self {
            maintenance: Arc::new(maintenance),
            target: Arc::new(target),
            config: config.clone(),
        })
    }

    /// Pool for CREATE/DROP DATABASE and catalog lookups.
    pub fn maintenance(&self) -> &PgPool {
        &self.maintenance
    }

    /// Pool on the target database.
    pub fn target(&self) -> &PgPool {
        &self.target
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.target.close().await;
        self.maintenance.close().await;
    }
}
