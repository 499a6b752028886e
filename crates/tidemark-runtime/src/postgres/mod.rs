//! PostgreSQL backend.

mod statements;

pub use statements::quote_ident;

use sqlx::{Postgres, Row};
use tracing::debug;

use tidemark_core::config::TidemarkConfig;
use tidemark_core::error::{MigrateError, Result};
use tidemark_core::ledger::LedgerEntry;
use tidemark_core::step::BoxFuture;
use tidemark_core::store::{LedgerStore, Provisioner};

use crate::db::Database;
use crate::migrations::Migrator;

/// Transaction handle passed to steps running against PostgreSQL.
pub type PgTx = sqlx::Transaction<'static, Postgres>;

/// Ledger store and provisioner backed by PostgreSQL.
#[derive(Clone)]
pub struct PgBackend {
    db: Database,
    schema: String,
    database: String,
    table: String,
    insert_sql: String,
    select_sql: String,
}

impl PgBackend {
    /// Connect using the full configuration.
    pub async fn connect(config: &TidemarkConfig) -> Result<Self> {
        let db = Database::from_config(&config.database).await?;
        Ok(Self::new(db, &config.ledger.table))
    }

    /// Wrap existing pools; `table` is the ledger table name.
    pub fn new(db: Database, table: &str) -> Self {
        let schema = db.config().schema.clone();
        let database = db.config().database.clone();

        Self {
            insert_sql: statements::insert_entry(&schema, table),
            select_sql: statements::select_entries(&schema, table),
            db,
            schema,
            database,
            table: table.to_string(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn exec_target(&self, sql: &str) -> Result<()> {
        debug!("Executing on {}: {}", self.database, sql);
        sqlx::query(sql).execute(self.db.target()).await?;
        Ok(())
    }

    async fn exec_maintenance(&self, sql: &str) -> Result<()> {
        debug!("Executing on maintenance database: {}", sql);
        sqlx::query(sql).execute(self.db.maintenance()).await?;
        Ok(())
    }
}

impl Migrator<PgBackend> {
    /// Connect to the configured target and build an engine with an empty registry.
    ///
    /// Connection failures are returned to the caller.
    pub async fn init(config: &TidemarkConfig) -> Result<Self> {
        let backend = PgBackend::connect(config).await?;
        Ok(Self::new(backend, config.policy.clone()))
    }
}

impl LedgerStore for PgBackend {
    type Tx = PgTx;

    fn begin(&self) -> BoxFuture<'_, Result<PgTx>> {
        Box::pin(async move {
            self.db
                .target()
                .begin()
                .await
                .map_err(|e| MigrateError::Transaction(format!("Failed to start transaction: {}", e)))
        })
    }

    fn record<'a>(&'a self, tx: &'a mut PgTx, entry: &'a LedgerEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query(&self.insert_sql)
                .bind(entry.id)
                .bind(entry.name.as_str())
                .bind(entry.is_applied)
                .execute(&mut **tx)
                .await?;
            Ok(())
        })
    }

    fn commit(&self, tx: PgTx) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tx.commit()
                .await
                .map_err(|e| MigrateError::Transaction(format!("Failed to commit: {}", e)))
        })
    }

    fn rollback(&self, tx: PgTx) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tx.rollback()
                .await
                .map_err(|e| MigrateError::Transaction(format!("Failed to roll back: {}", e)))
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<LedgerEntry>>> {
        Box::pin(async move {
            let rows = sqlx::query(&self.select_sql)
                .fetch_all(self.db.target())
                .await?;

            rows.iter()
                .map(|row| {
                    Ok(LedgerEntry {
                        id: row.try_get("id")?,
                        name: row.try_get("name")?,
                        is_applied: row.try_get("is_applied")?,
                        created_at: row.try_get("created_at")?,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
    }
}

impl Provisioner for PgBackend {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn database_exists(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let exists = sqlx::query_scalar::<_, bool>(statements::DATABASE_EXISTS)
                .bind(self.database.as_str())
                .fetch_one(self.db.maintenance())
                .await?;
            Ok(exists)
        })
    }

    fn create_database(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.exec_maintenance(&statements::create_database(&self.database))
                .await
        })
    }

    fn drop_database(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // Pooled target connections would otherwise block the drop.
            sqlx::query(statements::TERMINATE_BACKENDS)
                .bind(self.database.as_str())
                .execute(self.db.maintenance())
                .await?;
            self.exec_maintenance(&statements::drop_database(&self.database))
                .await
        })
    }

    fn ledger_exists(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let exists = sqlx::query_scalar::<_, bool>(statements::TABLE_EXISTS)
                .bind(self.schema.as_str())
                .bind(self.table.as_str())
                .fetch_one(self.db.target())
                .await?;
            Ok(exists)
        })
    }

    fn create_ledger(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.exec_target(&statements::create_schema(&self.schema))
                .await?;
            self.exec_target(&statements::create_ledger(&self.schema, &self.table))
                .await
        })
    }

    fn drop_ledger(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.exec_target(&statements::drop_ledger(&self.schema, &self.table))
                .await
        })
    }
}
