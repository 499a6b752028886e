//! Pre-run provisioning of the target database and ledger table.

use tidemark_core::error::{MigrateError, Result};
use tidemark_core::store::Provisioner;
use tracing::{debug, info};

/// Make sure the target database and ledger table exist.
///
/// Safe to call before every run: existing objects are left alone. Nothing is
/// retried, and the ledger table is not attempted if the database could not
/// be created.
pub async fn ensure_ready<P: Provisioner + ?Sized>(provisioner: &P) -> Result<()> {
    let database = provisioner.database_name();

    let exists = provisioner
        .database_exists()
        .await
        .map_err(|e| provisioning("check database", database, e))?;
    if exists {
        debug!("Database {} already exists", database);
    } else {
        info!("Creating database {}", database);
        provisioner
            .create_database()
            .await
            .map_err(|e| provisioning("create database", database, e))?;
    }

    let exists = provisioner
        .ledger_exists()
        .await
        .map_err(|e| provisioning("check migrations table in", database, e))?;
    if exists {
        debug!("Migrations table already exists in {}", database);
    } else {
        info!("Creating migrations table in {}", database);
        provisioner
            .create_ledger()
            .await
            .map_err(|e| provisioning("create migrations table in", database, e))?;
    }

    Ok(())
}

fn provisioning(action: &str, database: &str, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Provisioning(msg) => {
            MigrateError::Provisioning(format!("Failed to {} {}: {}", action, database, msg))
        }
        other => {
            MigrateError::Provisioning(format!("Failed to {} {}: {}", action, database, other))
        }
    }
}
