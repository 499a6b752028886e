//! Seams between the engine and a concrete database.
//!
//! A backend implements both traits: [`LedgerStore`] for the per-step
//! transaction and ledger rows, [`Provisioner`] for the database and ledger
//! table themselves.

use crate::error::Result;
use crate::ledger::LedgerEntry;
use crate::step::BoxFuture;

/// Transactions and ledger rows.
pub trait LedgerStore: Send + Sync {
    /// Transaction handle passed to steps.
    type Tx: Send + 'static;

    /// Open a new transaction on the target database.
    fn begin(&self) -> BoxFuture<'_, Result<Self::Tx>>;

    /// Append a ledger row inside `tx`.
    fn record<'a>(
        &'a self,
        tx: &'a mut Self::Tx,
        entry: &'a LedgerEntry,
    ) -> BoxFuture<'a, Result<()>>;

    /// Commit `tx`. On failure the transaction is rolled back by the store.
    fn commit(&self, tx: Self::Tx) -> BoxFuture<'_, Result<()>>;

    /// Roll back `tx`.
    fn rollback(&self, tx: Self::Tx) -> BoxFuture<'_, Result<()>>;

    /// All ledger rows, oldest first.
    fn entries(&self) -> BoxFuture<'_, Result<Vec<LedgerEntry>>>;
}

/// Existence checks and DDL for the target database and ledger table.
pub trait Provisioner: Send + Sync {
    /// Logical name of the target database.
    fn database_name(&self) -> &str;

    fn database_exists(&self) -> BoxFuture<'_, Result<bool>>;

    fn create_database(&self) -> BoxFuture<'_, Result<()>>;

    fn drop_database(&self) -> BoxFuture<'_, Result<()>>;

    fn ledger_exists(&self) -> BoxFuture<'_, Result<bool>>;

    fn create_ledger(&self) -> BoxFuture<'_, Result<()>>;

    fn drop_ledger(&self) -> BoxFuture<'_, Result<()>>;
}

/// A complete backend the engine can run against.
pub trait Backend: LedgerStore + Provisioner {}

impl<T: LedgerStore + Provisioner> Backend for T {}
