//! In-memory backend for exercising the engine without a database.
//!
//! Records every transaction event in a journal and stages statements per
//! transaction, so tests can assert ordering, atomicity and what survived a
//! rollback. Faults can be injected per ledger name or per commit attempt.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{MigrateError, Result};
use crate::ledger::LedgerEntry;
use crate::step::BoxFuture;
use crate::store::{LedgerStore, Provisioner};

/// A transaction event, in the order the backend observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    Begin(u64),
    Record(u64, String),
    Commit(u64),
    Rollback(u64),
}

/// Transaction handle for [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryTx {
    id: u64,
    statements: Vec<String>,
    entries: Vec<LedgerEntry>,
}

impl MemoryTx {
    /// Transaction number, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stage a statement; it becomes visible only if the transaction commits.
    pub fn execute(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    database_exists: bool,
    ledger_exists: bool,
    ledger: Vec<LedgerEntry>,
    executed: Vec<String>,
    journal: Vec<TxEvent>,
    next_tx: u64,
    commit_attempts: usize,
    database_creations: usize,
    ledger_creations: usize,
    database_drops: usize,
    fail_record: HashSet<String>,
    fail_commit_at: HashSet<usize>,
    fail_create_database: bool,
}

/// In-memory [`LedgerStore`] and [`Provisioner`].
///
/// Clones share state, so a test can keep a handle while the engine owns another.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    database: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// A backend whose database and ledger table do not exist yet.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// A backend whose database and ledger table already exist.
    pub fn provisioned(database: impl Into<String>) -> Self {
        let backend = Self::new(database);
        {
            let mut state = backend.state.lock().unwrap();
            state.database_exists = true;
            state.ledger_exists = true;
        }
        backend
    }

    /// Make the ledger write for `name` fail.
    pub fn fail_record_for(&self, name: impl Into<String>) {
        self.state.lock().unwrap().fail_record.insert(name.into());
    }

    /// Make the n-th commit attempt (1-based, counted across the backend's life) fail.
    pub fn fail_commit_at(&self, attempt: usize) {
        self.state.lock().unwrap().fail_commit_at.insert(attempt);
    }

    /// Make database creation fail.
    pub fn fail_create_database(&self) {
        self.state.lock().unwrap().fail_create_database = true;
    }

    /// Committed ledger rows.
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.state.lock().unwrap().ledger.clone()
    }

    /// Names of committed ledger rows, in commit order.
    pub fn ledger_names(&self) -> Vec<String> {
        self.ledger().into_iter().map(|e| e.name).collect()
    }

    /// Statements from committed transactions, in commit order.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Every transaction event so far.
    pub fn journal(&self) -> Vec<TxEvent> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn database_exists_now(&self) -> bool {
        self.state.lock().unwrap().database_exists
    }

    pub fn ledger_exists_now(&self) -> bool {
        self.state.lock().unwrap().ledger_exists
    }

    /// Number of create-database calls that reached the backend.
    pub fn database_creations(&self) -> usize {
        self.state.lock().unwrap().database_creations
    }

    /// Number of create-ledger calls that reached the backend.
    pub fn ledger_creations(&self) -> usize {
        self.state.lock().unwrap().ledger_creations
    }

    pub fn database_drops(&self) -> usize {
        self.state.lock().unwrap().database_drops
    }

    fn require_database(state: &MemoryState, database: &str) -> Result<()> {
        if state.database_exists {
            Ok(())
        } else {
            Err(MigrateError::Connection(format!(
                "database \"{}\" does not exist",
                database
            )))
        }
    }
}

impl LedgerStore for MemoryBackend {
    type Tx = MemoryTx;

    fn begin(&self) -> BoxFuture<'_, Result<MemoryTx>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            Self::require_database(&state, &self.database)?;
            state.next_tx += 1;
            let id = state.next_tx;
            state.journal.push(TxEvent::Begin(id));
            Ok(MemoryTx {
                id,
                statements: Vec::new(),
                entries: Vec::new(),
            })
        })
    }

    fn record<'a>(
        &'a self,
        tx: &'a mut MemoryTx,
        entry: &'a LedgerEntry,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.ledger_exists {
                return Err(MigrateError::Step(
                    "relation \"migrations\" does not exist".to_string(),
                ));
            }
            if state.fail_record.contains(&entry.name) {
                return Err(MigrateError::Step(format!(
                    "insert rejected for '{}'",
                    entry.name
                )));
            }
            state
                .journal
                .push(TxEvent::Record(tx.id, entry.name.clone()));
            tx.entries.push(entry.clone());
            Ok(())
        })
    }

    fn commit(&self, tx: MemoryTx) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.commit_attempts += 1;
            if state.fail_commit_at.contains(&state.commit_attempts) {
                state.journal.push(TxEvent::Rollback(tx.id));
                return Err(MigrateError::Transaction(format!(
                    "connection lost while committing transaction {}",
                    tx.id
                )));
            }
            state.journal.push(TxEvent::Commit(tx.id));
            state.executed.extend(tx.statements);
            state.ledger.extend(tx.entries);
            Ok(())
        })
    }

    fn rollback(&self, tx: MemoryTx) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state
                .lock()
                .unwrap()
                .journal
                .push(TxEvent::Rollback(tx.id));
            Ok(())
        })
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<LedgerEntry>>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Self::require_database(&state, &self.database)?;
            Ok(state.ledger.clone())
        })
    }
}

impl Provisioner for MemoryBackend {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn database_exists(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().database_exists) })
    }

    fn create_database(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.database_creations += 1;
            if state.fail_create_database {
                return Err(MigrateError::Provisioning(
                    "permission denied to create database".to_string(),
                ));
            }
            if state.database_exists {
                return Err(MigrateError::Provisioning(format!(
                    "database \"{}\" already exists",
                    self.database
                )));
            }
            state.database_exists = true;
            Ok(())
        })
    }

    fn drop_database(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.database_drops += 1;
            Self::require_database(&state, &self.database)?;
            state.database_exists = false;
            state.ledger_exists = false;
            state.ledger.clear();
            state.executed.clear();
            Ok(())
        })
    }

    fn ledger_exists(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state.database_exists && state.ledger_exists)
        })
    }

    fn create_ledger(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.ledger_creations += 1;
            Self::require_database(&state, &self.database)?;
            state.ledger_exists = true;
            Ok(())
        })
    }

    fn drop_ledger(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            Self::require_database(&state, &self.database)?;
            state.ledger_exists = false;
            state.ledger.clear();
            Ok(())
        })
    }
}
