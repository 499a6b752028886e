//! Migration engine.
//!
//! Runs registered steps one at a time, each in its own transaction. Forward
//! steps write their ledger row in the same transaction as the change, so a
//! step is either fully applied and recorded or not at all.
//!
//! Running two engines against the same target at once is unsupported: the
//! ledger has no advisory lock and concurrent runs can interleave.

use std::collections::HashSet;

use tidemark_core::config::{FailurePolicy, PolicyConfig};
use tidemark_core::error::{MigrateError, Result};
use tidemark_core::ledger::{LedgerEntry, MigrationStatus};
use tidemark_core::registry::{MigrationRegistry, RegisteredStep};
use tidemark_core::step::{Direction, MigrationStep};
use tidemark_core::store::Backend;
use tracing::{debug, error, info, warn};

use super::bootstrap;

/// A step failure that the run recovered from.
#[derive(Debug, Clone)]
pub struct StepFailure {
    /// Log tag of the failed step, e.g. `Down00000002`.
    pub tag: String,
    pub name: String,
    pub error: String,
}

/// Outcome of a run that returned `Ok`.
///
/// Under a `continue` policy a run can succeed with failures; check
/// [`RunSummary::is_clean`] before assuming every step took effect.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub direction: Direction,
    /// Steps that committed, in execution order.
    pub completed: Vec<String>,
    /// Up-steps skipped because they were already in the ledger.
    pub skipped: Vec<String>,
    /// Steps whose failure was logged and passed over.
    pub failures: Vec<StepFailure>,
}

impl RunSummary {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            completed: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sequential migration engine over a backend.
pub struct Migrator<B: Backend> {
    backend: B,
    registry: MigrationRegistry<B::Tx>,
    policy: PolicyConfig,
}

impl<B: Backend> Migrator<B> {
    /// Create a new engine with an empty registry.
    pub fn new(backend: B, policy: PolicyConfig) -> Self {
        Self {
            backend,
            registry: MigrationRegistry::new(),
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &MigrationRegistry<B::Tx> {
        &self.registry
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Register a forward step. Returns its ordinal.
    pub fn add_migration(&mut self, step: impl MigrationStep<B::Tx> + 'static) -> Result<usize> {
        self.registry.register_up(step)
    }

    /// Register a reverse step. Returns its ordinal.
    pub fn add_rollback(&mut self, step: impl MigrationStep<B::Tx> + 'static) -> Result<usize> {
        self.registry.register_down(step)
    }

    /// Provision the target database and ledger table if missing.
    pub async fn ensure_ready(&self) -> Result<()> {
        bootstrap::ensure_ready(&self.backend).await
    }

    /// Apply every registered up-step in registration order.
    ///
    /// Seals the registry. With the default `abort` policy the run stops at the
    /// first failing step and returns its error; earlier steps stay committed.
    pub async fn migrate_all(&self) -> Result<RunSummary> {
        self.registry.seal();
        self.ensure_ready().await?;

        let applied: HashSet<String> = if self.policy.skip_applied {
            self.backend
                .entries()
                .await?
                .into_iter()
                .filter(|e| e.is_applied)
                .map(|e| e.name)
                .collect()
        } else {
            HashSet::new()
        };

        let mut summary = RunSummary::new(Direction::Up);

        for step in self.registry.up() {
            if applied.contains(step.name()) {
                debug!("Migration already applied, skipping: {}", step.name());
                summary.skipped.push(step.name().to_string());
                continue;
            }

            match self.apply(step).await {
                Ok(()) => {
                    info!("Migration executed: {}", step.name());
                    summary.completed.push(step.name().to_string());
                }
                Err(e) if e.aborts_run() || self.policy.forward == FailurePolicy::Abort => {
                    error!("Migration not executed: {} ({}): {}", step.name(), step.tag(), e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Migration not executed: {} ({}): {}", step.name(), step.tag(), e);
                    summary.failures.push(failure(step, &e));
                }
            }
        }

        Ok(summary)
    }

    /// Run every registered down-step, last registered first.
    ///
    /// The ledger is not touched. With the default `continue` policy a step that
    /// fails is logged and the remaining steps still run, so `Ok` can mean a
    /// partially reverted target; inspect [`RunSummary::failures`]. A failed
    /// commit always stops the run.
    pub async fn rollback_all(&self) -> Result<RunSummary> {
        self.registry.seal();

        let mut summary = RunSummary::new(Direction::Down);

        for step in self.registry.down().iter().rev() {
            match self.revert(step).await {
                Ok(()) => {
                    info!("Rollback executed: {}", step.name());
                    summary.completed.push(step.name().to_string());
                }
                Err(e) if e.aborts_run() || self.policy.reverse == FailurePolicy::Abort => {
                    error!("Rollback not executed: {} ({}): {}", step.name(), step.tag(), e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Rollback not executed: {} ({}): {}", step.name(), step.tag(), e);
                    summary.failures.push(failure(step, &e));
                }
            }
        }

        Ok(summary)
    }

    /// Drop and recreate the target database, then apply every up-step.
    ///
    /// `name` must match the configured target database. The drop is best
    /// effort since the database may not exist yet.
    pub async fn reset(&self, name: &str) -> Result<RunSummary> {
        let database = self.backend.database_name();
        if name != database {
            return Err(MigrateError::InvalidArgument(format!(
                "refusing to reset '{}': configured target is '{}'",
                name, database
            )));
        }

        if let Err(e) = self.backend.drop_database().await {
            warn!("Drop database error: {}", e);
        }

        self.backend.create_database().await.map_err(|e| {
            error!("Create database error: {}", e);
            MigrateError::Provisioning(format!("Failed to create database {}: {}", database, e))
        })?;

        self.migrate_all().await.inspect_err(|e| {
            error!("Migrate error after reset of {}: {}", database, e);
        })
    }

    /// Applied ledger rows and registered up-steps not yet applied.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let applied = if self.backend.database_exists().await? && self.backend.ledger_exists().await? {
            self.backend.entries().await?
        } else {
            Vec::new()
        };

        Ok(MigrationStatus::from_ledger(applied, self.registry.up_names()))
    }

    /// Drop the ledger table. Applied history is lost.
    pub async fn drop_ledger(&self) -> Result<()> {
        self.backend
            .drop_ledger()
            .await
            .map_err(|e| MigrateError::Provisioning(format!("Failed to drop migrations table: {}", e)))
    }

    async fn apply(&self, step: &RegisteredStep<B::Tx>) -> Result<()> {
        let name = step.name();
        let mut tx = self.open(step).await?;

        if let Err(e) = self.run_step(step, &mut tx).await {
            self.discard(tx, name).await;
            return Err(MigrateError::execution(name, e));
        }

        if let Err(e) = self.backend.record(&mut tx, &LedgerEntry::applied(name)).await {
            self.discard(tx, name).await;
            return Err(MigrateError::LedgerWrite {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }

        self.commit(tx, name).await
    }

    async fn revert(&self, step: &RegisteredStep<B::Tx>) -> Result<()> {
        let name = step.name();
        let mut tx = self.open(step).await?;

        if let Err(e) = self.run_step(step, &mut tx).await {
            self.discard(tx, name).await;
            return Err(MigrateError::execution(name, e));
        }

        self.commit(tx, name).await
    }

    async fn open(&self, step: &RegisteredStep<B::Tx>) -> Result<B::Tx> {
        let tx = self.backend.begin().await.map_err(|e| match e {
            MigrateError::Transaction(_) => e,
            other => MigrateError::Transaction(format!(
                "Failed to start transaction for {}: {}",
                step.name(),
                other
            )),
        })?;
        debug!("Opened transaction for {} ({})", step.name(), step.tag());
        Ok(tx)
    }

    async fn run_step(&self, step: &RegisteredStep<B::Tx>, tx: &mut B::Tx) -> Result<()> {
        match self.policy.step_timeout() {
            Some(limit) => tokio::time::timeout(limit, step.step().run(tx))
                .await
                .map_err(|_| MigrateError::Timeout(format!("step exceeded {:?}", limit)))?,
            None => step.step().run(tx).await,
        }
    }

    async fn commit(&self, tx: B::Tx, name: &str) -> Result<()> {
        self.backend
            .commit(tx)
            .await
            .map_err(|e| MigrateError::Commit {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn discard(&self, tx: B::Tx, name: &str) {
        if let Err(e) = self.backend.rollback(tx).await {
            warn!("Failed to roll back transaction for {}: {}", name, e);
        }
    }
}

fn failure<Tx>(step: &RegisteredStep<Tx>, err: &MigrateError) -> StepFailure {
    StepFailure {
        tag: step.tag(),
        name: step.name().to_string(),
        error: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tidemark_core::step::{BoxFuture, FnStep};
    use tidemark_core::testing::{MemoryBackend, MemoryTx, TxEvent};

    /// Step that records its invocation in a shared sequence.
    struct Recorder {
        name: String,
        counter: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<(usize, String)>>>,
        fail: bool,
    }

    impl MigrationStep<MemoryTx> for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn run<'a>(&'a self, tx: &'a mut MemoryTx) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                self.seen.lock().unwrap().push((seq, self.name.clone()));
                tx.execute(format!("-- {}", self.name));
                if self.fail {
                    return Err(MigrateError::Step(format!("{} exploded", self.name)));
                }
                Ok(())
            })
        }
    }

    struct Harness {
        counter: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<(usize, String)>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                counter: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn step(&self, name: &str) -> Recorder {
            Recorder {
                name: name.to_string(),
                counter: self.counter.clone(),
                seen: self.seen.clone(),
                fail: false,
            }
        }

        fn failing(&self, name: &str) -> Recorder {
            Recorder {
                fail: true,
                ..self.step(name)
            }
        }

        fn seen(&self) -> Vec<(usize, String)> {
            self.seen.lock().unwrap().clone()
        }

        fn names(&self) -> Vec<String> {
            self.seen().into_iter().map(|(_, n)| n).collect()
        }
    }

    fn migrator(backend: &MemoryBackend) -> Migrator<MemoryBackend> {
        Migrator::new(backend.clone(), PolicyConfig::default())
    }

    #[tokio::test]
    async fn test_forward_steps_run_in_order() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.step("0002_b")).unwrap();
        m.add_migration(harness.step("0003_c")).unwrap();

        let summary = m.migrate_all().await.unwrap();

        let sequence: Vec<usize> = harness.seen().into_iter().map(|(s, _)| s).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
        assert_eq!(summary.completed, vec!["0001_a", "0002_b", "0003_c"]);
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn test_each_step_commits_before_next_begins() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.step("0002_b")).unwrap();

        m.migrate_all().await.unwrap();

        assert_eq!(
            backend.journal(),
            vec![
                TxEvent::Begin(1),
                TxEvent::Record(1, "0001_a".to_string()),
                TxEvent::Commit(1),
                TxEvent::Begin(2),
                TxEvent::Record(2, "0002_b".to_string()),
                TxEvent::Commit(2),
            ]
        );
    }

    #[tokio::test]
    async fn test_ledger_complete_after_success() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        for name in ["0001_a", "0002_b", "0003_c"] {
            m.add_migration(harness.step(name)).unwrap();
        }

        m.migrate_all().await.unwrap();

        let ledger = backend.ledger();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.iter().all(|e| e.is_applied));
        assert_eq!(backend.ledger_names(), vec!["0001_a", "0002_b", "0003_c"]);
    }

    #[tokio::test]
    async fn test_failed_step_is_atomic_and_stops_run() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.failing("0002_b")).unwrap();
        m.add_migration(harness.step("0003_c")).unwrap();

        let err = m.migrate_all().await.unwrap_err();

        match &err {
            MigrateError::Execution { name, source } => {
                assert_eq!(name, "0002_b");
                assert!(source.to_string().contains("0002_b exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(harness.names(), vec!["0001_a", "0002_b"]);
        assert_eq!(backend.ledger_names(), vec!["0001_a"]);
        assert_eq!(backend.executed(), vec!["-- 0001_a"]);
        assert_eq!(backend.journal().last(), Some(&TxEvent::Rollback(2)));
    }

    #[tokio::test]
    async fn test_ledger_write_failure_rolls_back_step() {
        let backend = MemoryBackend::new("app");
        backend.fail_record_for("0002_b");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.step("0002_b")).unwrap();
        m.add_migration(harness.step("0003_c")).unwrap();

        let err = m.migrate_all().await.unwrap_err();

        assert!(matches!(err, MigrateError::LedgerWrite { ref name, .. } if name == "0002_b"));
        assert_eq!(backend.executed(), vec!["-- 0001_a"]);
        assert_eq!(backend.ledger_names(), vec!["0001_a"]);
        assert_eq!(harness.names(), vec!["0001_a", "0002_b"]);
    }

    #[tokio::test]
    async fn test_commit_failure_aborts_forward_run() {
        let backend = MemoryBackend::new("app");
        backend.fail_commit_at(2);
        let harness = Harness::new();
        let mut m = Migrator::new(
            backend.clone(),
            PolicyConfig {
                forward: FailurePolicy::Continue,
                ..Default::default()
            },
        );
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.step("0002_b")).unwrap();
        m.add_migration(harness.step("0003_c")).unwrap();

        let err = m.migrate_all().await.unwrap_err();

        assert!(matches!(err, MigrateError::Commit { ref name, .. } if name == "0002_b"));
        assert_eq!(backend.ledger_names(), vec!["0001_a"]);
        assert_eq!(harness.names(), vec!["0001_a", "0002_b"]);
    }

    #[tokio::test]
    async fn test_forward_continue_policy_skips_failed_step() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = Migrator::new(
            backend.clone(),
            PolicyConfig {
                forward: FailurePolicy::Continue,
                ..Default::default()
            },
        );
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.failing("0002_b")).unwrap();
        m.add_migration(harness.step("0003_c")).unwrap();

        let summary = m.migrate_all().await.unwrap();

        assert_eq!(summary.completed, vec!["0001_a", "0003_c"]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].tag, "Up00000002");
        assert_eq!(backend.ledger_names(), vec!["0001_a", "0003_c"]);
    }

    #[tokio::test]
    async fn test_rollback_runs_in_reverse_order() {
        let backend = MemoryBackend::provisioned("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_rollback(harness.step("D1")).unwrap();
        m.add_rollback(harness.step("D2")).unwrap();
        m.add_rollback(harness.step("D3")).unwrap();

        let summary = m.rollback_all().await.unwrap();

        assert_eq!(harness.names(), vec!["D3", "D2", "D1"]);
        assert_eq!(summary.completed, vec!["D3", "D2", "D1"]);
        assert!(backend.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_is_best_effort_by_default() {
        let backend = MemoryBackend::provisioned("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_rollback(harness.step("D1")).unwrap();
        m.add_rollback(harness.failing("D2")).unwrap();
        m.add_rollback(harness.step("D3")).unwrap();

        let summary = m.rollback_all().await.unwrap();

        assert_eq!(harness.names(), vec!["D3", "D2", "D1"]);
        assert_eq!(summary.completed, vec!["D3", "D1"]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "D2");
        assert_eq!(summary.failures[0].tag, "Down00000002");
        assert!(!summary.is_clean());
        assert_eq!(backend.executed(), vec!["-- D3", "-- D1"]);
    }

    #[tokio::test]
    async fn test_rollback_does_not_touch_ledger() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_rollback(harness.step("0001_a_down")).unwrap();

        m.migrate_all().await.unwrap();
        m.rollback_all().await.unwrap();

        assert_eq!(backend.ledger_names(), vec!["0001_a"]);
        assert!(backend.ledger()[0].is_applied);
    }

    #[tokio::test]
    async fn test_rollback_abort_policy_stops_at_failure() {
        let backend = MemoryBackend::provisioned("app");
        let harness = Harness::new();
        let mut m = Migrator::new(
            backend.clone(),
            PolicyConfig {
                reverse: FailurePolicy::Abort,
                ..Default::default()
            },
        );
        m.add_rollback(harness.step("D1")).unwrap();
        m.add_rollback(harness.failing("D2")).unwrap();
        m.add_rollback(harness.step("D3")).unwrap();

        let err = m.rollback_all().await.unwrap_err();

        assert!(matches!(err, MigrateError::Execution { ref name, .. } if name == "D2"));
        assert_eq!(harness.names(), vec!["D3", "D2"]);
    }

    #[tokio::test]
    async fn test_rollback_aborts_when_transaction_cannot_open() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        assert_eq!(m.policy().reverse, FailurePolicy::Continue);
        m.add_rollback(harness.step("D1")).unwrap();
        m.add_rollback(harness.step("D2")).unwrap();

        let err = m.rollback_all().await.unwrap_err();

        assert!(matches!(err, MigrateError::Transaction(ref msg) if msg.contains("D2")));
        assert!(harness.names().is_empty());
        assert!(backend.journal().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_commit_failure_aborts() {
        let backend = MemoryBackend::provisioned("app");
        backend.fail_commit_at(1);
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_rollback(harness.step("D1")).unwrap();
        m.add_rollback(harness.step("D2")).unwrap();

        let err = m.rollback_all().await.unwrap_err();

        assert!(matches!(err, MigrateError::Commit { ref name, .. } if name == "D2"));
        assert_eq!(harness.names(), vec!["D2"]);
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once_per_target() {
        let backend = MemoryBackend::new("app");
        let m = migrator(&backend);

        m.ensure_ready().await.unwrap();
        m.ensure_ready().await.unwrap();
        m.migrate_all().await.unwrap();

        assert_eq!(backend.database_creations(), 1);
        assert_eq!(backend.ledger_creations(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_aborts_before_any_step() {
        let backend = MemoryBackend::new("app");
        backend.fail_create_database();
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();

        let err = m.migrate_all().await.unwrap_err();

        assert!(matches!(err, MigrateError::Provisioning(_)));
        assert!(harness.names().is_empty());
    }

    #[tokio::test]
    async fn test_reset_reapplies_from_empty() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.step("0002_b")).unwrap();

        m.migrate_all().await.unwrap();
        assert_eq!(backend.ledger().len(), 2);

        let summary = m.reset("app").await.unwrap();

        assert_eq!(summary.completed, vec!["0001_a", "0002_b"]);
        assert_eq!(backend.database_drops(), 1);
        assert_eq!(backend.ledger_names(), vec!["0001_a", "0002_b"]);
        assert_eq!(backend.executed(), vec!["-- 0001_a", "-- 0002_b"]);
    }

    #[tokio::test]
    async fn test_reset_tolerates_missing_database() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();

        m.reset("app").await.unwrap();

        assert_eq!(backend.database_drops(), 1);
        assert_eq!(backend.ledger_names(), vec!["0001_a"]);
    }

    #[tokio::test]
    async fn test_reset_fails_when_create_fails() {
        let backend = MemoryBackend::provisioned("app");
        backend.fail_create_database();
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();

        let err = m.reset("app").await.unwrap_err();

        assert!(matches!(err, MigrateError::Provisioning(_)));
        assert!(harness.names().is_empty());
    }

    #[tokio::test]
    async fn test_reset_rejects_other_database() {
        let backend = MemoryBackend::provisioned("app");
        let m = migrator(&backend);

        let err = m.reset("production").await.unwrap_err();

        assert!(matches!(err, MigrateError::InvalidArgument(_)));
        assert_eq!(backend.database_drops(), 0);
    }

    #[tokio::test]
    async fn test_registration_closed_after_run() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();

        m.migrate_all().await.unwrap();

        let err = m.add_migration(harness.step("0002_b")).unwrap_err();
        assert!(matches!(err, MigrateError::RegistrationClosed(_)));
        assert!(m.add_rollback(harness.step("0001_a_down")).is_err());
    }

    #[tokio::test]
    async fn test_reruns_applied_steps_by_default() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();

        m.migrate_all().await.unwrap();
        m.migrate_all().await.unwrap();

        assert_eq!(backend.ledger_names(), vec!["0001_a", "0001_a"]);
    }

    #[tokio::test]
    async fn test_skip_applied() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = Migrator::new(
            backend.clone(),
            PolicyConfig {
                skip_applied: true,
                ..Default::default()
            },
        );
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.step("0002_b")).unwrap();

        m.migrate_all().await.unwrap();
        let summary = m.migrate_all().await.unwrap();

        assert!(summary.completed.is_empty());
        assert_eq!(summary.skipped, vec!["0001_a", "0002_b"]);
        assert_eq!(backend.ledger().len(), 2);
    }

    #[tokio::test]
    async fn test_status_reports_pending() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.add_migration(harness.failing("0002_b")).unwrap();

        let before = m.status().await.unwrap();
        assert!(before.applied.is_empty());
        assert_eq!(before.pending, vec!["0001_a", "0002_b"]);

        m.migrate_all().await.unwrap_err();

        let after = m.status().await.unwrap();
        assert_eq!(after.applied.len(), 1);
        assert_eq!(after.pending, vec!["0002_b"]);
    }

    #[tokio::test]
    async fn test_step_timeout() {
        let backend = MemoryBackend::new("app");
        let mut m = Migrator::new(
            backend.clone(),
            PolicyConfig {
                step_timeout_ms: Some(20),
                ..Default::default()
            },
        );
        m.add_migration(FnStep::new("0001_slow", |_tx: &mut MemoryTx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        }))
        .unwrap();

        let err = m.migrate_all().await.unwrap_err();

        match err {
            MigrateError::Execution { name, source } => {
                assert_eq!(name, "0001_slow");
                assert!(matches!(*source, MigrateError::Timeout(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(backend.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_drop_ledger() {
        let backend = MemoryBackend::new("app");
        let harness = Harness::new();
        let mut m = migrator(&backend);
        m.add_migration(harness.step("0001_a")).unwrap();
        m.migrate_all().await.unwrap();

        m.drop_ledger().await.unwrap();

        assert!(!backend.ledger_exists_now());
        assert!(backend.ledger().is_empty());
    }
}
