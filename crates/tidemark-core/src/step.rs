use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Boxed future returned by step and store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single schema change, run inside one transaction.
///
/// `Tx` is the transaction handle of the backend the step is registered
/// against. The step receives it for the duration of `run` only; it must not
/// commit or roll back, the engine owns the transaction boundary.
pub trait MigrationStep<Tx>: Send + Sync {
    /// Name recorded in the ledger and used in logs.
    fn name(&self) -> &str;

    /// Perform the change.
    fn run<'a>(&'a self, tx: &'a mut Tx) -> BoxFuture<'a, Result<()>>;
}

/// Direction of a registered step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
        }
    }
}

/// Type alias for a boxed step handler closure.
pub type BoxedStepHandler<Tx> =
    Box<dyn for<'a> Fn(&'a mut Tx) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// A step backed by a closure.
///
/// ```ignore
/// let step = FnStep::new("0001_create_users", |tx: &mut PgTx| {
///     Box::pin(async move {
///         sqlx::query("CREATE TABLE users (id UUID PRIMARY KEY)")
///             .execute(&mut **tx)
///             .await?;
///         Ok(())
///     })
/// });
/// ```
pub struct FnStep<Tx> {
    name: String,
    handler: BoxedStepHandler<Tx>,
}

impl<Tx> FnStep<Tx> {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Tx) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }
}

impl<Tx> MigrationStep<Tx> for FnStep<Tx> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, tx: &'a mut Tx) -> BoxFuture<'a, Result<()>> {
        (self.handler)(tx)
    }
}

impl<Tx> fmt::Debug for FnStep<Tx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Up.to_string(), "Up");
        assert_eq!(Direction::Down.to_string(), "Down");
    }

    #[test]
    fn test_fn_step_runs_against_transaction() {
        let step = FnStep::new("push", |tx: &mut Vec<&'static str>| {
            Box::pin(async move {
                tx.push("created");
                Ok(())
            })
        });

        let mut tx = Vec::new();
        tokio_test::block_on(step.run(&mut tx)).unwrap();
        assert_eq!(step.name(), "push");
        assert_eq!(tx, vec!["created"]);
    }

    #[test]
    fn test_fn_step_reports_error() {
        let step = FnStep::new("broken", |_tx: &mut ()| {
            Box::pin(async move { Err(MigrateError::Step("syntax error".into())) })
        });

        let err = tokio_test::block_on(step.run(&mut ())).unwrap_err();
        assert!(matches!(err, MigrateError::Step(_)));
    }
}
