pub mod config;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod step;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{DatabaseConfig, FailurePolicy, PolicyConfig, TidemarkConfig};
pub use error::{MigrateError, Result};
pub use ledger::{LedgerEntry, MigrationStatus};
pub use registry::{MigrationRegistry, RegisteredStep};
pub use step::{BoxFuture, Direction, FnStep, MigrationStep};
pub use store::{Backend, LedgerStore, Provisioner};
