mod bootstrap;
mod runner;
mod sql;

pub use bootstrap::ensure_ready;
pub use runner::{Migrator, RunSummary, StepFailure};
pub use sql::{load_sql_migrations, SqlMigration, SqlStep};
