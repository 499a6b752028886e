pub mod db;
pub mod migrations;
pub mod observability;
pub mod postgres;

pub use db::Database;
pub use migrations::{load_sql_migrations, Migrator, RunSummary, SqlMigration, SqlStep};
pub use observability::init_logging;
pub use postgres::{PgBackend, PgTx};
