//! Testing utilities for tidemark.
//!
//! The engine is generic over its backend, so everything except the Postgres
//! statements themselves can be exercised against [`MemoryBackend`]:
//!
//! ```ignore
//! let backend = MemoryBackend::new("app");
//! let mut migrator = Migrator::new(backend.clone(), PolicyConfig::default());
//! migrator.add_migration(step)?;
//! migrator.migrate_all().await?;
//!
//! assert_eq!(backend.ledger_names(), vec!["0001_create_users"]);
//! ```

pub mod memory;

pub use memory::{MemoryBackend, MemoryTx, TxEvent};
