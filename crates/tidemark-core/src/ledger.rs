//! The applied-migration ledger.
//!
//! One row is appended per successfully committed up-step, inside that step's
//! transaction. Rows are never removed or flipped to unapplied by a rollback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub name: String,
    pub is_applied: bool,
    /// Client time in memory; PostgreSQL rows carry the server clock.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// A fresh entry marking `name` as applied now.
    pub fn applied(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_applied: true,
            created_at: Utc::now(),
        }
    }
}

/// Applied versus pending migrations for a registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    /// Ledger rows, oldest first.
    pub applied: Vec<LedgerEntry>,
    /// Registered up-steps with no ledger row, in registration order.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Build a status from ledger rows and the registered up-step names.
    pub fn from_ledger<'a>(
        applied: Vec<LedgerEntry>,
        registered: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let pending = registered
            .into_iter()
            .filter(|name| !applied.iter().any(|e| e.is_applied && e.name == *name))
            .map(str::to_string)
            .collect();

        Self { applied, pending }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_entry() {
        let a = LedgerEntry::applied("0001_create_users");
        let b = LedgerEntry::applied("0001_create_users");
        assert!(a.is_applied);
        assert_eq!(a.name, "0001_create_users");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_pending_preserves_registration_order() {
        let applied = vec![LedgerEntry::applied("0002_b")];
        let status = MigrationStatus::from_ledger(applied, ["0001_a", "0002_b", "0003_c"]);

        assert_eq!(status.applied.len(), 1);
        assert_eq!(status.pending, vec!["0001_a", "0003_c"]);
        assert!(!status.is_up_to_date());
    }

    #[test]
    fn test_status_up_to_date() {
        let applied = vec![LedgerEntry::applied("0001_a")];
        let status = MigrationStatus::from_ledger(applied, ["0001_a"]);
        assert!(status.is_up_to_date());
    }
}
