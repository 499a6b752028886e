//! SQL text for provisioning and the ledger table.
//!
//! Identifiers cannot be bound as parameters, so they are quoted here.

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Schema-qualified, quoted table name.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Exact match: the DDL below quotes the name, so it is case-sensitive.
pub const DATABASE_EXISTS: &str =
    "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1)";

pub const TABLE_EXISTS: &str = r#"
    SELECT EXISTS (
        SELECT 1
        FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
        AND c.relname = $2
        AND c.relkind = 'r'
    )
"#;

/// Other sessions must be gone before DROP DATABASE succeeds.
pub const TERMINATE_BACKENDS: &str =
    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1 AND pid <> pg_backend_pid()";

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE {}", quote_ident(database))
}

pub fn drop_database(database: &str) -> String {
    format!("DROP DATABASE {}", quote_ident(database))
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

pub fn create_ledger(schema: &str, table: &str) -> String {
    format!(
        r#"CREATE TABLE {} (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            is_applied BOOLEAN NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )"#,
        qualified(schema, table)
    )
}

pub fn drop_ledger(schema: &str, table: &str) -> String {
    format!("DROP TABLE {}", qualified(schema, table))
}

/// `created_at` comes from the server clock so ledger order follows commit order.
pub fn insert_entry(schema: &str, table: &str) -> String {
    format!(
        "INSERT INTO {} (id, name, is_applied, created_at) VALUES ($1, $2, $3, clock_timestamp())",
        qualified(schema, table)
    )
}

pub fn select_entries(schema: &str, table: &str) -> String {
    format!(
        "SELECT id, name, is_applied, created_at FROM {} ORDER BY created_at ASC",
        qualified(schema, table)
    )
}
