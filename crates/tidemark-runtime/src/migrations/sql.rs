//! Steps backed by SQL scripts.

use std::collections::BTreeMap;
use std::path::Path;

use tidemark_core::error::{MigrateError, Result};
use tidemark_core::step::{BoxFuture, MigrationStep};
use tracing::debug;

use super::runner::Migrator;
use crate::postgres::{PgBackend, PgTx};

/// A step that runs a SQL script inside the step transaction.
#[derive(Debug, Clone)]
pub struct SqlStep {
    name: String,
    sql: String,
}

impl SqlStep {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Statements of the script, with comments removed.
    pub fn statements(&self) -> Vec<String> {
        split_sql_statements(&self.sql)
    }
}

impl MigrationStep<PgTx> for SqlStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, tx: &'a mut PgTx) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for statement in self.statements() {
                sqlx::query(&statement).execute(&mut **tx).await?;
            }
            Ok(())
        })
    }
}

/// An up script and its optional down script, loaded from a directory.
#[derive(Debug, Clone)]
pub struct SqlMigration {
    pub name: String,
    pub up: SqlStep,
    pub down: Option<SqlStep>,
}

impl Migrator<PgBackend> {
    /// Register loaded SQL migrations.
    ///
    /// Up scripts are registered in the given order; down scripts in the same
    /// order, so `rollback_all` reverts the newest first.
    pub fn register_sql(&mut self, migrations: Vec<SqlMigration>) -> Result<()> {
        for migration in migrations {
            self.add_migration(migration.up)?;
            if let Some(down) = migration.down {
                self.add_rollback(down)?;
            }
        }
        Ok(())
    }
}

/// Split a script into statements on top-level `;`.
///
/// Semicolons inside single-quoted literals (with `''` escapes), quoted
/// identifiers, dollar-quoted bodies (`$$` or `$tag$`) and comments do not
/// split. `--` and `/* */` comments are dropped; block comments may nest.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"') => {
                let end = quoted_end(&chars, i, quote);
                current.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i = block_comment_end(&chars, i);
                current.push(' ');
            }
            '$' if !ends_in_identifier(&current) => match dollar_tag_len(&chars, i) {
                Some(len) => {
                    let end = dollar_quoted_end(&chars, i, len);
                    current.extend(&chars[i..end]);
                    i = end;
                }
                None => {
                    current.push('$');
                    i += 1;
                }
            },
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &str) {
    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}

/// Index just past the closing quote; a doubled quote is an escape.
fn quoted_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index just past the comment opened at `start`.
fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('/', Some('*')) => {
                depth += 1;
                i += 2;
            }
            ('*', Some('/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

/// Length of a `$$` or `$tag$` opener at `start`. `$1` is a parameter, not a tag.
fn dollar_tag_len(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    (chars.get(j) == Some(&'$')).then_some(j + 1 - start)
}

/// Index just past the closing tag matching the opener at `start`.
fn dollar_quoted_end(chars: &[char], start: usize, len: usize) -> usize {
    let tag = &chars[start..start + len];
    let mut i = start + len;
    while i + len <= chars.len() {
        if &chars[i..i + len] == tag {
            return i + len;
        }
        i += 1;
    }
    chars.len()
}

fn ends_in_identifier(current: &str) -> bool {
    current
        .chars()
        .last()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Load SQL migrations from a directory.
///
/// Files are paired by stem:
/// - `0001_create_users.up.sql` / `0001_create_users.down.sql`
/// - `0002_add_posts.sql` (up only)
///
/// They are sorted by name and returned in that order.
pub fn load_sql_migrations(dir: &Path) -> Result<Vec<SqlMigration>> {
    if !dir.exists() {
        debug!("Migrations directory does not exist: {:?}", dir);
        return Ok(Vec::new());
    }

    let mut ups: BTreeMap<String, String> = BTreeMap::new();
    let mut downs: BTreeMap<String, String> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().map(|e| e != "sql").unwrap_or(true) {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MigrateError::Config(format!("Invalid migration filename: {:?}", path)))?;

        let sql = std::fs::read_to_string(&path)?;

        if let Some(name) = stem.strip_suffix(".down") {
            downs.insert(name.to_string(), sql);
        } else {
            let name = stem.strip_suffix(".up").unwrap_or(stem);
            if ups.insert(name.to_string(), sql).is_some() {
                return Err(MigrateError::Config(format!(
                    "Migration {} has both {}.sql and {}.up.sql",
                    name, name, name
                )));
            }
        }
    }

    if let Some(orphan) = downs.keys().find(|name| !ups.contains_key(*name)) {
        return Err(MigrateError::Config(format!(
            "Down migration {}.down.sql has no matching up migration",
            orphan
        )));
    }

    let migrations: Vec<SqlMigration> = ups
        .into_iter()
        .map(|(name, sql)| SqlMigration {
            down: downs
                .remove(&name)
                .map(|down| SqlStep::new(format!("{}_down", name), down)),
            up: SqlStep::new(name.clone(), sql),
            name,
        })
        .collect();

    debug!("Loaded {} SQL migrations", migrations.len());
    Ok(migrations)
}
