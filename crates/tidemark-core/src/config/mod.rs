mod database;
mod policy;

pub use database::DatabaseConfig;
pub use policy::{FailurePolicy, PolicyConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MigrateError, Result};

/// Root configuration for tidemark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidemarkConfig {
    /// Database connection configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Ledger table configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Run failure policy.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TidemarkConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MigrateError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;

        toml::from_str(&content)
            .map_err(|e| MigrateError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Ledger table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Table name, created inside `database.schema`.
    #[serde(default = "default_ledger_table")]
    pub table: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            table: default_ledger_table(),
        }
    }
}

fn default_ledger_table() -> String {
    "migrations".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG` when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output JSON format.
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Substitute environment variables in the format ${VAR_NAME}.
///
/// Unset variables are left in place.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TidemarkConfig::default();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.ledger.table, "migrations");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.policy.forward, FailurePolicy::Abort);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = TidemarkConfig::parse_toml("").unwrap();
        assert_eq!(config.database.database, "tidemark");
        assert_eq!(config.ledger.table, "migrations");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [database]
            host = "10.0.0.5"
            port = 5433
            schema = "app"
            database = "orders"
            user = "migrator"
            password = "secret"

            [ledger]
            table = "schema_ledger"

            [policy]
            forward = "abort"
            reverse = "abort"
            skip_applied = true

            [logging]
            level = "debug"
            json_format = true
        "#;

        let config = TidemarkConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.host, "10.0.0.5");
        assert_eq!(config.database.port, 5433);
        assert_eq!(config.database.user, "migrator");
        assert_eq!(config.ledger.table, "schema_ledger");
        assert_eq!(config.policy.reverse, FailurePolicy::Abort);
        assert!(config.policy.skip_applied);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_parse_invalid_config() {
        let err = TidemarkConfig::parse_toml("[database]\nport = \"not a port\"").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TIDEMARK_TEST_DB_PASSWORD", "from-env");

        let toml = r#"
            [database]
            password = "${TIDEMARK_TEST_DB_PASSWORD}"
        "#;

        let config = TidemarkConfig::parse_toml(toml).unwrap();
        assert_eq!(config.database.password, "from-env");

        std::env::remove_var("TIDEMARK_TEST_DB_PASSWORD");
    }
}
