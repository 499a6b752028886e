use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

/// Database configuration.
///
/// Every field has a default so that an empty `[database]` section (or none at
/// all) targets a local PostgreSQL with the stock superuser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Schema that holds the ledger table and is put on the search path.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Logical database the migrations target.
    #[serde(default = "default_database")]
    pub database: String,

    /// Login role.
    #[serde(default = "default_user")]
    pub user: String,

    /// Login password.
    #[serde(default = "default_password")]
    pub password: String,

    /// Database used for CREATE/DROP DATABASE, which cannot run against the target itself.
    #[serde(default = "default_maintenance_database")]
    pub maintenance_database: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            schema: default_schema(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            maintenance_database: default_maintenance_database(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Connection options for the target database, with the schema on the search path.
    pub fn connect_options(&self) -> PgConnectOptions {
        self.base_options()
            .database(&self.database)
            .options([("search_path", self.schema.as_str())])
    }

    /// Connection options for the maintenance database.
    pub fn maintenance_options(&self) -> PgConnectOptions {
        self.base_options().database(&self.maintenance_database)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn base_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_database() -> String {
    "tidemark".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_password() -> String {
    "postgres".to_string()
}

fn default_maintenance_database() -> String {
    "postgres".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}
