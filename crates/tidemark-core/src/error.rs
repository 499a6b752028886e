use thiserror::Error;

/// Core error type for tidemark operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Cannot run migration '{name}': {source}")]
    Execution {
        name: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("Cannot update migrations table for '{name}': {reason}")]
    LedgerWrite { name: String, reason: String },

    #[error("Cannot commit migration '{name}': {reason}")]
    Commit { name: String, reason: String },

    #[error("Registration closed: {0}")]
    RegistrationClosed(String),

    #[error("Step failed: {0}")]
    Step(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl MigrateError {
    /// Wrap a failure reported by a step's own action.
    pub fn execution(name: impl Into<String>, source: MigrateError) -> Self {
        Self::Execution {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Whether this failure stops a run regardless of the configured failure policy.
    ///
    /// A transaction that cannot be opened or committed leaves the target in an
    /// unknown state, so neither direction continues past it.
    pub fn aborts_run(&self) -> bool {
        matches!(self, Self::Transaction(_) | Self::Commit { .. })
    }
}

/// Result type alias using MigrateError.
pub type Result<T> = std::result::Result<T, MigrateError>;
