mod migrate;

pub use migrate::MigrateContext;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// tidemark - sequential PostgreSQL schema migrations
#[derive(Parser)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "tidemark.toml", global = true)]
    pub config: String,

    /// Migrations directory path.
    #[arg(short, long, default_value = "migrations", global = true)]
    pub migrations_dir: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply every migration in order.
    Up,

    /// Run every down migration, newest first.
    Down,

    /// Drop and recreate the target database, then apply every migration.
    Reset {
        /// Name of the target database, as a confirmation.
        name: String,
    },

    /// Show applied and pending migrations.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let ctx = MigrateContext::load(&self.config, &self.migrations_dir).await?;

        let result = match self.command {
            Commands::Up => ctx.up().await,
            Commands::Down => ctx.down().await,
            Commands::Reset { name } => ctx.reset(&name).await,
            Commands::Status { json } => ctx.status(json).await,
        };

        ctx.close().await;
        result
    }
}
