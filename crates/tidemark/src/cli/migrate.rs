use anyhow::Result;
use console::style;
use std::path::Path;
use tracing::info;

use tidemark_core::config::TidemarkConfig;
use tidemark_runtime::migrations::{load_sql_migrations, Migrator, RunSummary};
use tidemark_runtime::{init_logging, PgBackend};

/// Configuration plus an engine loaded with the directory's migrations.
pub struct MigrateContext {
    config: TidemarkConfig,
    migrations_dir: String,
    migrator: Migrator<PgBackend>,
}

impl MigrateContext {
    /// Load configuration, install logging, connect and register migrations.
    pub async fn load(config_path: &str, migrations_dir: &str) -> Result<Self> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let config = if Path::new(config_path).exists() {
            TidemarkConfig::from_file(config_path)?
        } else {
            TidemarkConfig::default()
        };

        init_logging(&config.logging)?;
        if !Path::new(config_path).exists() {
            info!("No {} found, using defaults", config_path);
        }

        let available = load_sql_migrations(Path::new(migrations_dir))?;

        let mut migrator = Migrator::<PgBackend>::init(&config).await?;
        migrator.register_sql(available)?;

        Ok(Self {
            config,
            migrations_dir: migrations_dir.to_string(),
            migrator,
        })
    }

    pub async fn up(&self) -> Result<()> {
        banner("Migrations");

        if self.migrator.registry().up().is_empty() {
            println!(
                "  {} No migrations found in {}",
                style("ℹ").blue(),
                self.migrations_dir
            );
            return Ok(());
        }

        println!("  {} Running migrations...", style("→").dim());
        let summary = self.migrator.migrate_all().await?;
        print_summary(&summary, "Applied");
        Ok(())
    }

    pub async fn down(&self) -> Result<()> {
        banner("Rollback");

        if self.migrator.registry().down().is_empty() {
            println!(
                "  {} No down migrations found in {}",
                style("ℹ").blue(),
                self.migrations_dir
            );
            return Ok(());
        }

        println!("  {} Rolling back...", style("→").dim());
        let summary = self.migrator.rollback_all().await?;
        print_summary(&summary, "Rolled back");

        if !summary.is_clean() {
            anyhow::bail!(
                "{} down migration(s) failed; the database may be partially rolled back",
                summary.failures.len()
            );
        }
        Ok(())
    }

    pub async fn reset(&self, name: &str) -> Result<()> {
        banner("Reset");

        println!(
            "  {} Recreating {}...",
            style("→").dim(),
            style(&self.config.database.database).yellow()
        );
        let summary = self.migrator.reset(name).await?;
        print_summary(&summary, "Applied");
        Ok(())
    }

    pub async fn status(&self, json: bool) -> Result<()> {
        let status = self.migrator.status().await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        banner("Migration Status");

        if status.applied.is_empty() && status.pending.is_empty() {
            println!("  {} No migrations found", style("ℹ").blue());
            return Ok(());
        }

        if !status.applied.is_empty() {
            println!("  {} Applied:", style("✓").green());
            for entry in &status.applied {
                println!(
                    "    {} {} ({})",
                    style(&entry.name).cyan(),
                    style("at").dim(),
                    entry.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        if !status.pending.is_empty() {
            if !status.applied.is_empty() {
                println!();
            }
            println!("  {} Pending:", style("○").yellow());
            for name in &status.pending {
                println!("    {} {}", style("→").dim(), style(name).yellow());
            }
        }

        println!();
        println!(
            "  {} {} applied, {} pending",
            style("ℹ").blue(),
            status.applied.len(),
            status.pending.len()
        );
        println!();
        Ok(())
    }

    /// Close the connection pools.
    pub async fn close(&self) {
        self.migrator.backend().database().close().await;
    }
}

fn banner(title: &str) {
    println!();
    println!("  {} {}", style("TIDEMARK").bold().cyan(), title);
    println!();
}

fn print_summary(summary: &RunSummary, verb: &str) {
    for name in &summary.completed {
        println!("  {} {}: {}", style("✓").green(), verb, name);
    }
    for name in &summary.skipped {
        println!("  {} Already applied: {}", style("-").dim(), name);
    }
    for failure in &summary.failures {
        println!(
            "  {} {} ({}): {}",
            style("✗").red(),
            failure.name,
            failure.tag,
            failure.error
        );
    }
    println!();
}
