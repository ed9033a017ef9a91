use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use demand_planner::{config, db};
use migrations::Migrator;
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the demand planner schema", version)]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<MigrationCommand>,
}

#[derive(Subcommand, Clone, Copy)]
enum MigrationCommand {
    /// Apply every pending migration (default)
    Up,
    /// Roll back the most recent migration
    Down,
    /// Drop every table and re-apply all migrations
    Fresh,
    /// List applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("Starting database migration");
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(MigrationCommand::Up) {
        MigrationCommand::Up => db::run_migrations(&pool).await?,
        MigrationCommand::Down => Migrator::down(&pool, Some(1))
            .await
            .context("rollback failed")?,
        MigrationCommand::Fresh => Migrator::fresh(&pool)
            .await
            .context("fresh migration failed")?,
        MigrationCommand::Status => Migrator::status(&pool)
            .await
            .context("status check failed")?,
    }

    info!("Migration completed successfully");
    db::close_pool(pool).await?;
    Ok(())
}
