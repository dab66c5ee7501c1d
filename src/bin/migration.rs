//! Schema management for the storefront database.
//!
//! Run with: cargo run --bin migration -- <up|down|status|fresh>

use anyhow::Context;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use storefront_api::{config, db, migrator::Migrator};

#[derive(Parser, Debug)]
#[command(name = "migration", about = "Apply or roll back storefront schema migrations")]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop every table and reapply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }

    info!("Connecting to database: {}", cfg.database_url());
    let pool = db::establish_connection_from_app_config(&cfg).await?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => {
            db::run_migrations(&pool).await?;
        }
        Command::Down { steps } => {
            Migrator::down(&pool, Some(steps)).await?;
            info!(steps, "Rolled back migrations");
        }
        Command::Status => {
            Migrator::status(&pool).await?;
        }
        Command::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("Recreated schema from scratch");
        }
    }

    db::close_pool(pool).await?;
    Ok(())
}
