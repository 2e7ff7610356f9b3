mod catalog;
mod db;
mod inventory;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kidswear_core::{AppConfig, CategoryKind};
use kidswear_services::{PgStore, Services};
use tracing_subscriber::EnvFilter;

use catalog::SearchArgs;

#[derive(Debug, Parser)]
#[command(name = "kidswear")]
#[command(about = "Kidswear storefront operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inventory reports
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },
    /// List the category registry
    Categories {
        /// Only smart or only basic categories
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Run a catalog search against the live store
    Search(SearchArgs),
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load the seed catalog (products and inventory)
    Seed {
        /// Catalog file; defaults to `KIDSWEAR_CATALOG_PATH`
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum InventoryCommands {
    /// Variants at or below their low-stock threshold, most severe first
    Alerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum KindArg {
    Smart,
    Basic,
}

impl From<KindArg> for CategoryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Smart => CategoryKind::Smart,
            KindArg::Basic => CategoryKind::Basic,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("kidswear: run with --help to list commands");
        return Ok(());
    };

    let config = kidswear_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Categories { kind } => {
            catalog::run_categories(&config, kind.map(CategoryKind::from));
        }
        Commands::Db { command } => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Ping => db::run_ping(&pool).await?,
                DbCommands::Migrate => db::run_migrate(&pool).await?,
                DbCommands::Seed { path } => {
                    let path = path.unwrap_or_else(|| config.catalog_path.clone());
                    db::run_seed(&pool, &path, config.low_stock_default).await?;
                }
            }
        }
        Commands::Inventory {
            command: InventoryCommands::Alerts,
        } => inventory::run_alerts(&services(&config).await?).await?,
        Commands::Search(args) => catalog::run_search(&services(&config).await?, args).await?,
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = kidswear_db::PoolConfig::from_app_config(config);
    Ok(kidswear_db::connect_pool(&config.database_url, pool_config).await?)
}

async fn services(config: &AppConfig) -> anyhow::Result<Services<PgStore>> {
    let pool = connect(config).await?;
    Ok(Services::from_config(Arc::new(PgStore::new(pool)), config))
}

#[cfg(test)]
mod tests;
