use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indexer_store::{MaterializedView, Store, StoreConfig};
use schemars::schema_for;
use strum::IntoEnumIterator;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct CliOptions {
    /// Path to a YAML configuration file. Takes precedence over
    /// `--database-url`.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Primary database URL, for running without a configuration file.
    #[clap(long, env = "INDEXER_DB_URL")]
    database_url: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all pending database migrations.
    Migrate,
    /// Refresh every materialized view.
    RefreshViews {
        /// Keep the views readable while refreshing.
        #[clap(long)]
        concurrently: bool,
    },
    /// Print the JSON schema of the configuration file.
    ConfigSchema,
}

impl CliOptions {
    fn store_config(&self) -> anyhow::Result<StoreConfig> {
        match (&self.config, &self.database_url) {
            (Some(path), _) => StoreConfig::read(path),
            (None, Some(url)) => Ok(StoreConfig::for_database(url.clone())),
            (None, None) => anyhow::bail!("either --config or --database-url must be given"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli_options = CliOptions::parse();

    match &cli_options.command {
        Command::Migrate => {
            info!("Loading configuration");
            let mut config = cli_options.store_config()?;
            // `Store::new` runs them.
            config.run_migrations = true;
            Store::new(&config)
                .await
                .context("failed to run migrations")?;
            info!("Migrations complete");
        }
        Command::RefreshViews { concurrently } => {
            info!("Loading configuration");
            let config = cli_options.store_config()?;
            let store = Store::new(&config)
                .await
                .context("failed to initialize store")?;
            for view in MaterializedView::iter() {
                store
                    .refresh_materialized_view(view, *concurrently, None)
                    .await
                    .with_context(|| format!("failed to refresh {view}"))?;
            }
            info!("Refreshed all materialized views");
        }
        Command::ConfigSchema => {
            let schema = schema_for!(StoreConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
