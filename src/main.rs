//! Tribe maintenance commands.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tribe::config::Config;
use tribe::{db, Tribe};

#[derive(Parser, Debug)]
#[command(name = "tribe", about = "Maintenance for the Tribe geneset store")]
struct Cli {
    /// Overrides TRIBE_DB_PATH
    #[arg(long, env = "TRIBE_DB_PATH")]
    db_path: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Recompute the cached gene count of genesets from their tips
    RefreshTipCounts {
        /// Required; every geneset is refreshed
        #[arg(long)]
        all: bool,
    },
    /// Recompute version hashes and report any that do not match
    VerifyChains,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env();
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Database path: {:?}", config.db_path);

    // Migrations run on every open
    let pool = db::init_database(&config.db_path).await?;

    match cli.command {
        Command::Migrate => {
            tracing::info!("Schema is up to date");
        }
        Command::RefreshTipCounts { all } => {
            if !all {
                return Err("refresh-tip-counts needs --all".into());
            }
            let tribe = Tribe::from_config(pool, &config)?;
            let refreshed = tribe.refresh_tip_item_counts().await?;
            println!("Refreshed {} genesets", refreshed);
        }
        Command::VerifyChains => {
            let tribe = Tribe::from_config(pool, &config)?;
            let mut broken = 0;
            for id in tribe.repository().list_geneset_ids().await? {
                for mismatch in tribe.verify_chain(&id).await? {
                    broken += 1;
                    println!(
                        "{}\t{}\t{}\texpected {}",
                        id,
                        mismatch.version_id,
                        mismatch.stored_hash,
                        mismatch.expected_hash.as_deref().unwrap_or("<missing parent>")
                    );
                }
            }
            if broken > 0 {
                return Err(format!("{} versions failed verification", broken).into());
            }
            tracing::info!("All version chains verify");
        }
    }

    Ok(())
}
