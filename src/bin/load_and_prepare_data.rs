use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use sp500_news_reaction::models::Config;
use sp500_news_reaction::pipeline;

/// Load raw tick/news files, fetch FRED and Yahoo data and derive the
/// regime and daily summary tables
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    pipeline::init_logging();

    let config = Config::from_env()?.with_database_path(args.database.as_deref());
    pipeline::load_and_prepare(&config).await?;

    info!("🎉 Data loaded and prepared in {}", config.database_path.display());
    Ok(())
}
