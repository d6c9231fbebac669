use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use sp500_news_reaction::models::Config;
use sp500_news_reaction::pipeline;

/// Join the 1/5/15 minute event price delta tables into the final dataset CSV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Output CSV (overrides FINAL_DATASET_PATH)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    pipeline::init_logging();

    let mut config = Config::from_env()?.with_database_path(args.database.as_deref());
    if let Some(output) = args.output {
        config.final_dataset_path = output;
    }

    let rows = pipeline::export_analysis_dataset(&config).await?;
    println!("✅ Final dataset exported to: {} ({} rows)", config.final_dataset_path.display(), rows);
    Ok(())
}
