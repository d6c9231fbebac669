use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use sp500_news_reaction::models::Config;
use sp500_news_reaction::pipeline;

/// Write one tick CSV per news event and window width (1m, 5m, 15m)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Output directory (overrides TICK_WINDOW_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    pipeline::init_logging();

    let mut config = Config::from_env()?.with_database_path(args.database.as_deref());
    if let Some(dir) = args.output_dir {
        config.tick_window_dir = dir;
    }

    let report = pipeline::extract_tick_windows(&config).await?;
    info!(
        "🎉 {} files for {} events in {} ({} repeated events, {} empty windows)",
        report.files_written.len(),
        report.events_processed,
        config.tick_window_dir.display(),
        report.duplicate_events,
        report.empty_windows
    );
    Ok(())
}
