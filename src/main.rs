use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use sp500_news_reaction::models::Config;
use sp500_news_reaction::pipeline;

/// SP500 news reaction data pipeline
#[derive(Parser, Debug)]
#[command(name = "sp500-news-reaction")]
#[command(version, about = "Stage market and macro data, cut tick windows around news events, export the analysis dataset")]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all three steps in order (default)
    Run,
    /// Step 1: load raw files, fetch FRED and Yahoo data, derive regimes and the daily summary
    Load,
    /// Step 2: write tick windows around every news event
    ExtractWindows,
    /// Step 3: join the event delta tables into the final dataset
    Export,
    /// Print the resolved configuration
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pipeline::init_logging();

    let config = match Config::from_env() {
        Ok(config) => config.with_database_path(cli.database.as_deref()),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration Error: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command.unwrap_or(Command::Run) {
        Command::Run => pipeline::run_all(&config).await,
        Command::Load => pipeline::load_and_prepare(&config).await,
        Command::ExtractWindows => pipeline::extract_tick_windows(&config).await.map(|report| {
            info!(
                "🪟 {} window files for {} events ({} empty windows skipped)",
                report.files_written.len(),
                report.events_processed,
                report.empty_windows
            );
        }),
        Command::Export => pipeline::export_analysis_dataset(&config).await.map(|_| ()),
        Command::Paths => {
            print_paths(&config);
            Ok(())
        }
    };

    if let Err(e) = outcome {
        error!("Pipeline failed: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn print_paths(config: &Config) {
    println!("📁 Project root:      {}", config.project_root.display());
    println!("💾 Database:          {}", config.database_path.display());
    println!("📥 Raw data:          {}", config.raw_data_dir.display());
    println!("🪟 Tick windows:      {}", config.tick_window_dir.display());
    println!("📤 Final dataset:     {}", config.final_dataset_path.display());
    println!("📰 Events table:      {}", config.news_events_table);
    println!("📅 Observation start: {}", config.observation_start);
    println!(
        "🔑 FRED_API_KEY:      {}",
        if config.fred_api_key.is_some() { "set" } else { "missing" }
    );
}
