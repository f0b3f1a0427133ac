mod config;
mod db;
mod error;
mod google;
mod http;
mod meta;
mod metrics;
mod naver;
mod runner;
mod types;

use chrono::Utc;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::writer::SqliteStore;
use crate::error::Result;
use crate::runner::{RunSummary, Target};

/// Pulls yesterday's ad metrics from Meta, Naver and Google Ads into SQLite.
#[derive(Debug, Parser)]
#[command(name = "adpull", version)]
struct Cli {
    /// Platform to sync.
    #[arg(value_enum, default_value_t = Target::All)]
    target: Target,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    match run(cfg, cli.target).await {
        Ok(summary) if summary.all_failed() => {
            error!("Every selected platform failed");
            std::process::exit(1);
        }
        Ok(_) => {}
        Err(e) => {
            error!("Fatal error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cfg: Config, target: Target) -> Result<RunSummary> {
    let platforms = target.platforms();
    for &platform in &platforms {
        cfg.require(platform)?;
    }
    let date = cfg.report_date(Utc::now());

    let store = SqliteStore::open(&cfg.db_path).await?;
    Ok(runner::run(&cfg, &store, &platforms, date).await)
}
