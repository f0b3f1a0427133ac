use std::future::Future;
use std::time::Instant;

use chrono::NaiveDate;
use clap::ValueEnum;
use tracing::{error, info};

use crate::config::Config;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::types::Platform;
use crate::{google, meta, naver};

/// Positional selector on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Target {
    Meta,
    Naver,
    Google,
    #[default]
    All,
}

impl Target {
    pub fn platforms(self) -> Vec<Platform> {
        match self {
            Target::Meta => vec![Platform::Meta],
            Target::Naver => vec![Platform::Naver],
            Target::Google => vec![Platform::Google],
            Target::All => Platform::ALL.to_vec(),
        }
    }
}

#[derive(Debug)]
pub struct PlatformOutcome {
    pub platform: Platform,
    /// Rows written on success.
    pub result: Result<usize>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<PlatformOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// The process exits non-zero only in this case.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded() == 0
    }
}

/// Runs each platform in order. A failure is logged and recorded; the
/// remaining platforms still run.
pub async fn run_platforms<F, Fut>(platforms: &[Platform], mut run_one: F) -> RunSummary
where
    F: FnMut(Platform) -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    let mut summary = RunSummary::default();
    for &platform in platforms {
        let started = Instant::now();
        info!(%platform, "Platform sync started");
        let result = run_one(platform).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(rows) => info!(%platform, rows, elapsed_ms, "Platform sync finished"),
            Err(e) => error!(%platform, elapsed_ms, "Platform sync failed: {e}"),
        }
        summary.outcomes.push(PlatformOutcome { platform, result });
    }
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "Run complete"
    );
    summary
}

/// Fetches and stores one platform's data for `date`.
pub async fn sync_platform(cfg: &Config, store: &dyn Store, platform: Platform, date: NaiveDate) -> Result<usize> {
    let missing = || AppError::Config(format!("no configuration for {platform}"));
    match platform {
        Platform::Meta => meta::run(cfg.meta.as_ref().ok_or_else(missing)?, store, date).await,
        Platform::Naver => naver::run(cfg.naver.as_ref().ok_or_else(missing)?, store, date).await,
        Platform::Google => google::run(cfg.google.as_ref().ok_or_else(missing)?, store, date).await,
    }
}

pub async fn run(cfg: &Config, store: &dyn Store, platforms: &[Platform], date: NaiveDate) -> RunSummary {
    info!(date = %date, platforms = ?platforms, "Syncing daily ad metrics");
    run_platforms(platforms, |platform| sync_platform(cfg, store, platform, date)).await
}
