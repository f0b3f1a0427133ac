pub mod client;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::info;

use crate::config::{GoogleConfig, GOOGLE_CONFLICT_KEYS, GOOGLE_RETRYABLE_CODES, GOOGLE_TABLE};
use crate::db::{sink, to_records, Store};
use crate::error::Result;
use crate::google::client::GoogleClient;
use crate::http::retry::{with_retry, RetryPolicy};
use crate::http::ApiClient;
use crate::metrics::Counts;
use crate::types::CampaignDailyRow;

#[derive(Debug, Default, Deserialize)]
struct StreamBatch {
    #[serde(default)]
    results: Vec<StreamRow>,
}

#[derive(Debug, Deserialize)]
struct StreamRow {
    campaign: CampaignRef,
    #[serde(default)]
    metrics: StreamMetrics,
}

#[derive(Debug, Deserialize)]
struct CampaignRef {
    #[serde(default)]
    name: String,
}

/// int64 fields come back as JSON strings, doubles as numbers.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StreamMetrics {
    #[serde(deserialize_with = "lenient_f64")]
    cost_micros: f64,
    #[serde(deserialize_with = "lenient_f64")]
    impressions: f64,
    #[serde(deserialize_with = "lenient_f64")]
    clicks: f64,
    #[serde(deserialize_with = "lenient_f64")]
    conversions: f64,
    #[serde(deserialize_with = "lenient_f64")]
    conversions_value: f64,
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .filter(|n| n.is_finite())
        .unwrap_or(0.0))
}

pub fn campaign_query(date: NaiveDate) -> String {
    format!(
        "SELECT campaign.name, segments.date, metrics.cost_micros, metrics.impressions, \
         metrics.clicks, metrics.conversions, metrics.conversions_value \
         FROM campaign WHERE segments.date = '{}'",
        date.format("%Y-%m-%d")
    )
}

/// Flattens a searchStream response (array of batches, or a single batch)
/// into per-campaign counts. Rows sharing a campaign name are summed.
pub fn campaign_counts(response: Value) -> Result<BTreeMap<String, Counts>> {
    let batches = match response {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut totals: BTreeMap<String, Counts> = BTreeMap::new();
    for batch in batches {
        let batch: StreamBatch = serde_json::from_value(batch)?;
        for row in batch.results {
            if row.campaign.name.is_empty() {
                continue;
            }
            let m = row.metrics;
            let c = totals.entry(row.campaign.name).or_default();
            c.spend += m.cost_micros / 1_000_000.0;
            c.impressions += m.impressions.max(0.0) as u64;
            c.clicks += m.clicks.max(0.0) as u64;
            c.conversions += m.conversions;
            c.conversion_value += m.conversions_value;
        }
    }
    Ok(totals)
}

pub async fn fetch_rows<C: ApiClient>(client: &C, cfg: &GoogleConfig, date: NaiveDate) -> Result<Vec<CampaignDailyRow>> {
    let policy = RetryPolicy::new(cfg.max_attempts, cfg.retry_base_delay, GOOGLE_RETRYABLE_CODES);
    let path = format!("/customers/{}/googleAds:searchStream", cfg.customer_id);
    let body = json!({ "query": campaign_query(date) });

    let response = with_retry(&policy, "google searchStream", || {
        client.request(Method::POST, &path, Some(&body))
    })
    .await?;

    let totals = campaign_counts(response)?;
    let day = date.format("%Y-%m-%d").to_string();
    let rows: Vec<CampaignDailyRow> = totals
        .iter()
        .filter(|(_, c)| c.has_activity())
        .map(|(name, c)| CampaignDailyRow::from_counts(&day, name, c, None))
        .collect();
    info!(date = %date, campaigns = totals.len(), rows = rows.len(), "Google rows built");
    Ok(rows)
}

pub async fn run(cfg: &GoogleConfig, store: &dyn Store, date: NaiveDate) -> Result<usize> {
    let mut client = GoogleClient::new(cfg)?;
    client.authenticate().await?;
    let rows = fetch_rows(&client, cfg, date).await?;
    let count = rows.len();
    sink::upsert(store, GOOGLE_TABLE, to_records(&rows)?, GOOGLE_CONFLICT_KEYS).await?;
    Ok(count)
}
