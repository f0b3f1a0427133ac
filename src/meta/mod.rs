pub mod client;

use std::collections::HashSet;

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::{MetaConfig, META_CONFLICT_KEYS, META_PAGE_LIMIT, META_RETRYABLE_CODES, META_TABLE};
use crate::db::{sink, to_records, Store};
use crate::error::{AppError, Result};
use crate::http::retry::{with_retry, RetryPolicy};
use crate::http::ApiClient;
use crate::meta::client::{graph_base_url, MetaClient};
use crate::metrics::{round2, Counts, RatioMetrics};
use crate::types::MetaAdsetRow;

const INSIGHT_FIELDS: &str = "date_start,date_stop,campaign_id,campaign_name,adset_id,adset_name,\
                              spend,impressions,clicks,actions,action_values";

const PURCHASE_ACTION: &str = "purchase";

/// First insights page URL for one day at adset level.
pub fn insights_url(cfg: &MetaConfig, date: NaiveDate) -> Result<String> {
    let day = date.format("%Y-%m-%d").to_string();
    let base = format!("{}/act_{}/insights", graph_base_url(cfg), cfg.ad_account_id);
    let mut url = reqwest::Url::parse(&base)
        .map_err(|e| AppError::Config(format!("invalid Meta URL {base:?}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("level", "adset")
        .append_pair("time_increment", "1")
        .append_pair("time_range", &json!({ "since": day, "until": day }).to_string())
        .append_pair("fields", INSIGHT_FIELDS)
        .append_pair("limit", &META_PAGE_LIMIT.to_string());
    Ok(url.to_string())
}

/// Follows `paging.next` until exhausted or it points at a page already
/// fetched; every page goes through the retry wrapper.
pub async fn fetch_insights<C: ApiClient>(client: &C, policy: &RetryPolicy, first_url: String) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(first_url);

    while let Some(url) = next.take() {
        let page = with_retry(policy, "meta insights", || client.request(Method::GET, &url, None)).await?;
        if let Some(data) = page.get("data").and_then(Value::as_array) {
            items.extend(data.iter().cloned());
        }
        seen.insert(url);
        next = page
            .get("paging")
            .and_then(|p| p.get("next"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(repeat) = next.as_ref().filter(|u| seen.contains(*u)) {
            warn!(url = %repeat, "Meta paging cursor repeated, stopping");
            next = None;
        }
    }
    let pages = seen.len();

    info!(pages, items = items.len(), "Meta insights fetched");
    Ok(items)
}

/// Raw counts of one insights item. Missing or malformed numbers read as zero.
pub fn adset_counts(item: &Value) -> Counts {
    Counts {
        spend: number(item.get("spend")),
        impressions: number(item.get("impressions")).max(0.0) as u64,
        clicks: number(item.get("clicks")).max(0.0) as u64,
        conversions: action_value(item.get("actions"), PURCHASE_ACTION),
        conversion_value: action_value(item.get("action_values"), PURCHASE_ACTION),
    }
}

/// Maps one insights item to a row; `None` for items without an adset id or
/// without any activity.
pub fn to_adset_row(item: &Value) -> Option<MetaAdsetRow> {
    let text = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    let adset_id = text("adset_id");
    let counts = adset_counts(item);
    if adset_id.is_empty() || !counts.has_activity() {
        return None;
    }
    let m = RatioMetrics::from_counts(&counts);

    Some(MetaAdsetRow {
        date_start: text("date_start"),
        adset_id,
        adset_name: text("adset_name"),
        campaign_id: text("campaign_id"),
        campaign_name: text("campaign_name"),
        spend: round2(counts.spend),
        impressions: counts.impressions,
        clicks: counts.clicks,
        purchases: counts.conversions,
        purchase_value: counts.conversion_value,
        ctr: m.ctr,
        cpc: m.cpc,
        cvr: m.cvr,
        cpm: m.cpm,
        cpa: m.cpa,
        aov: m.aov,
        roas: m.roas,
    })
}

/// Sum of `value` over entries of an `actions`-style array with the given type.
fn action_value(actions: Option<&Value>, action_type: &str) -> f64 {
    actions
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter(|a| a.get("action_type").and_then(Value::as_str) == Some(action_type))
                .map(|a| number(a.get("value")))
                .sum()
        })
        .unwrap_or(0.0)
}

/// Graph API numbers arrive as strings; accept either.
fn number(v: Option<&Value>) -> f64 {
    v.and_then(|x| x.as_f64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
        .filter(|n: &f64| n.is_finite())
        .unwrap_or(0.0)
}

pub async fn fetch_rows<C: ApiClient>(client: &C, cfg: &MetaConfig, date: NaiveDate) -> Result<Vec<MetaAdsetRow>> {
    let policy = RetryPolicy::new(cfg.max_attempts, cfg.retry_base_delay, META_RETRYABLE_CODES);
    let items = fetch_insights(client, &policy, insights_url(cfg, date)?).await?;
    let rows: Vec<MetaAdsetRow> = items.iter().filter_map(to_adset_row).collect();
    info!(date = %date, rows = rows.len(), skipped = items.len() - rows.len(), "Meta rows built");
    Ok(rows)
}

pub async fn run(cfg: &MetaConfig, store: &dyn Store, date: NaiveDate) -> Result<usize> {
    let mut client = MetaClient::new(cfg)?;
    client.authenticate().await?;
    let rows = fetch_rows(&client, cfg, date).await?;
    let count = rows.len();
    sink::upsert(store, META_TABLE, to_records(&rows)?, META_CONFLICT_KEYS).await?;
    Ok(count)
}
