pub mod aggregate;
pub mod client;
pub mod report;
pub mod report_job;

use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use crate::config::{
    NaverConfig, NAVER_BRAND_CAMPAIGN, NAVER_CONFLICT_KEYS, NAVER_POWERLINK_CAMPAIGN, NAVER_TABLE,
};
use crate::db::{sink, to_records, Store};
use crate::error::Result;
use crate::http::poll::PollPolicy;
use crate::http::ApiClient;
use crate::naver::aggregate::{aggregate, CohortSettings};
use crate::naver::client::NaverClient;
use crate::naver::report::{parse_delimited, to_records as parse_records, AdStatRow, ConversionStatRow};
use crate::naver::report_job::ReportJobClient;
use crate::types::{CampaignDailyRow, ReportType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NaverCampaign {
    ncc_campaign_id: String,
    #[serde(default)]
    campaign_tp: String,
}

/// campaignId → campaignTp for every campaign in the account.
pub async fn fetch_campaign_types<C: ApiClient>(client: &C) -> Result<HashMap<String, String>> {
    let resp = client
        .request(Method::GET, "/ncc/campaigns", None)
        .await?
        .error_for_status()?;
    let campaigns: Vec<NaverCampaign> = serde_json::from_str(&resp.body)?;
    Ok(campaigns
        .into_iter()
        .map(|c| (c.ncc_campaign_id, c.campaign_tp))
        .collect())
}

/// Runs both report jobs for `date` and folds them into cohort rows.
/// Cohorts without activity are omitted.
pub async fn fetch_rows<C: ApiClient>(client: &C, cfg: &NaverConfig, date: NaiveDate) -> Result<Vec<CampaignDailyRow>> {
    let jobs = ReportJobClient::new(client, PollPolicy::new(cfg.poll_max_attempts, cfg.poll_interval));

    let ad_text = jobs.fetch_report(ReportType::Ad, date).await?;
    let ad_lines = parse_delimited(&ad_text);
    let (ad_rows, ad_dropped) = parse_records::<AdStatRow>(&ad_lines);

    let conv_text = jobs.fetch_report(ReportType::AdConversion, date).await?;
    let conv_lines = parse_delimited(&conv_text);
    let (conv_rows, conv_dropped) = parse_records::<ConversionStatRow>(&conv_lines);

    info!(
        date = %date,
        ad_rows = ad_rows.len(),
        ad_dropped,
        conversion_rows = conv_rows.len(),
        conversion_dropped = conv_dropped,
        "Naver reports parsed"
    );

    let campaign_types = fetch_campaign_types(client).await?;
    let cohorts = aggregate(
        &ad_rows,
        &conv_rows,
        &campaign_types,
        CohortSettings { vat_rate: cfg.vat_rate, brand_daily_spend: cfg.brand_daily_spend },
    );
    info!(
        powerlink_campaigns = cohorts.powerlink.campaign_count,
        brand_campaigns = cohorts.brand.campaign_count,
        "Naver cohorts aggregated"
    );

    let day = date.format("%Y-%m-%d").to_string();
    Ok([
        cohorts.powerlink.to_row(&day, NAVER_POWERLINK_CAMPAIGN),
        cohorts.brand.to_row(&day, NAVER_BRAND_CAMPAIGN),
    ]
    .into_iter()
    .flatten()
    .collect())
}

/// Fetches, aggregates and upserts one day of Naver data. Returns rows written.
pub async fn run(cfg: &NaverConfig, store: &dyn Store, date: NaiveDate) -> Result<usize> {
    let mut client = NaverClient::new(cfg)?;
    client.authenticate().await?;
    let rows = fetch_rows(&client, cfg, date).await?;
    let count = rows.len();
    sink::upsert(store, NAVER_TABLE, to_records(&rows)?, NAVER_CONFLICT_KEYS).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::AppError;
    use crate::http::testing::{ok, ScriptedClient};

    fn cfg() -> NaverConfig {
        NaverConfig {
            api_url: "https://naver.test".to_string(),
            api_key: "k".to_string(),
            secret_key: "s".to_string(),
            customer_id: "c".to_string(),
            poll_max_attempts: 5,
            poll_interval: Duration::from_secs(1),
            vat_rate: 1.1,
            brand_daily_spend: 20_000.0,
        }
    }

    fn job(id: i64, tp: &str, status: &str) -> String {
        json!({
            "reportJobId": id,
            "reportTp": tp,
            "statDt": "20240101",
            "status": status,
            "downloadUrl": format!("https://naver.test/report-download?authtoken={id}"),
        })
        .to_string()
    }

    const AD_TSV: &str = "20240101\t1\tP1\tG\tK\tA\tB\tM\tP\t100\t10\t500\t200\t0\n\
                          20240101\t1\tB1\tG\tK\tA\tB\tM\tM\t40\t4\t999\t40\t0\n\
                          20240101\t1\tP1\tshort\n";
    const CONV_TSV: &str = "20240101\t1\tP1\tG\tK\tA\tB\tM\tP\t1\tpurchase\t2\t30000\n\
                            20240101\t1\tX9\tG\tK\tA\tB\tM\tP\t1\tpurchase\t5\t1\n";

    #[tokio::test(start_paused = true)]
    async fn builds_cohort_rows_from_both_reports() {
        let campaigns = json!([
            {"nccCampaignId": "P1", "name": "powerlink", "campaignTp": "WEB_SITE"},
            {"nccCampaignId": "B1", "name": "brand", "campaignTp": "BRAND_SEARCH"},
        ])
        .to_string();
        let client = ScriptedClient::new(vec![
            ok(&job(1, "AD", "REGIST")),
            ok(&job(1, "AD", "RUNNING")),
            ok(&job(1, "AD", "BUILT")),
            ok(AD_TSV),
            ok(&job(2, "AD_CONVERSION", "REGIST")),
            ok(&job(2, "AD_CONVERSION", "BUILT")),
            ok(CONV_TSV),
            ok(&campaigns),
        ]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = fetch_rows(&client, &cfg(), date).await.unwrap();
        assert_eq!(rows.len(), 2);

        let powerlink = rows.iter().find(|r| r.campaign == NAVER_POWERLINK_CAMPAIGN).unwrap();
        assert_eq!(powerlink.date, "2024-01-01");
        assert_eq!(powerlink.impressions, 100);
        assert_eq!(powerlink.spend, 550.0);
        assert_eq!(powerlink.conversion, 2.0);
        assert_eq!(powerlink.conversion_value, 30000.0);
        assert_eq!(powerlink.avg_rank, Some(2.0));

        let brand = rows.iter().find(|r| r.campaign == NAVER_BRAND_CAMPAIGN).unwrap();
        assert_eq!(brand.spend, 20_000.0);
        assert_eq!(brand.clicks, 4);
        assert_eq!(client.paths().last().unwrap(), "/ncc/campaigns");
    }

    #[tokio::test(start_paused = true)]
    async fn day_without_conversions_still_yields_rows() {
        let client = ScriptedClient::new(vec![
            ok(&job(1, "AD", "REGIST")),
            ok(&job(1, "AD", "BUILT")),
            ok(AD_TSV),
            ok(&job(2, "AD_CONVERSION", "REGIST")),
            ok(&json!({"reportJobId": 2, "reportTp": "AD_CONVERSION", "status": "NONE"}).to_string()),
            ok(r#"[{"nccCampaignId":"P1","campaignTp":"WEB_SITE"}]"#),
        ]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = fetch_rows(&client, &cfg(), date).await.unwrap();

        let powerlink = rows.iter().find(|r| r.campaign == NAVER_POWERLINK_CAMPAIGN).unwrap();
        assert_eq!(powerlink.impressions, 140);
        assert_eq!(powerlink.conversion, 0.0);
        assert_eq!(powerlink.cpa, 0.0);

        let brand = rows.iter().find(|r| r.campaign == NAVER_BRAND_CAMPAIGN).unwrap();
        assert_eq!(brand.spend, 20_000.0);
        assert_eq!(brand.impressions, 0);
        assert_eq!(client.request_count(), 6);
        assert_eq!(client.paths().last().unwrap(), "/ncc/campaigns");
    }

    #[tokio::test(start_paused = true)]
    async fn report_failure_aborts_the_platform() {
        let client = ScriptedClient::new(vec![ok(&job(1, "AD", "REGIST")), ok(&job(1, "AD", "FAILED"))]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = fetch_rows(&client, &cfg(), date).await.unwrap_err();
        assert!(matches!(err, AppError::ReportFailed { .. }));
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn campaign_types_lookup() {
        let client = ScriptedClient::new(vec![ok(
            r#"[{"nccCampaignId":"cmp-a","campaignTp":"WEB_SITE"},{"nccCampaignId":"cmp-b"}]"#,
        )]);
        let types = fetch_campaign_types(&client).await.unwrap();
        assert_eq!(types["cmp-a"], "WEB_SITE");
        assert_eq!(types["cmp-b"], "");
    }
}
