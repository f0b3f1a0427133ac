use serde::{Deserialize, Serialize};

use crate::metrics::{round2, Counts, RatioMetrics};

// ---------------------------------------------------------------------------
// Platforms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Meta,
    Naver,
    Google,
}

impl Platform {
    /// Run order of the integration entry point.
    pub const ALL: [Platform; 3] = [Platform::Meta, Platform::Naver, Platform::Google];

    pub fn required_vars(self) -> &'static [&'static str] {
        match self {
            Platform::Meta => &["META_ACCESS_TOKEN", "META_AD_ACCOUNT_ID"],
            Platform::Naver => &["NAVER_API_KEY", "NAVER_SECRET_KEY", "NAVER_CUSTOMER_ID"],
            Platform::Google => &[
                "GOOGLE_ADS_DEVELOPER_TOKEN",
                "GOOGLE_ADS_CLIENT_ID",
                "GOOGLE_ADS_CLIENT_SECRET",
                "GOOGLE_ADS_REFRESH_TOKEN",
                "GOOGLE_ADS_CUSTOMER_ID",
            ],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::Meta => "meta",
            Platform::Naver => "naver",
            Platform::Google => "google",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Naver report jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "AD")]
    Ad,
    #[serde(rename = "AD_CONVERSION")]
    AdConversion,
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportType::Ad => write!(f, "AD"),
            ReportType::AdConversion => write!(f, "AD_CONVERSION"),
        }
    }
}

/// Coarse lifecycle of a report job, derived from the vendor status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Complete,
    /// Finished with nothing to report for the day; there is no file.
    NoData,
    Failed,
}

/// A stat-report job as returned by `/stat-reports`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    #[serde(rename = "reportJobId")]
    pub id: i64,
    #[serde(rename = "reportTp")]
    pub report_type: ReportType,
    pub status: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ReportJob {
    pub fn state(&self) -> JobState {
        match self.status.as_str() {
            "BUILT" | "DONE" => JobState::Complete,
            "NONE" => JobState::NoData,
            "FAILED" | "ERROR" | "AGGREGATING_FAILED" => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Output rows
// ---------------------------------------------------------------------------

/// One (date, campaign) row for the Naver and Google tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDailyRow {
    pub date: String,
    pub campaign: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversion: f64,
    pub conversion_value: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cvr: f64,
    pub cpm: f64,
    pub cpa: f64,
    pub aov: f64,
    pub roas: f64,
    /// Naver only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_rank: Option<f64>,
}

impl CampaignDailyRow {
    pub fn from_counts(date: &str, campaign: &str, counts: &Counts, avg_rank: Option<f64>) -> Self {
        let m = RatioMetrics::from_counts(counts);
        Self {
            date: date.to_string(),
            campaign: campaign.to_string(),
            spend: round2(counts.spend),
            impressions: counts.impressions,
            clicks: counts.clicks,
            conversion: counts.conversions,
            conversion_value: counts.conversion_value,
            ctr: m.ctr,
            cpc: m.cpc,
            cvr: m.cvr,
            cpm: m.cpm,
            cpa: m.cpa,
            aov: m.aov,
            roas: m.roas,
            avg_rank,
        }
    }
}

/// One (date_start, adset_id) row for the Meta table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaAdsetRow {
    pub date_start: String,
    pub adset_id: String,
    pub adset_name: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub purchases: f64,
    pub purchase_value: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cvr: f64,
    pub cpm: f64,
    pub cpa: f64,
    pub aov: f64,
    pub roas: f64,
}
