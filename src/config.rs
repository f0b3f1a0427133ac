use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::types::Platform;

pub const NAVER_API_URL: &str = "https://api.searchad.naver.com";
pub const META_API_URL: &str = "https://graph.facebook.com";
pub const GOOGLE_ADS_API_URL: &str = "https://googleads.googleapis.com";
pub const GOOGLE_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Destination tables and their natural keys.
pub const NAVER_TABLE: &str = "naver_ads_daily";
pub const NAVER_CONFLICT_KEYS: &[&str] = &["date", "campaign"];
pub const GOOGLE_TABLE: &str = "google_ads_daily";
pub const GOOGLE_CONFLICT_KEYS: &[&str] = &["date", "campaign"];
pub const META_TABLE: &str = "meta_adset_daily";
pub const META_CONFLICT_KEYS: &[&str] = &["date_start", "adset_id"];

/// Campaign names written for the two Naver cohorts.
pub const NAVER_POWERLINK_CAMPAIGN: &str = "naver_powerlink";
pub const NAVER_BRAND_CAMPAIGN: &str = "naver_brand";

/// Naver `campaignTp` routed to the brand cohort.
pub const NAVER_BRAND_CAMPAIGN_TYPE: &str = "BRAND_SEARCH";

/// Graph API error codes that signal throttling or a transient backend fault.
pub const META_RETRYABLE_CODES: &[i64] = &[1, 2, 4, 17, 32, 341, 613, 80000, 80003, 80004];

/// Google Ads error codes (HTTP-style, carried in `error.code`) worth retrying.
pub const GOOGLE_RETRYABLE_CODES: &[i64] = &[429, 500, 503];

/// Fixed wait after a request that produced no response at all.
pub const NETWORK_RETRY_DELAY_SECS: u64 = 5;

/// Per-request HTTP timeout for every vendor client.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

/// Graph API page size for insights.
pub const META_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Explicit report date (TARGET_DATE). Falls back to yesterday in `report_offset`.
    pub target_date: Option<NaiveDate>,
    /// Timezone the vendors bucket daily stats in (REPORT_UTC_OFFSET_HOURS).
    pub report_offset: FixedOffset,
    pub naver: Option<NaverConfig>,
    pub meta: Option<MetaConfig>,
    pub google: Option<GoogleConfig>,
}

#[derive(Debug, Clone)]
pub struct NaverConfig {
    pub api_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub customer_id: String,
    pub poll_max_attempts: u32,
    pub poll_interval: Duration,
    /// Multiplier applied to powerlink cost (NAVER_VAT_RATE).
    pub vat_rate: f64,
    /// Spend booked for the brand cohort per day (NAVER_BRAND_DAILY_SPEND).
    pub brand_daily_spend: f64,
}

#[derive(Debug, Clone)]
pub struct MetaConfig {
    pub api_url: String,
    pub api_version: String,
    pub access_token: String,
    /// Ad account id without the `act_` prefix.
    pub ad_account_id: String,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_url: String,
    pub api_version: String,
    pub token_url: String,
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Customer id with dashes removed.
    pub customer_id: String,
    pub login_customer_id: Option<String>,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Platform sections are `None` when
    /// their credentials are entirely absent; partial credentials are an error.
    pub fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target_date = match get("TARGET_DATE") {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                AppError::Config(format!("TARGET_DATE must be YYYY-MM-DD, got {raw:?}"))
            })?),
            None => None,
        };

        let offset_hours = parse_or(get("REPORT_UTC_OFFSET_HOURS"), "REPORT_UTC_OFFSET_HOURS", 9i32)?;
        let report_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| AppError::Config("REPORT_UTC_OFFSET_HOURS out of range".to_string()))?;

        let naver = match credentials(&get, Platform::Naver.required_vars())? {
            Some(creds) => {
                let [api_key, secret_key, customer_id] = into_array(creds);
                Some(NaverConfig {
                    api_url: get("NAVER_API_URL").unwrap_or_else(|| NAVER_API_URL.to_string()),
                    api_key,
                    secret_key,
                    customer_id,
                    poll_max_attempts: parse_or(get("NAVER_POLL_MAX_ATTEMPTS"), "NAVER_POLL_MAX_ATTEMPTS", 30)?,
                    poll_interval: Duration::from_secs(parse_or(
                        get("NAVER_POLL_INTERVAL_SECS"),
                        "NAVER_POLL_INTERVAL_SECS",
                        10,
                    )?),
                    vat_rate: parse_or(get("NAVER_VAT_RATE"), "NAVER_VAT_RATE", 1.1)?,
                    brand_daily_spend: parse_or(get("NAVER_BRAND_DAILY_SPEND"), "NAVER_BRAND_DAILY_SPEND", 0.0)?,
                })
            }
            None => None,
        };

        let meta = match credentials(&get, Platform::Meta.required_vars())? {
            Some(creds) => {
                let [access_token, account] = into_array(creds);
                Some(MetaConfig {
                    api_url: get("META_API_URL").unwrap_or_else(|| META_API_URL.to_string()),
                    api_version: get("META_API_VERSION").unwrap_or_else(|| "v19.0".to_string()),
                    access_token,
                    ad_account_id: account.trim_start_matches("act_").to_string(),
                    max_attempts: parse_or(get("META_MAX_ATTEMPTS"), "META_MAX_ATTEMPTS", 5)?,
                    retry_base_delay: Duration::from_secs(parse_or(
                        get("META_RETRY_BASE_SECS"),
                        "META_RETRY_BASE_SECS",
                        2,
                    )?),
                })
            }
            None => None,
        };

        let google = match credentials(&get, Platform::Google.required_vars())? {
            Some(creds) => {
                let [developer_token, client_id, client_secret, refresh_token, customer_id] =
                    into_array(creds);
                Some(GoogleConfig {
                    api_url: get("GOOGLE_ADS_API_URL").unwrap_or_else(|| GOOGLE_ADS_API_URL.to_string()),
                    api_version: get("GOOGLE_ADS_API_VERSION").unwrap_or_else(|| "v17".to_string()),
                    token_url: get("GOOGLE_OAUTH_TOKEN_URL")
                        .unwrap_or_else(|| GOOGLE_OAUTH_TOKEN_URL.to_string()),
                    developer_token,
                    client_id,
                    client_secret,
                    refresh_token,
                    customer_id: customer_id.replace('-', ""),
                    login_customer_id: get("GOOGLE_ADS_LOGIN_CUSTOMER_ID").map(|v| v.replace('-', "")),
                    max_attempts: parse_or(get("GOOGLE_ADS_MAX_ATTEMPTS"), "GOOGLE_ADS_MAX_ATTEMPTS", 3)?,
                    retry_base_delay: Duration::from_secs(parse_or(
                        get("GOOGLE_ADS_RETRY_BASE_SECS"),
                        "GOOGLE_ADS_RETRY_BASE_SECS",
                        2,
                    )?),
                })
            }
            None => None,
        };

        Ok(Self {
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: get("DB_PATH").unwrap_or_else(|| "adpull.db".to_string()),
            target_date,
            report_offset,
            naver,
            meta,
            google,
        })
    }

    /// Fails before any I/O when a selected platform has no credentials.
    pub fn require(&self, platform: Platform) -> Result<()> {
        let present = match platform {
            Platform::Naver => self.naver.is_some(),
            Platform::Meta => self.meta.is_some(),
            Platform::Google => self.google.is_some(),
        };
        if present {
            Ok(())
        } else {
            Err(AppError::Config(format!(
                "missing credentials for {platform}: set {}",
                platform.required_vars().join(", ")
            )))
        }
    }

    /// The day to fetch: TARGET_DATE, else yesterday in the report timezone.
    pub fn report_date(&self, now: DateTime<Utc>) -> NaiveDate {
        if let Some(date) = self.target_date {
            return date;
        }
        let today = now.with_timezone(&self.report_offset).date_naive();
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    }
}

/// Returns the values of `keys` when all are set, `None` when none are set.
fn credentials<G>(get: &G, keys: &[&str]) -> Result<Option<Vec<String>>>
where
    G: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = keys.iter().map(|k| get(*k)).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    let missing: Vec<&str> = keys
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Config(format!("missing required variable(s): {}", missing.join(", "))));
    }
    Ok(Some(values.into_iter().flatten().collect()))
}

fn into_array<const N: usize>(values: Vec<String>) -> [String; N] {
    let mut iter = values.into_iter();
    std::array::from_fn(|_| iter.next().unwrap_or_default())
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {v:?}"))),
        None => Ok(default),
    }
}
