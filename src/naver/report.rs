use csv::ReaderBuilder;
use rust_decimal::Decimal;
use tracing::debug;

/// Splits tab-delimited report text into rows of raw string fields. Blank
/// lines and undecodable records are skipped; fields are kept verbatim.
pub fn parse_delimited(text: &str) -> Vec<Vec<String>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes())
        .records()
        .filter_map(|r| r.ok())
        .map(|r| r.iter().map(str::to_string).collect())
        .collect()
}

/// A fixed column-index schema for one report type.
pub trait FromColumns: Sized {
    /// Rows shorter than this are dropped.
    const COLUMNS: usize;

    fn from_columns(fields: &[String]) -> Self;
}

/// Maps raw rows into typed records, silently dropping short rows.
/// Returns the records and how many rows were dropped.
pub fn to_records<T: FromColumns>(rows: &[Vec<String>]) -> (Vec<T>, usize) {
    let records: Vec<T> = rows
        .iter()
        .filter(|r| r.len() >= T::COLUMNS)
        .map(|r| T::from_columns(r))
        .collect();
    let dropped = rows.len() - records.len();
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "Dropped short report rows");
    }
    (records, dropped)
}

/// One line of the `AD` stat report.
#[derive(Debug, Clone, PartialEq)]
pub struct AdStatRow {
    pub date: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub adgroup_id: String,
    pub keyword_id: String,
    pub ad_id: String,
    pub business_channel_id: String,
    pub media_code: String,
    pub pc_mobile_type: String,
    pub impressions: u64,
    pub clicks: u64,
    pub cost: Decimal,
    pub sum_ad_rank: Decimal,
    pub view_count: u64,
}

impl FromColumns for AdStatRow {
    const COLUMNS: usize = 14;

    fn from_columns(f: &[String]) -> Self {
        Self {
            date: f[0].clone(),
            customer_id: f[1].clone(),
            campaign_id: f[2].clone(),
            adgroup_id: f[3].clone(),
            keyword_id: f[4].clone(),
            ad_id: f[5].clone(),
            business_channel_id: f[6].clone(),
            media_code: f[7].clone(),
            pc_mobile_type: f[8].clone(),
            impressions: int(&f[9]),
            clicks: int(&f[10]),
            cost: dec(&f[11]),
            sum_ad_rank: dec(&f[12]),
            view_count: int(&f[13]),
        }
    }
}

/// One line of the `AD_CONVERSION` stat report.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionStatRow {
    pub date: String,
    pub customer_id: String,
    pub campaign_id: String,
    pub adgroup_id: String,
    pub keyword_id: String,
    pub ad_id: String,
    pub business_channel_id: String,
    pub media_code: String,
    pub pc_mobile_type: String,
    pub conversion_method: String,
    pub conversion_type: String,
    pub conversion_count: Decimal,
    pub conversion_value: Decimal,
}

impl FromColumns for ConversionStatRow {
    const COLUMNS: usize = 13;

    fn from_columns(f: &[String]) -> Self {
        Self {
            date: f[0].clone(),
            customer_id: f[1].clone(),
            campaign_id: f[2].clone(),
            adgroup_id: f[3].clone(),
            keyword_id: f[4].clone(),
            ad_id: f[5].clone(),
            business_channel_id: f[6].clone(),
            media_code: f[7].clone(),
            pc_mobile_type: f[8].clone(),
            conversion_method: f[9].clone(),
            conversion_type: f[10].clone(),
            conversion_count: dec(&f[11]),
            conversion_value: dec(&f[12]),
        }
    }
}

/// Exact decimal so per-campaign sums do not depend on row order.
fn dec(s: &str) -> Decimal {
    s.trim().parse::<Decimal>().unwrap_or_default()
}

fn int(s: &str) -> u64 {
    let s = s.trim();
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
        .unwrap_or(0)
}
