//! Derived ratio metrics. Every division is guarded: a zero (or negative)
//! denominator yields 0 rather than NaN or infinity.

/// Raw additive counts a set of ratio metrics is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Counts {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: f64,
    pub conversion_value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatioMetrics {
    pub ctr: f64,
    pub cpc: f64,
    pub cvr: f64,
    pub cpm: f64,
    pub cpa: f64,
    pub aov: f64,
    pub roas: f64,
}

impl RatioMetrics {
    pub fn from_counts(c: &Counts) -> Self {
        Self {
            ctr: ctr(c.clicks, c.impressions),
            cpc: cpc(c.spend, c.clicks),
            cvr: cvr(c.conversions, c.clicks),
            cpm: cpm(c.spend, c.impressions),
            cpa: cpa(c.spend, c.conversions),
            aov: aov(c.conversion_value, c.conversions),
            roas: roas(c.conversion_value, c.spend),
        }
    }
}

impl Counts {
    /// True when the row carries any activity worth writing.
    pub fn has_activity(&self) -> bool {
        self.spend > 0.0 || self.impressions > 0 || self.clicks > 0
    }
}

pub fn ctr(clicks: u64, impressions: u64) -> f64 {
    round4(safe_div(clicks as f64, impressions as f64))
}

pub fn cpc(spend: f64, clicks: u64) -> f64 {
    round2(safe_div(spend, clicks as f64))
}

pub fn cvr(conversions: f64, clicks: u64) -> f64 {
    round4(safe_div(conversions, clicks as f64))
}

pub fn cpm(spend: f64, impressions: u64) -> f64 {
    round2(safe_div(spend, impressions as f64) * 1000.0)
}

pub fn cpa(spend: f64, conversions: f64) -> f64 {
    round2(safe_div(spend, conversions))
}

pub fn aov(conversion_value: f64, conversions: f64) -> f64 {
    round2(safe_div(conversion_value, conversions))
}

pub fn roas(conversion_value: f64, spend: f64) -> f64 {
    round4(safe_div(conversion_value, spend))
}

pub fn average_rank(sum_ad_rank: f64, impressions: u64) -> f64 {
    round2(safe_div(sum_ad_rank, impressions as f64))
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && numerator.is_finite() {
        numerator / denominator
    } else {
        0.0
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
