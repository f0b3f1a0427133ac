use std::collections::{BTreeMap, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::NAVER_BRAND_CAMPAIGN_TYPE;
use crate::metrics::{self, Counts};
use crate::naver::report::{AdStatRow, ConversionStatRow};
use crate::types::CampaignDailyRow;

/// Per-campaign totals after both report passes. Sums are exact decimals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignAggregate {
    pub impressions: u64,
    pub clicks: u64,
    pub cost: Decimal,
    pub sum_ad_rank: Decimal,
    pub conversions: Decimal,
    pub conversion_value: Decimal,
}

/// Campaign id → totals, ordered by id.
pub type CampaignGroups = BTreeMap<String, CampaignAggregate>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortTotals {
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: Decimal,
    pub conversion_value: Decimal,
    pub sum_ad_rank: Decimal,
    pub campaign_count: usize,
}

/// The two reporting buckets: powerlink (everything not brand search) and brand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cohorts {
    pub powerlink: CohortTotals,
    pub brand: CohortTotals,
}

#[derive(Debug, Clone, Copy)]
pub struct CohortSettings {
    /// Multiplier on powerlink cost.
    pub vat_rate: f64,
    /// Brand spend is this fixed amount, not derived from cost.
    pub brand_daily_spend: f64,
}

/// Sums ad rows per campaign.
pub fn group_by_campaign(rows: &[AdStatRow]) -> CampaignGroups {
    let mut groups = CampaignGroups::new();
    for row in rows {
        let g = groups.entry(row.campaign_id.clone()).or_default();
        g.impressions += row.impressions;
        g.clicks += row.clicks;
        g.cost += row.cost;
        g.sum_ad_rank += row.sum_ad_rank;
    }
    groups
}

/// Sums conversion rows per campaign, then overwrites the conversion fields of
/// matching groups. Campaigns with no ad rows are discarded.
pub fn merge_conversions(groups: &mut CampaignGroups, rows: &[ConversionStatRow]) {
    let mut conversions: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
    for row in rows {
        let c = conversions.entry(row.campaign_id.as_str()).or_default();
        c.0 += row.conversion_count;
        c.1 += row.conversion_value;
    }
    for (campaign_id, (count, value)) in conversions {
        if let Some(g) = groups.get_mut(campaign_id) {
            g.conversions = count;
            g.conversion_value = value;
        }
    }
}

/// Routes each campaign into a cohort by its `campaignTp`; unknown campaigns
/// land in powerlink. Brand spend is the daily baseline whether or not any
/// brand campaign appeared in the report.
pub fn route_cohorts(
    groups: &CampaignGroups,
    campaign_types: &HashMap<String, String>,
    settings: CohortSettings,
) -> Cohorts {
    let mut cohorts = Cohorts::default();
    let mut powerlink_cost = Decimal::ZERO;

    for (campaign_id, g) in groups {
        let is_brand = campaign_types
            .get(campaign_id)
            .is_some_and(|tp| tp == NAVER_BRAND_CAMPAIGN_TYPE);
        let bucket = if is_brand { &mut cohorts.brand } else { &mut cohorts.powerlink };
        bucket.impressions += g.impressions;
        bucket.clicks += g.clicks;
        bucket.conversions += g.conversions;
        bucket.conversion_value += g.conversion_value;
        bucket.sum_ad_rank += g.sum_ad_rank;
        bucket.campaign_count += 1;
        if !is_brand {
            powerlink_cost += g.cost;
        }
    }

    cohorts.powerlink.spend = to_f64(powerlink_cost) * settings.vat_rate;
    cohorts.brand.spend = settings.brand_daily_spend;
    cohorts
}

pub fn aggregate(
    ad_rows: &[AdStatRow],
    conversion_rows: &[ConversionStatRow],
    campaign_types: &HashMap<String, String>,
    settings: CohortSettings,
) -> Cohorts {
    let mut groups = group_by_campaign(ad_rows);
    merge_conversions(&mut groups, conversion_rows);
    route_cohorts(&groups, campaign_types, settings)
}

impl CohortTotals {
    pub fn counts(&self) -> Counts {
        Counts {
            spend: self.spend,
            impressions: self.impressions,
            clicks: self.clicks,
            conversions: to_f64(self.conversions),
            conversion_value: to_f64(self.conversion_value),
        }
    }

    /// `None` when the cohort had no spend, impressions or clicks.
    pub fn to_row(&self, date: &str, campaign: &str) -> Option<CampaignDailyRow> {
        let counts = self.counts();
        if !counts.has_activity() {
            return None;
        }
        let avg_rank = metrics::average_rank(to_f64(self.sum_ad_rank), self.impressions);
        Some(CampaignDailyRow::from_counts(date, campaign, &counts, Some(avg_rank)))
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: CohortSettings = CohortSettings { vat_rate: 1.1, brand_daily_spend: 30_000.0 };

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ad(campaign: &str, impressions: u64, clicks: u64, cost: &str) -> AdStatRow {
        AdStatRow {
            date: "20240101".to_string(),
            customer_id: "111".to_string(),
            campaign_id: campaign.to_string(),
            adgroup_id: String::new(),
            keyword_id: String::new(),
            ad_id: String::new(),
            business_channel_id: String::new(),
            media_code: String::new(),
            pc_mobile_type: "P".to_string(),
            impressions,
            clicks,
            cost: d(cost),
            sum_ad_rank: Decimal::from(impressions * 2),
            view_count: 0,
        }
    }

    fn conv(campaign: &str, count: &str, value: &str) -> ConversionStatRow {
        ConversionStatRow {
            date: "20240101".to_string(),
            customer_id: "111".to_string(),
            campaign_id: campaign.to_string(),
            adgroup_id: String::new(),
            keyword_id: String::new(),
            ad_id: String::new(),
            business_channel_id: String::new(),
            media_code: String::new(),
            pc_mobile_type: "P".to_string(),
            conversion_method: "1".to_string(),
            conversion_type: "purchase".to_string(),
            conversion_count: d(count),
            conversion_value: d(value),
        }
    }

    #[test]
    fn single_campaign_scenario() {
        let settings = CohortSettings { vat_rate: 1.1, brand_daily_spend: 0.0 };
        let cohorts = aggregate(&[ad("C1", 100, 10, "500")], &[], &HashMap::new(), settings);
        let p = &cohorts.powerlink;
        assert_eq!(p.impressions, 100);
        assert_eq!(p.clicks, 10);
        assert!((p.spend - 550.0).abs() < 1e-9);
        assert_eq!(cohorts.brand, CohortTotals::default());

        let row = p.to_row("2024-01-01", "naver_powerlink").unwrap();
        assert_eq!(row.spend, 550.0);
        assert_eq!(row.ctr, 0.1);
        assert_eq!(row.cpc, 55.0);
        assert_eq!(row.avg_rank, Some(2.0));
        assert!(cohorts.brand.to_row("2024-01-01", "naver_brand").is_none());
    }

    #[test]
    fn totals_do_not_depend_on_row_order() {
        let rows = vec![
            ad("C1", 10, 1, "0.1"),
            ad("C1", 20, 2, "0.2"),
            ad("C1", 30, 3, "0.3"),
            ad("C2", 5, 0, "1.0"),
        ];
        let forward = group_by_campaign(&rows);
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(2);

        for other in [group_by_campaign(&reversed), group_by_campaign(&rotated)] {
            assert_eq!(forward, other);
        }
        assert_eq!(forward["C1"].impressions, 60);
        assert_eq!(forward["C1"].cost, d("0.6"));
    }

    #[test]
    fn cohort_spend_is_identical_across_orderings() {
        let rows: Vec<AdStatRow> = (0..20).map(|i| ad(&format!("P{i}"), 1, 0, "0.1")).collect();
        let mut reversed = rows.clone();
        reversed.reverse();
        let forward = aggregate(&rows, &[], &HashMap::new(), SETTINGS);
        let backward = aggregate(&reversed, &[], &HashMap::new(), SETTINGS);
        assert_eq!(forward, backward);
        assert_eq!(forward.powerlink.spend, 2.0 * 1.1);
    }

    #[test]
    fn conversion_merge_overwrites() {
        let mut groups = group_by_campaign(&[ad("C1", 100, 10, "500")]);
        merge_conversions(&mut groups, &[conv("C1", "2", "100")]);
        merge_conversions(&mut groups, &[conv("C1", "3", "150")]);
        assert_eq!(groups["C1"].conversions, d("3"));
        assert_eq!(groups["C1"].conversion_value, d("150"));
    }

    #[test]
    fn duplicate_conversion_rows_are_summed_and_orphans_dropped() {
        let mut groups = group_by_campaign(&[ad("C1", 100, 10, "500")]);
        merge_conversions(
            &mut groups,
            &[conv("C1", "1", "10"), conv("C1", "2", "20"), conv("C9", "5", "500")],
        );
        assert_eq!(groups["C1"].conversions, d("3"));
        assert_eq!(groups["C1"].conversion_value, d("30"));
        assert!(!groups.contains_key("C9"));
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn routing_is_total() {
        let rows = vec![ad("C1", 1, 0, "1"), ad("C2", 1, 0, "1"), ad("C3", 1, 0, "1"), ad("C4", 1, 0, "1")];
        let types: HashMap<String, String> = [
            ("C1".to_string(), "BRAND_SEARCH".to_string()),
            ("C2".to_string(), "WEB_SITE".to_string()),
            ("C3".to_string(), "SHOPPING".to_string()),
        ]
        .into_iter()
        .collect();
        let cohorts = aggregate(&rows, &[], &types, SETTINGS);
        assert_eq!(cohorts.brand.campaign_count, 1);
        assert_eq!(cohorts.powerlink.campaign_count, 3);
        assert_eq!(cohorts.brand.campaign_count + cohorts.powerlink.campaign_count, 4);
    }

    #[test]
    fn brand_spend_is_the_baseline_not_cost() {
        let types: HashMap<String, String> =
            [("B1".to_string(), "BRAND_SEARCH".to_string())].into_iter().collect();
        let cohorts = aggregate(&[ad("B1", 1000, 50, "12345"), ad("P1", 10, 1, "100")], &[], &types, SETTINGS);
        assert_eq!(cohorts.brand.spend, 30_000.0);
        assert_eq!(cohorts.brand.impressions, 1000);
        assert!((cohorts.powerlink.spend - 110.0).abs() < 1e-9);
    }

    #[test]
    fn brand_baseline_applies_without_brand_rows() {
        let cohorts = aggregate(&[ad("P1", 100, 10, "500")], &[], &HashMap::new(), SETTINGS);
        assert_eq!(cohorts.brand.campaign_count, 0);
        assert_eq!(cohorts.brand.spend, 30_000.0);

        let row = cohorts.brand.to_row("2024-01-01", "naver_brand").unwrap();
        assert_eq!(row.spend, 30_000.0);
        assert_eq!(row.impressions, 0);
        assert_eq!(row.cpc, 0.0);
        assert_eq!(row.avg_rank, Some(0.0));
    }
}
