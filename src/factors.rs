//! Contextual signals that make an observed spike more or less likely to be
//! an outbreak. Each check is independent and yields at most one factor.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::models::{Campaign, Factor, FactorKind, Impact, PeriodType, SalesRecord};
use crate::policy::FactorThresholds;

/// Everything the detector looks at for one medicine and period.
#[derive(Debug, Clone, Copy)]
pub struct FactorContext<'a> {
    pub medicine: &'a str,
    pub category: &'a str,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// The medicine's sales inside `[period_start, period_end]`.
    pub current_sales: &'a [&'a SalesRecord],
    /// All sales across medicines, used for branch and age-group universes.
    pub all_sales: &'a [SalesRecord],
    pub campaigns: &'a [Campaign],
}

pub fn detect(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Vec<Factor> {
    [
        campaign_overlap(ctx, thresholds),
        geographic_spread(ctx, thresholds),
        demographic_spread(ctx, thresholds),
        sustained_pattern(ctx, thresholds),
        cross_category(ctx, thresholds),
        seasonal_expectation(ctx, thresholds),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn campaign_overlap(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Option<Factor> {
    let campaign = ctx.campaigns.iter().find(|campaign| {
        campaign.category == ctx.category && campaign.overlaps(ctx.period_start, ctx.period_end)
    })?;

    let overlap_start = campaign.start_date.max(ctx.period_start);
    let overlap_end = campaign.end_date.min(ctx.period_end);
    let overlap_days = (overlap_end - overlap_start).num_days() + 1;
    let period_days = (ctx.period_end - ctx.period_start).num_days() + 1;
    let overlap_pct = if period_days > 0 {
        overlap_days as f64 / period_days as f64 * 100.0
    } else {
        0.0
    };

    let impact = if overlap_pct > thresholds.campaign_high_overlap_pct {
        Impact::High
    } else {
        Impact::Medium
    };

    Some(Factor::reducing(
        FactorKind::Campaign,
        impact,
        format!(
            "Campaign '{}' ({}% off) active for {:.0}% of period",
            campaign.campaign_name, campaign.discount_pct, overlap_pct
        ),
    ))
}

fn geographic_spread(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Option<Factor> {
    let affected: HashSet<&str> =
        ctx.current_sales.iter().map(|r| r.branch_name.as_str()).collect();
    let total: HashSet<&str> = ctx.all_sales.iter().map(|r| r.branch_name.as_str()).collect();
    let spread = ratio(affected.len(), total.len());

    let (impact, note) = if spread >= thresholds.geographic_high {
        (Impact::High, "widespread distribution")
    } else if spread >= thresholds.geographic_medium {
        (Impact::Medium, "moderate spread")
    } else {
        return None;
    };

    Some(Factor::increasing(
        FactorKind::GeographicSpread,
        impact,
        format!(
            "{}/{} branches affected ({:.0}%) - {}",
            affected.len(),
            total.len(),
            spread * 100.0,
            note
        ),
    ))
}

fn demographic_spread(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Option<Factor> {
    let affected: HashSet<&str> = ctx.current_sales.iter().map(|r| r.age_group.as_str()).collect();
    let total: HashSet<&str> = ctx.all_sales.iter().map(|r| r.age_group.as_str()).collect();
    let spread = ratio(affected.len(), total.len());

    let (impact, note) = if spread >= thresholds.demographic_high {
        (Impact::High, "unusual broad spread")
    } else if spread >= thresholds.demographic_medium {
        (Impact::Medium, "broad community spread")
    } else {
        return None;
    };

    Some(Factor::increasing(
        FactorKind::Demographics,
        impact,
        format!(
            "{}/{} age groups affected ({:.0}%) - {}",
            affected.len(),
            total.len(),
            spread * 100.0,
            note
        ),
    ))
}

fn sustained_pattern(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Option<Factor> {
    if ctx.period_type != PeriodType::Weekly {
        return None;
    }

    let mut daily: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in ctx.current_sales {
        *daily.entry(record.date).or_default() += u64::from(record.quantity);
    }
    if daily.len() < thresholds.sustained_min_days {
        return None;
    }

    let days = daily.len();
    let mean = daily.values().sum::<u64>() as f64 / days as f64;
    let cutoff = mean * thresholds.sustained_day_multiplier;
    let high_days = daily.values().filter(|qty| **qty as f64 > cutoff).count();

    if (high_days as f64) < days as f64 * thresholds.sustained_high_day_share {
        return None;
    }

    Some(Factor::increasing(
        FactorKind::SustainedPattern,
        Impact::High,
        format!("{high_days}/{days} days show elevated sales - indicates sustained demand"),
    ))
}

/// Purchase events are approximated by (branch, date, hour) buckets that
/// include the medicine; an event is multi-category when any sale in the
/// bucket belongs to another category.
fn cross_category(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Option<Factor> {
    let mut events: HashMap<(&str, NaiveDate, u8), (HashSet<&str>, bool)> = HashMap::new();

    for record in ctx
        .all_sales
        .iter()
        .filter(|r| r.date >= ctx.period_start && r.date <= ctx.period_end)
    {
        let entry = events
            .entry((record.branch_name.as_str(), record.date, record.hour))
            .or_default();
        entry.0.insert(record.category.as_str());
        entry.1 |= record.medicine_name == ctx.medicine;
    }

    let (total, multi) = events
        .values()
        .filter(|(_, has_medicine)| *has_medicine)
        .fold((0usize, 0usize), |(total, multi), (categories, _)| {
            (total + 1, multi + usize::from(categories.len() > 1))
        });

    if total == 0 || (multi as f64) <= total as f64 * thresholds.cross_category_share {
        return None;
    }

    Some(Factor::increasing(
        FactorKind::CrossCategory,
        Impact::Medium,
        format!(
            "{:.0}% of purchases include multiple medicine categories ({multi}/{total} purchase events)",
            ratio(multi, total) * 100.0
        ),
    ))
}

fn seasonal_expectation(ctx: &FactorContext<'_>, thresholds: &FactorThresholds) -> Option<Factor> {
    let month = ctx.period_start.month();
    let keyword = thresholds.allergy_keyword.to_lowercase();

    let season = if ctx.category == thresholds.flu_category
        && thresholds.flu_season_months.contains(&month)
    {
        "Flu season"
    } else if !keyword.is_empty()
        && ctx.category.to_lowercase().contains(&keyword)
        && thresholds.allergy_season_months.contains(&month)
    {
        "Allergy season"
    } else {
        return None;
    };

    Some(Factor::reducing(
        FactorKind::SeasonalExpected,
        Impact::Medium,
        format!("{season} (Month {month}) - elevated sales are partially expected"),
    ))
}
