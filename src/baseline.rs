use chrono::{Duration, NaiveDate};

use crate::models::{BaselineMode, Period, PeriodType, SalesRecord};
use crate::policy::ScoringPolicy;

/// Current-period figures and the baseline they are compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineEstimate {
    pub mode: BaselineMode,
    pub current_label: String,
    pub current_quantity: u64,
    pub baseline_avg: f64,
    pub spike_percentage: f64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub valid_period_count: usize,
}

/// Signed percent change of `current` over `baseline`, clamped to the policy limit.
pub fn spike_percentage(current: f64, baseline: f64, policy: &ScoringPolicy) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    policy.clamp_spike((current - baseline) / baseline * 100.0)
}

pub fn estimate(
    periods: &[Period],
    history: &[&SalesRecord],
    period_type: PeriodType,
    policy: &ScoringPolicy,
) -> Option<BaselineEstimate> {
    let valid: Vec<&Period> = periods.iter().filter(|p| p.is_valid(period_type)).collect();

    match valid.split_last() {
        Some((current, earlier)) if !earlier.is_empty() => {
            let baseline_total: u64 = earlier.iter().map(|p| p.total_quantity).sum();
            let baseline_avg = baseline_total as f64 / earlier.len() as f64;

            Some(BaselineEstimate {
                mode: BaselineMode::SufficientPeriods {
                    baseline_periods: earlier.iter().map(|p| (*p).clone()).collect(),
                },
                current_label: current.key.clone(),
                current_quantity: current.total_quantity,
                baseline_avg,
                spike_percentage: spike_percentage(
                    current.total_quantity as f64,
                    baseline_avg,
                    policy,
                ),
                period_start: current.start_date,
                period_end: current.end_date,
                valid_period_count: valid.len(),
            })
        }
        _ => trailing_window_estimate(history, period_type, valid.len(), policy),
    }
}

fn trailing_window_estimate(
    history: &[&SalesRecord],
    period_type: PeriodType,
    valid_period_count: usize,
    policy: &ScoringPolicy,
) -> Option<BaselineEstimate> {
    let first = history.iter().map(|r| r.date).min()?;
    let last = history.iter().map(|r| r.date).max()?;

    let total_days = (last - first).num_days() + 1;
    let total_quantity: u64 = history.iter().map(|r| u64::from(r.quantity)).sum();
    let daily_avg = total_quantity as f64 / total_days as f64;
    let baseline_avg = daily_avg * period_type.nominal_days() as f64;

    let window_start = last - Duration::days(period_type.nominal_days() - 1);
    let current_quantity: u64 = history
        .iter()
        .filter(|r| r.date >= window_start && r.date <= last)
        .map(|r| u64::from(r.quantity))
        .sum();

    Some(BaselineEstimate {
        mode: BaselineMode::InsufficientData {
            daily_avg,
            window_start,
            window_end: last,
        },
        current_label: format!("Latest {}", period_type.as_str().to_lowercase()),
        current_quantity,
        baseline_avg,
        spike_percentage: spike_percentage(current_quantity as f64, baseline_avg, policy),
        period_start: window_start,
        period_end: last,
        valid_period_count,
    })
}
