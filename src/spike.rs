use tracing::debug;

use crate::baseline;
use crate::factors::{self, FactorContext};
use crate::models::{Campaign, PeriodType, SalesRecord, SpikeAnalysis};
use crate::periods;
use crate::policy::ScoringPolicy;

/// Compares a medicine's current period against its baseline and collects
/// the contextual factors for that period.
///
/// Returns `None` when `medicine` has no sales.
pub fn analyze(
    medicine: &str,
    period_type: PeriodType,
    sales: &[SalesRecord],
    campaigns: &[Campaign],
    policy: &ScoringPolicy,
) -> Option<SpikeAnalysis> {
    let history = periods::medicine_history(sales, medicine);
    let Some(first) = history.first() else {
        debug!(medicine, "no sales history; skipping spike analysis");
        return None;
    };
    let category = first.category.clone();

    let period_list = periods::aggregate_history(&history, period_type);
    let estimate = baseline::estimate(&period_list, &history, period_type, policy)?;

    let current_sales: Vec<&SalesRecord> = history
        .iter()
        .copied()
        .filter(|r| r.date >= estimate.period_start && r.date <= estimate.period_end)
        .collect();

    let factors = factors::detect(
        &FactorContext {
            medicine,
            category: &category,
            period_type,
            period_start: estimate.period_start,
            period_end: estimate.period_end,
            current_sales: &current_sales,
            all_sales: sales,
            campaigns,
        },
        &policy.factors,
    );

    debug!(
        medicine,
        period_type = period_type.as_str(),
        method = estimate.mode.calculation_method(),
        current_period = %estimate.current_label,
        current_sales = estimate.current_quantity,
        baseline_avg = estimate.baseline_avg,
        spike_percentage = estimate.spike_percentage,
        factor_count = factors.len(),
        "spike analysis complete"
    );

    Some(SpikeAnalysis {
        medicine: medicine.to_string(),
        category,
        period_type,
        current_period: estimate.current_label,
        current_sales: estimate.current_quantity,
        baseline_avg: estimate.baseline_avg,
        spike_percentage: estimate.spike_percentage,
        period_start: estimate.period_start,
        period_end: estimate.period_end,
        factors,
        baseline: estimate.mode,
        period_count: estimate.valid_period_count,
    })
}

pub fn analyze_default(
    medicine: &str,
    period_type: PeriodType,
    sales: &[SalesRecord],
    campaigns: &[Campaign],
) -> Option<SpikeAnalysis> {
    analyze(medicine, period_type, sales, campaigns, &ScoringPolicy::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FactorKind;
    use chrono::NaiveDate;

    fn sale(date: &str, quantity: u32) -> SalesRecord {
        SalesRecord {
            transaction_id: None,
            medicine_name: "Decongestant".to_string(),
            category: "Cold & Flu".to_string(),
            branch_name: "Guardian Tampines".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            hour: 18,
            age_group: "51-65".to_string(),
            quantity,
        }
    }

    #[test]
    fn nonexistent_medicine_returns_none() {
        let sales = vec![sale("2024-05-06", 3)];
        assert!(
            analyze_default("Nonexistent Medicine", PeriodType::Weekly, &sales, &[]).is_none()
        );
    }

    #[test]
    fn monthly_analysis_uses_last_complete_month() {
        let mut sales = Vec::new();
        for month in 1..=3u32 {
            for d in [1u32, 10, 20, 28] {
                let quantity = if month == 3 { 20 } else { 10 };
                sales.push(sale(&format!("2024-{month:02}-{d:02}"), quantity));
            }
        }
        // Partial April is ignored for both current and baseline.
        sales.push(sale("2024-04-02", 500));

        let analysis =
            analyze_default("Decongestant", PeriodType::Monthly, &sales, &[]).unwrap();
        assert_eq!(analysis.current_period, "2024-03");
        assert_eq!(analysis.current_sales, 80);
        assert!((analysis.baseline_avg - 40.0).abs() < 1e-9);
        assert!((analysis.spike_percentage - 100.0).abs() < 1e-9);
        assert_eq!(analysis.period_count, 3);
        assert!(!analysis.insufficient_data());
        assert!(analysis
            .factors
            .iter()
            .all(|f| f.kind != FactorKind::SustainedPattern));
    }

    #[test]
    fn sparse_history_checks_context_against_trailing_window() {
        let sales = vec![
            sale("2024-02-26", 4),
            sale("2024-04-08", 6),
            sale("2024-04-09", 5),
        ];
        let campaigns = vec![Campaign {
            campaign_name: "Flu Season Prep".to_string(),
            category: "Cold & Flu".to_string(),
            discount_pct: 15.0,
            budget: 5000.0,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        }];

        let analysis =
            analyze_default("Decongestant", PeriodType::Weekly, &sales, &campaigns).unwrap();
        assert!(analysis.insufficient_data());
        assert_eq!(analysis.period_start, NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        assert_eq!(analysis.period_end, NaiveDate::from_ymd_opt(2024, 4, 9).unwrap());
        assert_eq!(analysis.current_sales, 11);
        // The March campaign and the February flu month fall outside the window.
        assert!(analysis.factors.iter().all(|f| {
            f.kind != FactorKind::Campaign && f.kind != FactorKind::SeasonalExpected
        }));
    }
}
