use std::collections::{BTreeSet, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::models::{
    Campaign, ConfidenceScore, Factor, MedicineRisk, NetworkOverview, PeriodType, SalesRecord,
    ScoreBreakdown, SpikeAnalysis,
};
use crate::policy::{ScoringPolicy, StatusThresholds};
use crate::report;
use crate::spike;

/// Turns an analysis into a bounded outbreak confidence with its audit trail.
///
/// Falling sales get a low base score, scaled-down factor adjustments and a
/// ceiling applied after adjustment, so a decrease never reads as high risk.
pub fn score(analysis: &SpikeAnalysis, policy: &ScoringPolicy) -> ConfidenceScore {
    let spike = analysis.spike_percentage;
    let direction = analysis.spike_direction();
    let base_score = policy.base_score(spike);
    let adjustments = policy.adjustments(direction);

    let (reducing, increasing): (Vec<&Factor>, Vec<&Factor>) = analysis
        .factors
        .iter()
        .partition(|factor| factor.reduces_outbreak_probability());

    let reducing_adjustment: i32 = -reducing
        .iter()
        .map(|factor| adjustments.reducing.points(factor.impact))
        .sum::<i32>();
    let increasing_adjustment: i32 = increasing
        .iter()
        .map(|factor| adjustments.increasing.points(factor.impact))
        .sum();

    let raw_score = base_score + reducing_adjustment + increasing_adjustment;
    let ceiling = policy.ceiling(spike);
    let capped = ceiling.map_or(raw_score, |cap| raw_score.min(cap));
    let confidence = capped.clamp(0, 100) as u8;

    ConfidenceScore {
        confidence,
        breakdown: ScoreBreakdown {
            spike_direction: direction,
            spike_percentage: spike,
            base_score,
            reducing_factors: reducing.len(),
            increasing_factors: increasing.len(),
            reducing_adjustment,
            increasing_adjustment,
            raw_score,
            ceiling,
            ceiling_applied: ceiling.is_some_and(|cap| raw_score > cap),
            calculation_method: analysis.baseline.calculation_method().to_string(),
            current_sales: analysis.current_sales,
            baseline_avg: analysis.baseline_avg,
            final_confidence: confidence,
        },
    }
}

pub fn score_default(analysis: &SpikeAnalysis) -> ConfidenceScore {
    score(analysis, &ScoringPolicy::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskStatus {
    HighRisk,
    Monitor,
    LowRisk,
}

impl RiskStatus {
    pub fn from_confidence(confidence: u8, thresholds: &StatusThresholds) -> Self {
        if confidence >= thresholds.high_risk {
            Self::HighRisk
        } else if confidence <= thresholds.low_risk {
            Self::LowRisk
        } else {
            Self::Monitor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HighRisk => "High Risk",
            Self::Monitor => "Monitor",
            Self::LowRisk => "Low Risk",
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            Self::HighRisk => "High Outbreak Probability",
            Self::Monitor => "Moderate Uncertainty",
            Self::LowRisk => "Low Outbreak Probability",
        }
    }

    pub fn recommendations(self, medicine: &str) -> Vec<String> {
        match self {
            Self::HighRisk => vec![
                format!("Increase stock of {medicine} and related medicines"),
                "Monitor neighboring branches closely".to_string(),
                "Consider alerting health authorities".to_string(),
                "Prepare for sustained demand increase".to_string(),
            ],
            Self::Monitor => vec![
                "Mixed signals detected".to_string(),
                "Increase monitoring frequency".to_string(),
                "Prepare moderate stock increase".to_string(),
                "Watch for pattern development over next 2-3 days".to_string(),
            ],
            Self::LowRisk => vec![
                "Sales spike likely due to promotional/external factors".to_string(),
                "Maintain normal stock levels".to_string(),
                "Monitor for pattern changes".to_string(),
                "No immediate action required".to_string(),
            ],
        }
    }
}

/// First `limit` distinct medicines in the order they appear in `sales`.
pub fn default_monitored(sales: &[SalesRecord], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    sales
        .iter()
        .filter(|record| seen.insert(record.medicine_name.as_str()))
        .take(limit)
        .map(|record| record.medicine_name.clone())
        .collect()
}

/// Weekly risk rows for the monitored medicines plus network-wide totals.
pub fn network_overview(
    medicines: &[String],
    sales: &[SalesRecord],
    campaigns: &[Campaign],
    policy: &ScoringPolicy,
) -> NetworkOverview {
    let rows: Vec<MedicineRisk> = medicines
        .par_iter()
        .filter_map(|medicine| {
            let analysis = spike::analyze(medicine, PeriodType::Weekly, sales, campaigns, policy)?;
            let scored = score(&analysis, policy);
            Some(MedicineRisk {
                medicine: medicine.clone(),
                current_sales: analysis.current_sales,
                spike_percentage: analysis.spike_percentage,
                confidence: scored.confidence,
                status: RiskStatus::from_confidence(scored.confidence, &policy.status),
                factor_count: analysis.factors.len(),
                factors_summary: report::describe_factors(&analysis.factors),
            })
        })
        .collect();

    let high_risk: HashSet<&str> = rows
        .iter()
        .filter(|row| row.status == RiskStatus::HighRisk)
        .map(|row| row.medicine.as_str())
        .collect();

    let affected_branches: BTreeSet<String> = sales
        .iter()
        .filter(|record| high_risk.contains(record.medicine_name.as_str()))
        .map(|record| record.branch_name.clone())
        .collect();

    let avg_confidence = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|row| f64::from(row.confidence)).sum::<f64>() / rows.len() as f64
    };

    debug!(
        monitored = medicines.len(),
        analyzed = rows.len(),
        high_risk = high_risk.len(),
        "network overview computed"
    );

    NetworkOverview {
        monitored: medicines.len(),
        analyzed: rows.len(),
        high_risk_count: high_risk.len(),
        avg_confidence,
        affected_branches: affected_branches.into_iter().collect(),
        rows,
    }
}

/// Weekly analyses behind the overview rows that are not low risk, highest
/// confidence first. Uses the same granularity as [`network_overview`].
pub fn elevated_details(
    overview: &NetworkOverview,
    sales: &[SalesRecord],
    campaigns: &[Campaign],
    policy: &ScoringPolicy,
) -> Vec<(SpikeAnalysis, ConfidenceScore)> {
    let mut details: Vec<(SpikeAnalysis, ConfidenceScore)> = overview
        .rows
        .iter()
        .filter(|row| row.status != RiskStatus::LowRisk)
        .filter_map(|row| {
            let analysis =
                spike::analyze(&row.medicine, PeriodType::Weekly, sales, campaigns, policy)?;
            let scored = score(&analysis, policy);
            Some((analysis, scored))
        })
        .collect();
    details.sort_by(|a, b| b.1.confidence.cmp(&a.1.confidence));
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaselineMode, FactorKind, Impact, Period};
    use chrono::NaiveDate;

    fn analysis(spike_percentage: f64, factors: Vec<Factor>) -> SpikeAnalysis {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        SpikeAnalysis {
            medicine: "Paracetamol 500mg".to_string(),
            category: "Cold & Flu".to_string(),
            period_type: PeriodType::Weekly,
            current_period: "2024-W10".to_string(),
            current_sales: 250,
            baseline_avg: 100.0,
            spike_percentage,
            period_start: day,
            period_end: day,
            factors,
            baseline: BaselineMode::SufficientPeriods {
                baseline_periods: vec![Period {
                    key: "2024-W09".to_string(),
                    total_quantity: 100,
                    start_date: day,
                    end_date: day,
                    span_days: 7,
                }],
            },
            period_count: 2,
        }
    }

    fn every_factor() -> Vec<Factor> {
        vec![
            Factor::reducing(FactorKind::Campaign, Impact::High, "campaign"),
            Factor::increasing(FactorKind::GeographicSpread, Impact::High, "geo"),
            Factor::increasing(FactorKind::Demographics, Impact::High, "demo"),
            Factor::increasing(FactorKind::SustainedPattern, Impact::High, "sustained"),
            Factor::increasing(FactorKind::CrossCategory, Impact::Medium, "cross"),
            Factor::reducing(FactorKind::SeasonalExpected, Impact::Medium, "season"),
        ]
    }

    #[test]
    fn scores_without_factors() {
        let scored = score_default(&analysis(150.0, vec![]));
        assert_eq!(scored.confidence, 60);
        assert_eq!(scored.breakdown.base_score, 60);
        assert_eq!(scored.breakdown.reducing_adjustment, 0);
        assert_eq!(scored.breakdown.ceiling, None);
        assert_eq!(scored.breakdown.calculation_method, "sufficient_periods");
    }

    #[test]
    fn rising_sales_apply_full_strength_adjustments() {
        let scored = score_default(&analysis(40.0, every_factor()));
        // 40 - 35 - 20 + 25 + 25 + 25 + 12
        assert_eq!(scored.breakdown.reducing_adjustment, -55);
        assert_eq!(scored.breakdown.increasing_adjustment, 87);
        assert_eq!(scored.breakdown.raw_score, 72);
        assert_eq!(scored.confidence, 72);
        assert_eq!(scored.breakdown.reducing_factors, 2);
        assert_eq!(scored.breakdown.increasing_factors, 4);
    }

    #[test]
    fn falling_sales_are_capped_after_adjustment() {
        let scored = score_default(&analysis(-60.0, every_factor()));
        // 3 - 6 - 3 + 4 + 4 + 4 + 2 = 8, capped at 5
        assert_eq!(scored.breakdown.raw_score, 8);
        assert_eq!(scored.breakdown.ceiling, Some(5));
        assert!(scored.breakdown.ceiling_applied);
        assert_eq!(scored.confidence, 5);
    }

    #[test]
    fn large_decreases_never_exceed_five() {
        for spike in [-50.5, -75.0, -200.0, -500.0] {
            for factors in [vec![], every_factor()] {
                let scored = score_default(&analysis(spike, factors));
                assert!(scored.confidence <= 5, "spike {spike} scored {}", scored.confidence);
            }
        }
    }

    #[test]
    fn confidence_stays_in_bounds() {
        let heavy_reducers = vec![
            Factor::reducing(FactorKind::Campaign, Impact::High, "a"),
            Factor::reducing(FactorKind::SeasonalExpected, Impact::High, "b"),
            Factor::reducing(FactorKind::Campaign, Impact::High, "c"),
        ];
        let heavy_boosters = vec![
            Factor::increasing(FactorKind::GeographicSpread, Impact::High, "a"),
            Factor::increasing(FactorKind::Demographics, Impact::High, "b"),
            Factor::increasing(FactorKind::SustainedPattern, Impact::High, "c"),
        ];
        assert_eq!(score_default(&analysis(5.0, heavy_reducers)).confidence, 0);
        assert_eq!(score_default(&analysis(500.0, heavy_boosters)).confidence, 100);
    }

    #[test]
    fn base_score_is_monotonic_in_both_directions() {
        let policy = ScoringPolicy::default();
        let mut previous = i32::MIN;
        for step in 0..=500 {
            let base = policy.base_score(step as f64);
            assert!(base >= previous, "rising base dropped at {step}%");
            previous = base;
        }
        let mut previous = i32::MAX;
        for step in 1..=500 {
            let base = policy.base_score(-(step as f64));
            assert!(base <= previous, "falling base rose at -{step}%");
            previous = base;
        }
    }

    #[test]
    fn status_follows_thresholds() {
        let thresholds = ScoringPolicy::default().status;
        assert_eq!(RiskStatus::from_confidence(70, &thresholds), RiskStatus::HighRisk);
        assert_eq!(RiskStatus::from_confidence(69, &thresholds), RiskStatus::Monitor);
        assert_eq!(RiskStatus::from_confidence(30, &thresholds), RiskStatus::LowRisk);
        assert_eq!(
            RiskStatus::HighRisk.recommendations("Cough Syrup")[0],
            "Increase stock of Cough Syrup and related medicines"
        );
    }

    #[test]
    fn monitored_medicines_keep_first_appearance_order() {
        let record = |medicine: &str| SalesRecord {
            transaction_id: None,
            medicine_name: medicine.to_string(),
            category: "Vitamins".to_string(),
            branch_name: "Guardian Orchard".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            hour: 12,
            age_group: "26-35".to_string(),
            quantity: 1,
        };
        let sales = vec![
            record("Vitamin D"),
            record("Vitamin C"),
            record("Vitamin D"),
            record("Multivitamin"),
        ];
        assert_eq!(default_monitored(&sales, 2), vec!["Vitamin D", "Vitamin C"]);
    }
}
