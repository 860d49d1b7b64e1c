use std::fmt::Write;

use crate::models::{ConfidenceScore, Factor, FactorKind, NetworkOverview, SpikeAnalysis};
use crate::policy::ScoringPolicy;
use crate::risk::RiskStatus;

fn short_label(kind: FactorKind) -> &'static str {
    match kind {
        FactorKind::Campaign => "Campaign",
        FactorKind::GeographicSpread => "Geographic spread",
        FactorKind::Demographics => "Multi-demographic",
        FactorKind::SustainedPattern => "Sustained pattern",
        FactorKind::CrossCategory => "Cross-category purchases",
        FactorKind::SeasonalExpected => "Seasonal pattern",
    }
}

/// One-line factor summary for tables.
pub fn describe_factors(factors: &[Factor]) -> String {
    if factors.is_empty() {
        return "No factors detected".to_string();
    }

    let labels: Vec<String> = factors
        .iter()
        .map(|factor| format!("{} ({})", short_label(factor.kind), factor.impact.as_str()))
        .collect();

    if labels.len() <= 2 {
        labels.join(" • ")
    } else {
        format!("{} factors: {} + more", labels.len(), labels[..2].join(" • "))
    }
}

fn write_factor_lines(output: &mut String, factors: &[Factor]) {
    if factors.is_empty() {
        let _ = writeln!(
            output,
            "No significant external factors detected - spike may be random or due to genuine outbreak."
        );
        return;
    }

    for factor in factors {
        let marker = if factor.reduces_outbreak_probability() {
            "[-]"
        } else {
            "[+]"
        };
        let _ = writeln!(
            output,
            "- {} **{}** ({} impact): {}",
            marker,
            factor.kind.title(),
            factor.impact.as_str(),
            factor.details
        );
    }
}

fn write_narrative(output: &mut String, narrative: Option<&str>) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Narrative");
    match narrative {
        Some(text) => {
            let _ = writeln!(output, "{}", text.trim());
        }
        None => {
            let _ = writeln!(output, "Narrative generation unavailable for this run.");
        }
    }
}

pub fn build_analysis_report(
    analysis: &SpikeAnalysis,
    score: &ConfidenceScore,
    policy: &ScoringPolicy,
    narrative: Option<&str>,
) -> String {
    let status = RiskStatus::from_confidence(score.confidence, &policy.status);
    let breakdown = &score.breakdown;
    let mut output = String::new();

    let _ = writeln!(output, "# Outbreak Spike Analysis: {}", analysis.medicine);
    let _ = writeln!(
        output,
        "{} analysis for {} ({} to {})",
        analysis.period_type, analysis.current_period, analysis.period_start, analysis.period_end
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Results");
    let _ = writeln!(output, "- Outbreak confidence: {}% ({})", score.confidence, status.label());
    let _ = writeln!(
        output,
        "- {} sales: {} units ({:+.1}% vs baseline)",
        analysis.period_type, analysis.current_sales, analysis.spike_percentage
    );
    let _ = writeln!(output, "- Baseline average: {:.0} units", analysis.baseline_avg);
    let _ = writeln!(output, "- Factors detected: {}", analysis.factors.len());

    if analysis.insufficient_data() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> Limited data: only {} complete {} periods found for {}. The baseline uses the overall daily average.",
            analysis.period_count,
            analysis.period_type.as_str().to_lowercase(),
            analysis.medicine
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Scoring Audit");
    let _ = writeln!(output, "- Calculation method: {}", breakdown.calculation_method);
    let _ = writeln!(output, "- Spike direction: {}", breakdown.spike_direction);
    if analysis.baseline_avg > 0.0 {
        let _ = writeln!(
            output,
            "- Spike: ({} - {:.1}) / {:.1} x 100 = {:.1}%",
            analysis.current_sales,
            analysis.baseline_avg,
            analysis.baseline_avg,
            analysis.spike_percentage
        );
    }
    let _ = writeln!(output, "- Base score: {}", breakdown.base_score);
    let _ = writeln!(
        output,
        "- Reducing factors: {} ({:+})",
        breakdown.reducing_factors, breakdown.reducing_adjustment
    );
    let _ = writeln!(
        output,
        "- Increasing factors: {} ({:+})",
        breakdown.increasing_factors, breakdown.increasing_adjustment
    );
    let _ = writeln!(output, "- Raw score: {}", breakdown.raw_score);
    match breakdown.ceiling {
        Some(cap) if breakdown.ceiling_applied => {
            let _ = writeln!(output, "- Falling-sales ceiling: {cap} (applied)");
        }
        Some(cap) => {
            let _ = writeln!(output, "- Falling-sales ceiling: {cap} (not reached)");
        }
        None => {}
    }
    let _ = writeln!(output, "- Final score: {}", breakdown.final_confidence);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Factor Analysis");
    write_factor_lines(&mut output, &analysis.factors);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendation");
    let _ = writeln!(output, "**{} ({}%)**", status.headline(), score.confidence);
    for line in status.recommendations(&analysis.medicine) {
        let _ = writeln!(output, "- {line}");
    }

    write_narrative(&mut output, narrative);
    output
}

pub fn build_report(
    overview: &NetworkOverview,
    details: &[(SpikeAnalysis, ConfidenceScore)],
    narrative: Option<&str>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Disease Monitoring Overview");
    let _ = writeln!(
        output,
        "Weekly spike analysis across {} monitored medicines",
        overview.monitored
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Network Summary");
    let _ = writeln!(output, "- High risk medicines: {}", overview.high_risk_count);
    let _ = writeln!(
        output,
        "- Medicines analyzed: {} out of {} monitored",
        overview.analyzed, overview.monitored
    );
    let _ = writeln!(output, "- Average risk level: {:.0}%", overview.avg_confidence);
    if overview.affected_branches.is_empty() {
        let _ = writeln!(output, "- Affected branches: none");
    } else {
        let _ = writeln!(
            output,
            "- Affected branches: {} ({})",
            overview.affected_branches.len(),
            overview.affected_branches.join(", ")
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Medicine Risk Analysis");

    if overview.rows.is_empty() {
        let _ = writeln!(output, "No medicine analysis data available.");
    } else {
        let _ = writeln!(
            output,
            "| Medicine | Current Sales | Spike % | Risk Level | Status | Factors |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &overview.rows {
            let _ = writeln!(
                output,
                "| {} | {} | {:.1}% | {}% | {} | {} |",
                row.medicine,
                row.current_sales,
                row.spike_percentage,
                row.confidence,
                row.status.label(),
                row.factors_summary
            );
        }
    }

    for (analysis, score) in details {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({}, {}%)",
            analysis.medicine, analysis.current_period, score.confidence
        );
        write_factor_lines(&mut output, &analysis.factors);
    }

    write_narrative(&mut output, narrative);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Impact, MedicineRisk};

    #[test]
    fn describes_short_factor_lists_inline() {
        assert_eq!(describe_factors(&[]), "No factors detected");

        let factors = vec![
            Factor::reducing(FactorKind::Campaign, Impact::High, "x"),
            Factor::increasing(FactorKind::GeographicSpread, Impact::Medium, "y"),
        ];
        assert_eq!(describe_factors(&factors), "Campaign (high) • Geographic spread (medium)");
    }

    #[test]
    fn describes_long_factor_lists_with_count() {
        let factors = vec![
            Factor::increasing(FactorKind::Demographics, Impact::High, "a"),
            Factor::increasing(FactorKind::SustainedPattern, Impact::High, "b"),
            Factor::reducing(FactorKind::SeasonalExpected, Impact::Medium, "c"),
        ];
        assert_eq!(
            describe_factors(&factors),
            "3 factors: Multi-demographic (high) • Sustained pattern (high) + more"
        );
    }

    #[test]
    fn overview_report_lists_rows_and_branches() {
        let overview = NetworkOverview {
            monitored: 2,
            analyzed: 1,
            high_risk_count: 1,
            avg_confidence: 82.0,
            affected_branches: vec!["Guardian Bedok".to_string(), "Guardian Tampines".to_string()],
            rows: vec![MedicineRisk {
                medicine: "Cough Syrup".to_string(),
                current_sales: 420,
                spike_percentage: 180.0,
                confidence: 82,
                status: RiskStatus::HighRisk,
                factor_count: 0,
                factors_summary: "No factors detected".to_string(),
            }],
        };

        let report = build_report(&overview, &[], None);
        assert!(report.contains("- Affected branches: 2 (Guardian Bedok, Guardian Tampines)"));
        assert!(report
            .contains("| Cough Syrup | 420 | 180.0% | 82% | High Risk | No factors detected |"));
        assert!(report.contains("Narrative generation unavailable"));
    }
}
