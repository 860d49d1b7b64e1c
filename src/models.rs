use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::risk::RiskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub medicine_name: String,
    pub category: String,
    pub branch_name: String,
    pub date: NaiveDate,
    pub hour: u8,
    pub age_group: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_name: String,
    pub category: String,
    pub discount_pct: f64,
    pub budget: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Campaign {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    Weekly,
    Monthly,
}

impl PeriodType {
    /// Minimum calendar span for a period to count towards the baseline.
    pub fn min_days(self) -> i64 {
        match self {
            Self::Weekly => 5,
            Self::Monthly => 20,
        }
    }

    pub fn nominal_days(self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" | "w" => Ok(Self::Weekly),
            "monthly" | "month" | "m" => Ok(Self::Monthly),
            other => Err(format!("unknown period type `{other}` (expected weekly or monthly)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub key: String,
    pub total_quantity: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub span_days: i64,
}

impl Period {
    pub fn is_valid(&self, period_type: PeriodType) -> bool {
        self.span_days >= period_type.min_days()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Campaign,
    GeographicSpread,
    Demographics,
    SustainedPattern,
    CrossCategory,
    SeasonalExpected,
}

impl FactorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::GeographicSpread => "geographic_spread",
            Self::Demographics => "demographics",
            Self::SustainedPattern => "sustained_pattern",
            Self::CrossCategory => "cross_category",
            Self::SeasonalExpected => "seasonal_expected",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Campaign => "Campaign",
            Self::GeographicSpread => "Geographic Spread",
            Self::Demographics => "Demographics",
            Self::SustainedPattern => "Sustained Pattern",
            Self::CrossCategory => "Cross Category",
            Self::SeasonalExpected => "Seasonal Expected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Which way a factor pushes the outbreak estimate. A factor carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    IncreasesOutbreakProbability,
    ReducesOutbreakProbability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    pub kind: FactorKind,
    pub impact: Impact,
    pub details: String,
    pub polarity: Polarity,
}

impl Factor {
    pub fn increasing(kind: FactorKind, impact: Impact, details: impl Into<String>) -> Self {
        Self {
            kind,
            impact,
            details: details.into(),
            polarity: Polarity::IncreasesOutbreakProbability,
        }
    }

    pub fn reducing(kind: FactorKind, impact: Impact, details: impl Into<String>) -> Self {
        Self {
            kind,
            impact,
            details: details.into(),
            polarity: Polarity::ReducesOutbreakProbability,
        }
    }

    pub fn increases_outbreak_probability(&self) -> bool {
        self.polarity == Polarity::IncreasesOutbreakProbability
    }

    pub fn reduces_outbreak_probability(&self) -> bool {
        self.polarity == Polarity::ReducesOutbreakProbability
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BaselineMode {
    /// Fewer than two complete periods: baseline projected from the all-time daily average.
    InsufficientData {
        daily_avg: f64,
        window_start: NaiveDate,
        window_end: NaiveDate,
    },
    SufficientPeriods { baseline_periods: Vec<Period> },
}

impl BaselineMode {
    pub fn calculation_method(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::SufficientPeriods { .. } => "sufficient_periods",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpikeDirection {
    Increasing,
    Decreasing,
}

impl SpikeDirection {
    pub fn of(spike_percentage: f64) -> Self {
        if spike_percentage < 0.0 {
            Self::Decreasing
        } else {
            Self::Increasing
        }
    }
}

impl fmt::Display for SpikeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increasing => f.write_str("Increasing"),
            Self::Decreasing => f.write_str("Decreasing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeAnalysis {
    pub medicine: String,
    pub category: String,
    pub period_type: PeriodType,
    pub current_period: String,
    pub current_sales: u64,
    pub baseline_avg: f64,
    pub spike_percentage: f64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub factors: Vec<Factor>,
    pub baseline: BaselineMode,
    pub period_count: usize,
}

impl SpikeAnalysis {
    pub fn insufficient_data(&self) -> bool {
        matches!(self.baseline, BaselineMode::InsufficientData { .. })
    }

    pub fn spike_direction(&self) -> SpikeDirection {
        SpikeDirection::of(self.spike_percentage)
    }
}

/// Audit trail for a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub spike_direction: SpikeDirection,
    pub spike_percentage: f64,
    pub base_score: i32,
    pub reducing_factors: usize,
    pub increasing_factors: usize,
    pub reducing_adjustment: i32,
    pub increasing_adjustment: i32,
    pub raw_score: i32,
    pub ceiling: Option<i32>,
    pub ceiling_applied: bool,
    pub calculation_method: String,
    pub current_sales: u64,
    pub baseline_avg: f64,
    pub final_confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub confidence: u8,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicineRisk {
    pub medicine: String,
    pub current_sales: u64,
    pub spike_percentage: f64,
    pub confidence: u8,
    pub status: RiskStatus,
    pub factor_count: usize,
    pub factors_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkOverview {
    pub monitored: usize,
    pub analyzed: usize,
    pub high_risk_count: usize,
    pub avg_confidence: f64,
    pub affected_branches: Vec<String>,
    pub rows: Vec<MedicineRisk>,
}
