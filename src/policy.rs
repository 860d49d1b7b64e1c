//! Every tunable threshold, point delta and cap used by the spike engine.
//!
//! The defaults are the canonical table; a `[policy]` section in the config
//! file may override any subset of fields. Tier tables are validated for
//! monotonicity on load so a tuned table cannot invert the scoring order.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::models::{Impact, SpikeDirection};

/// One row of a tier table: `bound` is the spike magnitude cut-point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub bound: f64,
    pub score: i32,
}

impl Tier {
    const fn new(bound: f64, score: i32) -> Self {
        Self { bound, score }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactPoints {
    pub high: i32,
    pub medium: i32,
    pub low: i32,
}

impl ImpactPoints {
    pub fn points(&self, impact: Impact) -> i32 {
        match impact {
            Impact::High => self.high,
            Impact::Medium => self.medium,
            Impact::Low => self.low,
        }
    }
}

/// Point deltas applied per factor; reducing points are subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorAdjustments {
    pub reducing: ImpactPoints,
    pub increasing: ImpactPoints,
}

impl FactorAdjustments {
    /// Full-strength deltas for flat or rising sales.
    pub const fn rising() -> Self {
        Self {
            reducing: ImpactPoints {
                high: 35,
                medium: 20,
                low: 10,
            },
            increasing: ImpactPoints {
                high: 25,
                medium: 12,
                low: 6,
            },
        }
    }

    /// Scaled-down deltas for falling sales.
    pub const fn falling() -> Self {
        Self {
            reducing: ImpactPoints {
                high: 6,
                medium: 3,
                low: 2,
            },
            increasing: ImpactPoints {
                high: 4,
                medium: 2,
                low: 1,
            },
        }
    }
}

/// Partial `[policy.*_adjustments]` table; missing points keep the base value.
#[derive(Debug, Deserialize)]
struct AdjustmentsPatch {
    reducing: Option<ImpactPointsPatch>,
    increasing: Option<ImpactPointsPatch>,
}

#[derive(Debug, Deserialize)]
struct ImpactPointsPatch {
    high: Option<i32>,
    medium: Option<i32>,
    low: Option<i32>,
}

impl ImpactPointsPatch {
    fn apply(self, base: ImpactPoints) -> ImpactPoints {
        ImpactPoints {
            high: self.high.unwrap_or(base.high),
            medium: self.medium.unwrap_or(base.medium),
            low: self.low.unwrap_or(base.low),
        }
    }
}

impl AdjustmentsPatch {
    fn apply(self, base: FactorAdjustments) -> FactorAdjustments {
        FactorAdjustments {
            reducing: self
                .reducing
                .map_or(base.reducing, |patch| patch.apply(base.reducing)),
            increasing: self
                .increasing
                .map_or(base.increasing, |patch| patch.apply(base.increasing)),
        }
    }
}

fn rising_adjustments<'de, D>(deserializer: D) -> Result<FactorAdjustments, D::Error>
where
    D: Deserializer<'de>,
{
    AdjustmentsPatch::deserialize(deserializer)
        .map(|patch| patch.apply(FactorAdjustments::rising()))
}

fn falling_adjustments<'de, D>(deserializer: D) -> Result<FactorAdjustments, D::Error>
where
    D: Deserializer<'de>,
{
    AdjustmentsPatch::deserialize(deserializer)
        .map(|patch| patch.apply(FactorAdjustments::falling()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorThresholds {
    pub campaign_high_overlap_pct: f64,
    pub geographic_high: f64,
    pub geographic_medium: f64,
    pub demographic_high: f64,
    pub demographic_medium: f64,
    pub sustained_min_days: usize,
    pub sustained_day_multiplier: f64,
    pub sustained_high_day_share: f64,
    pub cross_category_share: f64,
    pub flu_category: String,
    pub flu_season_months: Vec<u32>,
    pub allergy_keyword: String,
    pub allergy_season_months: Vec<u32>,
}

impl Default for FactorThresholds {
    fn default() -> Self {
        Self {
            campaign_high_overlap_pct: 50.0,
            geographic_high: 0.8,
            geographic_medium: 0.5,
            demographic_high: 0.9,
            demographic_medium: 0.7,
            sustained_min_days: 3,
            sustained_day_multiplier: 1.5,
            sustained_high_day_share: 0.6,
            cross_category_share: 0.3,
            flu_category: "Cold & Flu".to_string(),
            flu_season_months: vec![10, 11, 12, 1, 2, 3],
            allergy_keyword: "allergy".to_string(),
            allergy_season_months: vec![3, 4, 5, 9, 10],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    /// Confidence at or above this is high risk.
    pub high_risk: u8,
    /// Confidence at or below this is low risk.
    pub low_risk: u8,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            high_risk: 70,
            low_risk: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub spike_clamp: f64,
    /// Decreasing spikes, largest decrease first: `abs(spike) > bound` selects `score`.
    pub decrease_tiers: Vec<Tier>,
    pub decrease_floor_score: i32,
    /// Increasing spikes, smallest band first: `spike < bound` selects `score`.
    pub increase_bands: Vec<Tier>,
    pub increase_top_score: i32,
    #[serde(deserialize_with = "rising_adjustments")]
    pub rising_adjustments: FactorAdjustments,
    #[serde(deserialize_with = "falling_adjustments")]
    pub falling_adjustments: FactorAdjustments,
    /// Ceilings for decreasing spikes, largest decrease first.
    pub falling_ceilings: Vec<Tier>,
    pub falling_default_ceiling: i32,
    pub status: StatusThresholds,
    pub factors: FactorThresholds,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            spike_clamp: 500.0,
            decrease_tiers: vec![
                Tier::new(50.0, 3),
                Tier::new(30.0, 6),
                Tier::new(15.0, 9),
                Tier::new(5.0, 12),
            ],
            decrease_floor_score: 15,
            increase_bands: vec![
                Tier::new(15.0, 20),
                Tier::new(30.0, 30),
                Tier::new(60.0, 40),
                Tier::new(100.0, 50),
                Tier::new(200.0, 60),
            ],
            increase_top_score: 75,
            rising_adjustments: FactorAdjustments::rising(),
            falling_adjustments: FactorAdjustments::falling(),
            falling_ceilings: vec![Tier::new(50.0, 5), Tier::new(20.0, 10)],
            falling_default_ceiling: 15,
            status: StatusThresholds::default(),
            factors: FactorThresholds::default(),
        }
    }
}

impl ScoringPolicy {
    pub fn clamp_spike(&self, spike: f64) -> f64 {
        spike.clamp(-self.spike_clamp, self.spike_clamp)
    }

    pub fn base_score(&self, spike: f64) -> i32 {
        if spike < 0.0 {
            let magnitude = spike.abs();
            self.decrease_tiers
                .iter()
                .find(|tier| magnitude > tier.bound)
                .map_or(self.decrease_floor_score, |tier| tier.score)
        } else {
            self.increase_bands
                .iter()
                .find(|tier| spike < tier.bound)
                .map_or(self.increase_top_score, |tier| tier.score)
        }
    }

    pub fn adjustments(&self, direction: SpikeDirection) -> &FactorAdjustments {
        match direction {
            SpikeDirection::Increasing => &self.rising_adjustments,
            SpikeDirection::Decreasing => &self.falling_adjustments,
        }
    }

    /// Ceiling for a decreasing spike; `None` when sales are not falling.
    pub fn ceiling(&self, spike: f64) -> Option<i32> {
        if spike >= 0.0 {
            return None;
        }
        let magnitude = spike.abs();
        Some(
            self.falling_ceilings
                .iter()
                .find(|tier| magnitude > tier.bound)
                .map_or(self.falling_default_ceiling, |tier| tier.score),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spike_clamp.is_nan() || self.spike_clamp <= 0.0 {
            return Err(ConfigError::Policy("spike_clamp must be positive".into()));
        }

        let mut previous: Option<Tier> = None;
        for tier in &self.decrease_tiers {
            if let Some(prev) = previous {
                if tier.bound >= prev.bound || tier.score <= prev.score {
                    return Err(ConfigError::Policy(
                        "decrease_tiers must list shrinking bounds with growing scores".into(),
                    ));
                }
            }
            previous = Some(*tier);
        }
        if previous.is_some_and(|last| last.score >= self.decrease_floor_score) {
            return Err(ConfigError::Policy(
                "decrease_floor_score must exceed every decrease tier score".into(),
            ));
        }

        let mut previous: Option<Tier> = None;
        for tier in &self.increase_bands {
            if let Some(prev) = previous {
                if tier.bound <= prev.bound || tier.score <= prev.score {
                    return Err(ConfigError::Policy(
                        "increase_bands must list growing bounds with growing scores".into(),
                    ));
                }
            }
            previous = Some(*tier);
        }
        if previous.is_some_and(|last| last.score >= self.increase_top_score) {
            return Err(ConfigError::Policy(
                "increase_top_score must exceed every increase band score".into(),
            ));
        }

        let mut previous: Option<Tier> = None;
        for tier in &self.falling_ceilings {
            if let Some(prev) = previous {
                if tier.bound >= prev.bound || tier.score < prev.score {
                    return Err(ConfigError::Policy(
                        "falling_ceilings must list shrinking bounds with non-decreasing caps"
                            .into(),
                    ));
                }
            }
            previous = Some(*tier);
        }
        if previous.is_some_and(|last| last.score > self.falling_default_ceiling)
            || !(0..=100).contains(&self.falling_default_ceiling)
        {
            return Err(ConfigError::Policy(
                "falling_default_ceiling must lie in [0, 100] and cover every tier cap".into(),
            ));
        }

        if self.status.low_risk >= self.status.high_risk {
            return Err(ConfigError::Policy(
                "status.low_risk must sit below status.high_risk".into(),
            ));
        }

        Ok(())
    }
}
