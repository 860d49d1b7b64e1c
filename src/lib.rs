//! Outbreak spike analysis for multi-branch pharmacy sales.
//!
//! The engine is a pure pipeline: aggregate a medicine's sales into periods,
//! estimate a baseline, detect contextual factors, then score the likelihood
//! that the spike is a genuine outbreak. Loading, persistence and narrative
//! generation sit around it and never feed back into the score.

pub mod baseline;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod factors;
pub mod models;
pub mod narrative;
pub mod periods;
pub mod policy;
pub mod report;
pub mod risk;
pub mod spike;

pub use models::{
    Campaign, ConfidenceScore, Factor, FactorKind, Impact, PeriodType, Polarity, SalesRecord,
    ScoreBreakdown, SpikeAnalysis,
};
pub use policy::ScoringPolicy;
pub use risk::{score, score_default};
pub use spike::{analyze, analyze_default};
