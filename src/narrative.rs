//! Natural-language summaries of scored analyses.
//!
//! The engine never calls into this module; the CLI renders narratives after
//! scoring, and any failure degrades to a fixed fallback sentence.

use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::NarrativeConfig;
use crate::error::NarrativeError;
use crate::models::{ConfidenceScore, SpikeAnalysis};
use crate::report::describe_factors;

pub const FALLBACK_TEXT: &str = "Unable to generate AI insights at this time.";

pub const OUTBREAK_PROMPT: &str = "Analyze this medicine sales spike and provide:

1. **Severity Assessment** (scale 1-10 and why)
2. **Likely Cause** (outbreak, promotion, seasonal demand or noise, citing the factors)
3. **Spread Prediction** (will other branches be affected?)
4. **Stock Impact** (which medicines need restocking)
5. **Public Health Alert** (should authorities be notified? Yes/No and why)
6. **Immediate Actions** (3 urgent steps for the pharmacy)

Be specific and actionable.";

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, context: &str) -> Result<String, NarrativeError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiNarrator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiNarrator {
    /// `None` when no API key is configured.
    pub fn from_config(config: &NarrativeConfig) -> Result<Option<Self>, NarrativeError> {
        let Some(api_key) = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }))
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    async fn generate_text(&self, prompt: &str, context: &str) -> Result<String, NarrativeError> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{context}\n\n{prompt}"),
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(NarrativeError::EmptyResponse)
    }
}

/// Structured context handed to the generator.
pub fn outbreak_context(analysis: &SpikeAnalysis, score: &ConfidenceScore) -> String {
    let mut context = String::new();
    let _ = writeln!(context, "MEDICINE SALES SPIKE ANALYSIS:");
    let _ = writeln!(context);
    let _ = writeln!(context, "- Medicine: {} ({})", analysis.medicine, analysis.category);
    let _ = writeln!(
        context,
        "- Period: {} {} ({} to {})",
        analysis.period_type, analysis.current_period, analysis.period_start, analysis.period_end
    );
    let _ = writeln!(context, "- Current sales: {} units", analysis.current_sales);
    let _ = writeln!(context, "- Baseline average: {:.1} units", analysis.baseline_avg);
    let _ = writeln!(context, "- Spike: {:+.1}%", analysis.spike_percentage);
    let _ = writeln!(context, "- Baseline method: {}", analysis.baseline.calculation_method());
    let _ = writeln!(context, "- Outbreak confidence: {}%", score.confidence);
    let _ = writeln!(context, "- Factor summary: {}", describe_factors(&analysis.factors));
    let _ = writeln!(context);
    let _ = writeln!(context, "Factors:");
    if analysis.factors.is_empty() {
        let _ = writeln!(context, "- none");
    }
    for factor in &analysis.factors {
        let direction = if factor.increases_outbreak_probability() {
            "raises outbreak likelihood"
        } else {
            "lowers outbreak likelihood"
        };
        let _ = writeln!(
            context,
            "- {} ({} impact, {}): {}",
            factor.kind.as_str(),
            factor.impact.as_str(),
            direction,
            factor.details
        );
    }
    context
}

/// Generates the outbreak narrative, falling back to a fixed sentence on failure.
pub async fn narrate_outbreak(
    generator: &dyn NarrativeGenerator,
    analysis: &SpikeAnalysis,
    score: &ConfidenceScore,
) -> String {
    let context = outbreak_context(analysis, score);
    match generator.generate_text(OUTBREAK_PROMPT, &context).await {
        Ok(text) => text,
        Err(error) => {
            warn!(medicine = %analysis.medicine, %error, "outbreak narrative generation failed");
            FALLBACK_TEXT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaselineMode, Factor, FactorKind, Impact, PeriodType};
    use crate::risk::score_default;
    use chrono::NaiveDate;

    struct Echo;

    #[async_trait]
    impl NarrativeGenerator for Echo {
        async fn generate_text(
            &self,
            prompt: &str,
            context: &str,
        ) -> Result<String, NarrativeError> {
            assert!(prompt.contains("Severity Assessment"));
            Ok(context.lines().find(|l| l.starts_with("- Medicine")).unwrap_or("").to_string())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl NarrativeGenerator for Unavailable {
        async fn generate_text(&self, _: &str, _: &str) -> Result<String, NarrativeError> {
            Err(NarrativeError::EmptyResponse)
        }
    }

    fn analysis() -> SpikeAnalysis {
        let start = NaiveDate::from_ymd_opt(2024, 11, 4).unwrap();
        SpikeAnalysis {
            medicine: "Cough Syrup".to_string(),
            category: "Cold & Flu".to_string(),
            period_type: PeriodType::Weekly,
            current_period: "Latest weekly".to_string(),
            current_sales: 90,
            baseline_avg: 60.0,
            spike_percentage: 50.0,
            period_start: start,
            period_end: start + chrono::Duration::days(6),
            factors: vec![Factor::reducing(
                FactorKind::SeasonalExpected,
                Impact::Medium,
                "Flu season (Month 11) - elevated sales are partially expected",
            )],
            baseline: BaselineMode::InsufficientData {
                daily_avg: 60.0 / 7.0,
                window_start: start,
                window_end: start + chrono::Duration::days(6),
            },
            period_count: 1,
        }
    }

    #[test]
    fn context_carries_numbers_and_factors() {
        let analysis = analysis();
        let context = outbreak_context(&analysis, &score_default(&analysis));
        assert!(context.contains("- Spike: +50.0%"));
        assert!(context.contains("- Baseline method: insufficient_data"));
        assert!(context.contains("seasonal_expected (medium impact, lowers outbreak likelihood)"));
    }

    #[tokio::test]
    async fn returns_generated_text() {
        let analysis = analysis();
        let text = narrate_outbreak(&Echo, &analysis, &score_default(&analysis)).await;
        assert_eq!(text, "- Medicine: Cough Syrup (Cold & Flu)");
    }

    #[tokio::test]
    async fn failures_fall_back_without_touching_the_score() {
        let analysis = analysis();
        let score = score_default(&analysis);
        let text = narrate_outbreak(&Unavailable, &analysis, &score).await;
        assert_eq!(text, FALLBACK_TEXT);
        assert_eq!(score, score_default(&analysis));
    }

    #[test]
    fn narrator_requires_an_api_key() {
        let config = NarrativeConfig {
            api_key: None,
            ..NarrativeConfig::default()
        };
        assert!(OpenAiNarrator::from_config(&config).unwrap().is_none());
    }
}
