use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tenderdesk_core::domain::analysis::{
    PricingStrategy, SalesSummary, TechnicalAnalysis, WinProbability,
};
use tenderdesk_core::errors::{StageError, StageName};
use tenderdesk_core::pipeline::should_bid;

use crate::completion::{extract_json, CompletionClient, CompletionRequest};
use crate::stages::completion_failure;

pub const WIN_PROBABILITY_SCHEMA: &str = "{ winProbability: number, reasoning: string }";
pub const WIN_PROBABILITY_SYSTEM_PROMPT: &str =
    "You are an expert in RFP bid analysis and win probability estimation.";
pub const RECOMMENDATION_SYSTEM_PROMPT: &str =
    "You are a senior business development manager making RFP bid decisions.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub win_probability: WinProbability,
    pub recommendation: String,
    pub should_bid: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinProbabilityReply {
    win_probability: f64,
    #[serde(default)]
    reasoning: String,
}

/// Maps the three stage outputs to a win probability and a written
/// recommendation. The bid decision itself is computed, not asked for.
pub struct SynthesisStage {
    client: Arc<dyn CompletionClient>,
}

impl SynthesisStage {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn run(
        &self,
        sales: &SalesSummary,
        technical: &TechnicalAnalysis,
        pricing: &PricingStrategy,
    ) -> Result<SynthesisOutcome, StageError> {
        let reply: WinProbabilityReply = extract_json(
            self.client.as_ref(),
            &win_probability_prompt(sales, technical, pricing),
            WIN_PROBABILITY_SCHEMA,
            Some(WIN_PROBABILITY_SYSTEM_PROMPT),
        )
        .await
        .map_err(|error| completion_failure(StageName::Synthesis, error))?;

        let win_probability =
            WinProbability { score: clamp_score(reply.win_probability), reasoning: reply.reasoning };
        let bid = should_bid(win_probability.score, technical.compatible, pricing.risk_level);

        let request = CompletionRequest::new(recommendation_prompt(
            win_probability.score,
            technical,
            pricing,
            bid,
        ))
        .with_system_prompt(RECOMMENDATION_SYSTEM_PROMPT)
        .with_temperature(0.6)
        .with_max_tokens(300);
        let recommendation = self
            .client
            .complete(&request)
            .await
            .map_err(|error| completion_failure(StageName::Synthesis, error))?;

        Ok(SynthesisOutcome {
            win_probability,
            recommendation: recommendation.content.trim().to_string(),
            should_bid: bid,
        })
    }
}

pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

pub fn win_probability_prompt(
    sales: &SalesSummary,
    technical: &TechnicalAnalysis,
    pricing: &PricingStrategy,
) -> String {
    let selected = &technical.selected_product;
    let market = &pricing.competitive_analysis;

    format!(
        "Calculate the win probability (0-100%) for this RFP bid based on the following factors:\n\n\
         Technical Match:\n\
         - Product Match Score: {score}%\n\
         - Compatible: {compatible}\n\
         - Match Strengths: {strengths}\n\
         - Match Gaps: {gaps}\n\n\
         Pricing:\n\
         - Our Price: ₹{price}\n\
         - Margin: {margin}%\n\
         - Risk Level: {risk}\n\
         - Market Position: {position}\n\
         - Estimated Market Avg: ₹{market_avg}\n\n\
         Requirements:\n\
         - Testing Capabilities: {tests} tests required\n\
         - Certifications: {certifications}\n\n\
         Provide your response in JSON format:\n\
         {{\"winProbability\": <number 0-100>, \"reasoning\": \"<2-3 sentence explanation>\"}}",
        score = technical.product_match_score,
        compatible = if technical.compatible { "Yes" } else { "No" },
        strengths = joined_or_none(&selected.strengths),
        gaps = joined_or_none(&selected.gaps),
        price = money(pricing.total_value),
        margin = pricing.margin_pct,
        risk = pricing.risk_level.as_str(),
        position = market.our_position.as_str(),
        market_avg = money(market.market_price_avg),
        tests = sales.testing_required.len(),
        certifications = sales.certifications.join(", "),
    )
}

pub fn recommendation_prompt(
    win_probability: u8,
    technical: &TechnicalAnalysis,
    pricing: &PricingStrategy,
    should_bid: bool,
) -> String {
    format!(
        "Based on this RFP analysis, provide a clear recommendation on whether we should bid.\n\n\
         Win Probability: {win_probability}%\n\
         Product Match: {score}%\n\
         Compatible: {compatible}\n\
         Pricing Risk: {risk}\n\
         Market Position: {position}\n\n\
         Decision: {decision}\n\n\
         Provide a 3-4 sentence recommendation with key reasons.",
        score = technical.product_match_score,
        compatible = technical.compatible,
        risk = pricing.risk_level.as_str(),
        position = pricing.competitive_analysis.our_position.as_str(),
        decision = if should_bid { "RECOMMEND BIDDING" } else { "NOT RECOMMENDED" },
    )
}

fn joined_or_none(values: &[String]) -> String {
    if values.is_empty() {
        "None".to_string()
    } else {
        values.join(", ")
    }
}

fn money(value: Decimal) -> String {
    value.round_dp(0).to_string()
}
