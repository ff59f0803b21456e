use std::sync::Arc;

use rust_decimal::Decimal;
use tenderdesk_core::domain::analysis::{SalesSummary, StageStatus};
use tenderdesk_core::domain::tender::TenderId;
use tenderdesk_core::errors::{StageError, StageFailure, StageName};
use tracing::info;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::extraction::{truncate_chars, CompletionFallback, TieredExtractor};
use crate::stages::completion_failure;

pub const SCOPE_SYSTEM_PROMPT: &str =
    "You are an expert in analyzing electrical cables and wires RFP documents.";
pub const DEFAULT_SCOPE_CHAR_LIMIT: usize = 8000;
pub const DEFAULT_QUANTITY_CHAR_LIMIT: usize = 4000;
pub const QUANTITY_NOT_SPECIFIED: &str = "Not specified";
pub const DEFAULT_TIMELINE: &str = "As per RFP requirements";

pub fn default_tests() -> Vec<String> {
    vec!["Routine Tests".to_string(), "Type Tests".to_string()]
}

pub fn default_certifications() -> Vec<String> {
    vec!["BIS Certification".to_string(), "ISO 9001:2015".to_string()]
}

/// Sales discovery: what is being bought, how much of it, and on what terms.
pub struct SalesStage {
    client: Arc<dyn CompletionClient>,
    extractor: TieredExtractor,
    scope_char_limit: usize,
}

impl SalesStage {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self::with_limits(client, DEFAULT_SCOPE_CHAR_LIMIT, DEFAULT_QUANTITY_CHAR_LIMIT)
    }

    pub fn with_limits(
        client: Arc<dyn CompletionClient>,
        scope_char_limit: usize,
        quantity_char_limit: usize,
    ) -> Self {
        let fallback = Arc::new(CompletionFallback::new(client.clone(), quantity_char_limit));
        Self { client, extractor: TieredExtractor::new(fallback), scope_char_limit }
    }

    /// Replaces the default quantity-only fallback tier.
    pub fn with_extractor(mut self, extractor: TieredExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub async fn run(&self, tender_id: &TenderId, text: &str) -> Result<SalesSummary, StageError> {
        if text.trim().is_empty() {
            return Err(StageError::new(StageName::Sales, StageFailure::MissingInput));
        }

        let request = CompletionRequest::new(scope_prompt(truncate_chars(text, self.scope_char_limit)))
            .with_system_prompt(SCOPE_SYSTEM_PROMPT)
            .with_temperature(0.3)
            .with_max_tokens(200);
        let scope = self
            .client
            .complete(&request)
            .await
            .map_err(|error| completion_failure(StageName::Sales, error))?;

        let extraction = self
            .extractor
            .extract(text)
            .await
            .map_err(|error| completion_failure(StageName::Sales, error))?;
        let report = extraction.report;
        let specs = report.specs;

        let quantity = specs
            .quantity
            .map(|meters| format!("{} meters", group_thousands(meters)))
            .unwrap_or_else(|| QUANTITY_NOT_SPECIFIED.to_string());
        let estimated_value = match (specs.quantity, specs.voltage.as_deref()) {
            (Some(meters), Some(voltage)) => Some(Decimal::from(meters) * estimate_per_meter(voltage)),
            _ => None,
        };

        info!(
            event_name = "pipeline.stage.sales.extracted",
            tender_id = %tender_id,
            quantity = %quantity,
            recovered_fields = extraction.recovered.len(),
            "sales discovery extracted tender terms"
        );

        Ok(SalesSummary {
            scope_of_supply: scope.content.trim().to_string(),
            quantity,
            testing_required: non_empty_or(report.testing_requirements, default_tests),
            certifications: non_empty_or(report.certifications, default_certifications),
            delivery_timeline: report
                .delivery_timeline
                .unwrap_or_else(|| DEFAULT_TIMELINE.to_string()),
            estimated_value,
            extracted_specs: specs,
            status: StageStatus::Completed,
        })
    }
}

pub fn scope_prompt(excerpt: &str) -> String {
    format!(
        "Analyze this RFP/tender document and provide a concise scope of supply description (1-2 sentences).\n\nRFP Text:\n{excerpt}\n\nProvide only the scope of supply description, no other text."
    )
}

/// Rough budget per meter used to estimate a tender's value from its voltage.
pub fn estimate_per_meter(voltage: &str) -> Decimal {
    let per_meter = if voltage.contains("33") {
        3500
    } else if voltage.contains("22") {
        2000
    } else if voltage.contains("11") {
        1200
    } else {
        500
    };
    Decimal::from(per_meter)
}

fn non_empty_or(values: Vec<String>, default: fn() -> Vec<String>) -> Vec<String> {
    if values.is_empty() {
        default()
    } else {
        values
    }
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
