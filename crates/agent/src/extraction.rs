//! Two-tier specification extraction: patterns first, then a narrow
//! completion question per field the patterns missed.

use std::sync::Arc;

use async_trait::async_trait;
use tenderdesk_core::domain::analysis::ExtractedSpecs;
use tenderdesk_core::extraction::{ExtractionReport, SpecExtractor, SpecField};
use tracing::debug;

use crate::completion::{CompletionClient, CompletionError, CompletionRequest};

pub const FALLBACK_TEMPERATURE: f32 = 0.1;
pub const FALLBACK_MAX_TOKENS: u32 = 50;

#[async_trait]
pub trait FieldFallback: Send + Sync {
    /// Raw answer for one field; interpretation is left to [`SpecField::apply`].
    async fn ask(&self, field: SpecField, text: &str) -> Result<String, CompletionError>;
}

pub struct CompletionFallback {
    client: Arc<dyn CompletionClient>,
    char_limit: usize,
}

impl CompletionFallback {
    pub fn new(client: Arc<dyn CompletionClient>, char_limit: usize) -> Self {
        Self { client, char_limit }
    }
}

#[async_trait]
impl FieldFallback for CompletionFallback {
    async fn ask(&self, field: SpecField, text: &str) -> Result<String, CompletionError> {
        let excerpt = truncate_chars(text, self.char_limit);
        let request = CompletionRequest::new(fallback_prompt(field, excerpt))
            .with_temperature(FALLBACK_TEMPERATURE)
            .with_max_tokens(FALLBACK_MAX_TOKENS);
        let completion = self.client.complete(&request).await?;
        Ok(completion.content.trim().to_string())
    }
}

pub fn fallback_prompt(field: SpecField, excerpt: &str) -> String {
    match field {
        SpecField::Quantity => format!(
            "Extract the total quantity in meters from this RFP. Return only the number, or \"Not specified\" if not found:\n\n{excerpt}"
        ),
        other => format!(
            "Extract the cable {} from this RFP. Respond with just the value, or \"Not specified\" if not found:\n\n{excerpt}",
            other.as_str()
        ),
    }
}

/// First `limit` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TieredExtraction {
    pub report: ExtractionReport,
    /// Fields the fallback filled in.
    pub recovered: Vec<SpecField>,
    /// Raw fallback answers that did not parse, keyed by field.
    pub unresolved: Vec<(SpecField, String)>,
}

impl TieredExtraction {
    pub fn specs(&self) -> &ExtractedSpecs {
        &self.report.specs
    }
}

pub struct TieredExtractor {
    patterns: SpecExtractor,
    fallback: Arc<dyn FieldFallback>,
    escalate: Vec<SpecField>,
}

impl TieredExtractor {
    /// Escalates only quantity by default.
    pub fn new(fallback: Arc<dyn FieldFallback>) -> Self {
        Self { patterns: SpecExtractor, fallback, escalate: vec![SpecField::Quantity] }
    }

    pub fn escalating(mut self, fields: Vec<SpecField>) -> Self {
        self.escalate = fields;
        self
    }

    pub async fn extract(&self, text: &str) -> Result<TieredExtraction, CompletionError> {
        let mut extraction =
            TieredExtraction { report: self.patterns.extract(text), ..TieredExtraction::default() };

        for field in &self.escalate {
            if field.is_present(&extraction.report.specs) {
                continue;
            }
            let answer = self.fallback.ask(*field, text).await?;
            if field.apply(&mut extraction.report.specs, &answer) {
                debug!(event_name = "extraction.fallback.recovered", field = field.as_str());
                extraction.recovered.push(*field);
            } else {
                debug!(event_name = "extraction.fallback.absent", field = field.as_str());
                extraction.unresolved.push((*field, answer));
            }
        }

        Ok(extraction)
    }
}
