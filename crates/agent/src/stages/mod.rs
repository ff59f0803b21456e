//! The analytical stages. Each returns a typed, completed record or a
//! stage-qualified error; none of them retries on its own.

pub mod pricing;
pub mod sales;
pub mod synthesis;
pub mod technical;

use tenderdesk_core::errors::{StageError, StageFailure, StageName};

use crate::completion::CompletionError;

pub use pricing::PricingStage;
pub use sales::SalesStage;
pub use synthesis::{SynthesisOutcome, SynthesisStage};
pub use technical::TechnicalStage;

pub(crate) fn completion_failure(stage: StageName, error: CompletionError) -> StageError {
    let failure = match error {
        CompletionError::Cancelled => StageFailure::Cancelled,
        error if error.is_unavailable() => StageFailure::CompletionUnavailable(error.to_string()),
        error => StageFailure::Completion(error.to_string()),
    };
    StageError::new(stage, failure)
}
