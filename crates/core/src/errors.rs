use thiserror::Error;

use crate::{
    domain::tender::TenderStatus, pipeline::PipelineTransitionError, pricing::PricingInputError,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid tender transition from {from:?} to {to:?}")]
    InvalidTenderTransition { from: TenderStatus, to: TenderStatus },
    #[error(transparent)]
    PipelineTransition(#[from] PipelineTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Sales,
    Technical,
    Pricing,
    Synthesis,
}

impl StageName {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sales => "Sales Agent",
            Self::Technical => "Technical Agent",
            Self::Pricing => "Pricing Agent",
            Self::Synthesis => "Win-Probability Synthesis",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Technical => "technical",
            Self::Pricing => "pricing",
            Self::Synthesis => "synthesis",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageFailure {
    #[error("No RFP content available to analyze")]
    MissingInput,
    #[error(
        "No suitable product found for this RFP (best match score {best_score}, threshold {threshold})"
    )]
    NoSuitableProduct { best_score: u8, threshold: u8 },
    #[error(transparent)]
    PricingInput(#[from] PricingInputError),
    #[error("completion service unavailable: {0}")]
    CompletionUnavailable(String),
    #[error("completion failed: {0}")]
    Completion(String),
    #[error("run cancelled")]
    Cancelled,
}

/// A fatal failure of one pipeline stage.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{} failed: {failure}", stage.label())]
pub struct StageError {
    pub stage: StageName,
    pub failure: StageFailure,
}

impl StageError {
    pub fn new(stage: StageName, failure: impl Into<StageFailure>) -> Self {
        Self { stage, failure: failure.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Transition(#[from] PipelineTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("tender not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("upstream failure: {message}")]
    Upstream { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested tender does not exist.",
            Self::Upstream { .. } => "The bid analysis could not be completed.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Upstream { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Upstream { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(_) => Self::BadRequest {
                message: "domain validation failed".to_owned(),
                correlation_id: unassigned(),
            },
            ApplicationError::Pipeline(PipelineError::Stage(error)) => match &error.failure {
                StageFailure::MissingInput
                | StageFailure::NoSuitableProduct { .. }
                | StageFailure::PricingInput(_) => {
                    Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
                }
                StageFailure::CompletionUnavailable(_)
                | StageFailure::Completion(_)
                | StageFailure::Cancelled => {
                    Self::Upstream { message: error.to_string(), correlation_id: unassigned() }
                }
            },
            ApplicationError::Pipeline(PipelineError::Transition(error)) => {
                Self::Internal { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::NotFound(id) => Self::NotFound {
                message: format!("tender not found: {id}"),
                correlation_id: unassigned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ApplicationError, DomainError, InterfaceError, PipelineError, StageError, StageFailure,
        StageName,
    };

    #[test]
    fn stage_error_is_qualified_by_stage_label() {
        let error = StageError::new(
            StageName::Technical,
            StageFailure::NoSuitableProduct { best_score: 42, threshold: 70 },
        );

        assert_eq!(
            error.to_string(),
            "Technical Agent failed: No suitable product found for this RFP (best match score 42, threshold 70)"
        );
    }

    #[test]
    fn missing_input_message_is_stable() {
        let error = StageError::new(StageName::Sales, StageFailure::MissingInput);
        assert_eq!(error.to_string(), "Sales Agent failed: No RFP content available to analyze");
    }

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "missing required field".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn completion_stage_failure_maps_to_upstream_with_stage_message() {
        let interface = ApplicationError::from(PipelineError::from(StageError::new(
            StageName::Synthesis,
            StageFailure::CompletionUnavailable("timed out after 3 attempts".to_owned()),
        )))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Upstream { .. }));
        assert!(interface.message().starts_with("Win-Probability Synthesis failed:"));
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn not_found_and_configuration_errors_map_to_their_classes() {
        let missing = ApplicationError::NotFound("TND-1".to_owned()).into_interface("req-4");
        assert!(matches!(missing, InterfaceError::NotFound { .. }));

        let config =
            ApplicationError::Configuration("invalid api key".to_owned()).into_interface("req-5");
        assert_eq!(config.user_message(), "An unexpected internal error occurred.");
    }
}
