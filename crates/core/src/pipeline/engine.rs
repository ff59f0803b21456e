use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::analysis::StageStatus;
use crate::errors::StageName;
use crate::pipeline::states::{
    PipelineAction, PipelineContext, PipelineEvent, PipelineState, TransitionOutcome,
};

pub trait PipelineDefinition {
    fn initial_state(&self) -> PipelineState;
    fn transition(
        &self,
        current: &PipelineState,
        event: &PipelineEvent,
        context: &PipelineContext,
    ) -> Result<TransitionOutcome, PipelineTransitionError>;
}

/// Sales, technical, pricing, synthesis; strictly in that order.
#[derive(Clone, Debug, Default)]
pub struct BidPipeline;

impl PipelineDefinition for BidPipeline {
    fn initial_state(&self) -> PipelineState {
        PipelineState::SalesPending
    }

    fn transition(
        &self,
        current: &PipelineState,
        event: &PipelineEvent,
        context: &PipelineContext,
    ) -> Result<TransitionOutcome, PipelineTransitionError> {
        transition_bid(current, event, context)
    }
}

pub struct PipelineEngine<D> {
    definition: D,
}

impl<D> PipelineEngine<D>
where
    D: PipelineDefinition,
{
    pub fn new(definition: D) -> Self {
        Self { definition }
    }

    pub fn initial_state(&self) -> PipelineState {
        self.definition.initial_state()
    }

    pub fn apply(
        &self,
        current: &PipelineState,
        event: &PipelineEvent,
        context: &PipelineContext,
    ) -> Result<TransitionOutcome, PipelineTransitionError> {
        self.definition.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &PipelineState,
        event: &PipelineEvent,
        context: &PipelineContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, PipelineTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "pipeline.transition_applied",
                        AuditCategory::Pipeline,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "pipeline.transition_rejected",
                        AuditCategory::Pipeline,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for PipelineEngine<BidPipeline> {
    fn default() -> Self {
        Self::new(BidPipeline)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineTransitionError {
    #[error("{} reported an output that is not completed", stage.label())]
    IncompleteStageOutput { stage: StageName },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: PipelineState, event: PipelineEvent },
}

fn transition_bid(
    current: &PipelineState,
    event: &PipelineEvent,
    context: &PipelineContext,
) -> Result<TransitionOutcome, PipelineTransitionError> {
    use PipelineAction::{Abort, Consolidate, RunPricing, RunSynthesis, RunTechnical};
    use PipelineEvent::{StageCompleted, StageFailed};
    use PipelineState::{
        Completed, Failed, PricingPending, SalesPending, SynthesisPending, TechnicalPending,
    };

    let invalid = || PipelineTransitionError::InvalidTransition { state: *current, event: *event };

    if current.awaiting() != Some(stage_of(event)) {
        return Err(invalid());
    }

    let (to, actions) = match (current, event) {
        (_, StageFailed(_)) => (Failed, vec![Abort]),
        (_, StageCompleted(stage)) if context.reported_status != StageStatus::Completed => {
            return Err(PipelineTransitionError::IncompleteStageOutput { stage: *stage });
        }
        (SalesPending, StageCompleted(_)) => (TechnicalPending, vec![RunTechnical]),
        (TechnicalPending, StageCompleted(_)) => (PricingPending, vec![RunPricing]),
        (PricingPending, StageCompleted(_)) => (SynthesisPending, vec![RunSynthesis]),
        (SynthesisPending, StageCompleted(_)) => (Completed, vec![Consolidate]),
        _ => return Err(invalid()),
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}

fn stage_of(event: &PipelineEvent) -> StageName {
    match event {
        PipelineEvent::StageCompleted(stage) | PipelineEvent::StageFailed(stage) => *stage,
    }
}
