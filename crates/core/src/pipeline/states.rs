use serde::{Deserialize, Serialize};

use crate::domain::analysis::StageStatus;
use crate::errors::StageName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    SalesPending,
    TechnicalPending,
    PricingPending,
    SynthesisPending,
    Completed,
    Failed,
}

impl PipelineState {
    /// The stage this state is waiting on; `None` once terminal.
    pub fn awaiting(&self) -> Option<StageName> {
        match self {
            Self::SalesPending => Some(StageName::Sales),
            Self::TechnicalPending => Some(StageName::Technical),
            Self::PricingPending => Some(StageName::Pricing),
            Self::SynthesisPending => Some(StageName::Synthesis),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.awaiting().is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    StageCompleted(StageName),
    StageFailed(StageName),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineAction {
    RunTechnical,
    RunPricing,
    RunSynthesis,
    Consolidate,
    Abort,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PipelineContext {
    /// Status carried by the output of the stage being reported.
    pub reported_status: StageStatus,
}

impl PipelineContext {
    pub fn completed() -> Self {
        Self { reported_status: StageStatus::Completed }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: PipelineState,
    pub to: PipelineState,
    pub event: PipelineEvent,
    pub actions: Vec<PipelineAction>,
}
