pub mod consolidate;
pub mod engine;
pub mod states;

pub use consolidate::{consolidate, should_bid, BID_THRESHOLD};
pub use engine::{BidPipeline, PipelineDefinition, PipelineEngine, PipelineTransitionError};
pub use states::{PipelineAction, PipelineContext, PipelineEvent, PipelineState, TransitionOutcome};
