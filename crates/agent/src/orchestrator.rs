//! The master stage: sales, technical, pricing and synthesis in a fixed
//! sequence, stopping at the first failure.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tenderdesk_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink,
};
use tenderdesk_core::catalog::Catalog;
use tenderdesk_core::config::PipelineConfig;
use tenderdesk_core::domain::analysis::{BidAnalysis, BidResponse, StageStatus};
use tenderdesk_core::domain::tender::TenderId;
use tenderdesk_core::errors::{PipelineError, StageError, StageFailure, StageName};
use tenderdesk_core::pipeline::{
    consolidate, BidPipeline, PipelineContext, PipelineEngine, PipelineEvent, PipelineState,
};
use tenderdesk_core::pricing::{DeterministicPricingEngine, PricingEngine, VolumeDiscountSchedule};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::completion::CompletionClient;
use crate::stages::{PricingStage, SalesStage, SynthesisStage, TechnicalStage};

const ACTOR: &str = "orchestrator";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSettings {
    /// Meters priced when neither tier found a quantity.
    pub default_quantity: u32,
    pub services: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            default_quantity: 1000,
            services: vec!["Documentation".to_string(), "Delivery".to_string()],
        }
    }
}

pub struct Orchestrator {
    sales: SalesStage,
    technical: TechnicalStage,
    pricing: PricingStage,
    synthesis: SynthesisStage,
    engine: PipelineEngine<BidPipeline>,
    audit: Arc<dyn AuditSink>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        catalog: Arc<dyn Catalog>,
        pricing_engine: Arc<dyn PricingEngine>,
        settings: RunSettings,
    ) -> Self {
        Self {
            sales: SalesStage::new(client.clone()),
            technical: TechnicalStage::new(catalog.clone()),
            pricing: PricingStage::new(catalog, pricing_engine),
            synthesis: SynthesisStage::new(client),
            engine: PipelineEngine::default(),
            audit: Arc::new(NoopAuditSink),
            settings,
        }
    }

    /// Wires the stages from the `pipeline` config section.
    pub fn from_config(
        client: Arc<dyn CompletionClient>,
        catalog: Arc<dyn Catalog>,
        config: &PipelineConfig,
    ) -> Self {
        let mut engine = DeterministicPricingEngine::new(config.margins.clone());
        if config.volume_discounts {
            engine = engine.with_volume_discounts(VolumeDiscountSchedule::default());
        }
        let settings = RunSettings {
            default_quantity: config.default_quantity,
            services: config.default_services.clone(),
        };

        let mut orchestrator = Self::new(client.clone(), catalog, Arc::new(engine), settings);
        orchestrator.sales =
            SalesStage::with_limits(client, config.scope_char_limit, config.quantity_char_limit);
        orchestrator
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_sales_stage(mut self, sales: SalesStage) -> Self {
        self.sales = sales;
        self
    }

    /// `estimated_value` is the tender's own estimate; when absent the sales
    /// stage's heuristic estimate drives the price-deviation risk factor.
    pub async fn run(
        &self,
        tender_id: &TenderId,
        text: &str,
        estimated_value: Option<Decimal>,
        correlation_id: &str,
    ) -> Result<BidAnalysis, PipelineError> {
        self.run_cancellable(
            tender_id,
            text,
            estimated_value,
            correlation_id,
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn run_cancellable(
        &self,
        tender_id: &TenderId,
        text: &str,
        estimated_value: Option<Decimal>,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BidAnalysis, PipelineError> {
        let audit = AuditContext::new(Some(tender_id.clone()), correlation_id, ACTOR);
        let mut run = Run { orchestrator: self, audit: &audit, state: self.engine.initial_state() };

        info!(
            event_name = "pipeline.run.start",
            tender_id = %tender_id,
            correlation_id,
            "bid analysis started"
        );

        let sales = run
            .stage(StageName::Sales, guarded(StageName::Sales, cancel, self.sales.run(tender_id, text)))
            .await?;
        run.complete(StageName::Sales, sales.status)?;

        let technical = run
            .stage(
                StageName::Technical,
                guarded(StageName::Technical, cancel, async {
                    self.technical.run(
                        &sales.extracted_specs,
                        &sales.testing_required,
                        &sales.certifications,
                    )
                }),
            )
            .await?;
        run.complete(StageName::Technical, technical.status)?;

        let quantity = sales
            .extracted_specs
            .quantity
            .filter(|meters| *meters > 0)
            .unwrap_or(self.settings.default_quantity);
        let estimated_value = estimated_value.or(sales.estimated_value);
        let pricing = run
            .stage(
                StageName::Pricing,
                guarded(StageName::Pricing, cancel, async {
                    self.pricing.run(
                        &technical.selected_product,
                        quantity,
                        &sales.testing_required,
                        &self.settings.services,
                        estimated_value,
                    )
                }),
            )
            .await?;
        run.complete(StageName::Pricing, pricing.status)?;

        let synthesis = run
            .stage(
                StageName::Synthesis,
                guarded(
                    StageName::Synthesis,
                    cancel,
                    self.synthesis.run(&sales, &technical, &pricing),
                ),
            )
            .await?;
        run.complete(StageName::Synthesis, StageStatus::Completed)?;

        let bid = BidResponse {
            win_probability: synthesis.win_probability.score,
            reasoning: synthesis.win_probability.reasoning,
            recommendation: synthesis.recommendation,
            should_bid: synthesis.should_bid,
            consolidated_response: consolidate(&sales, &technical, &pricing),
            generated_at: Utc::now(),
        };

        self.audit.emit(
            AuditEvent::from_context(
                &audit,
                "pipeline.run.completed",
                AuditCategory::Pipeline,
                AuditOutcome::Success,
            )
            .with_metadata("win_probability", bid.win_probability.to_string())
            .with_metadata("should_bid", bid.should_bid.to_string())
            .with_metadata("grand_total", bid.consolidated_response.grand_total.to_string()),
        );
        info!(
            event_name = "pipeline.run.completed",
            tender_id = %tender_id,
            correlation_id,
            win_probability = bid.win_probability,
            should_bid = bid.should_bid,
            "bid analysis completed"
        );

        Ok(BidAnalysis { sales, technical, pricing, bid })
    }
}

/// Per-run bookkeeping: current pipeline state and audit context.
struct Run<'a> {
    orchestrator: &'a Orchestrator,
    audit: &'a AuditContext,
    state: PipelineState,
}

impl Run<'_> {
    async fn stage<T, F>(&mut self, stage: StageName, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, StageError>>,
    {
        match work.await {
            Ok(output) => Ok(output),
            Err(failure) => Err(self.fail(stage, PipelineError::Stage(failure))),
        }
    }

    fn complete(&mut self, stage: StageName, status: StageStatus) -> Result<(), PipelineError> {
        let transition = self.orchestrator.engine.apply_with_audit(
            &self.state,
            &PipelineEvent::StageCompleted(stage),
            &PipelineContext { reported_status: status },
            self.orchestrator.audit.as_ref(),
            self.audit,
        );
        let outcome = match transition {
            Ok(outcome) => outcome,
            Err(rejected) => return Err(self.fail(stage, PipelineError::Transition(rejected))),
        };
        self.state = outcome.to;

        info!(
            event_name = "pipeline.stage.completed",
            correlation_id = %self.audit.correlation_id,
            stage = stage.as_str(),
            next_state = ?self.state,
            "pipeline stage completed"
        );
        Ok(())
    }

    /// Moves the run to `Failed` and records why.
    fn fail(&mut self, stage: StageName, failure: PipelineError) -> PipelineError {
        let transition = self.orchestrator.engine.apply_with_audit(
            &self.state,
            &PipelineEvent::StageFailed(stage),
            &PipelineContext::default(),
            self.orchestrator.audit.as_ref(),
            self.audit,
        );
        if let Ok(outcome) = transition {
            self.state = outcome.to;
        }

        self.orchestrator.audit.emit(
            AuditEvent::from_context(
                self.audit,
                "pipeline.run.failed",
                AuditCategory::Pipeline,
                AuditOutcome::Failed,
            )
            .with_metadata("stage", stage.as_str())
            .with_metadata("error", failure.to_string()),
        );
        error!(
            event_name = "pipeline.run.failed",
            correlation_id = %self.audit.correlation_id,
            stage = stage.as_str(),
            error = %failure,
            "bid analysis failed"
        );

        failure
    }
}

async fn guarded<T, F>(
    stage: StageName,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, StageError>
where
    F: Future<Output = Result<T, StageError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::new(stage, StageFailure::Cancelled)),
        result = work => result,
    }
}
