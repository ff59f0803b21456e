pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod pipeline;
pub mod pricing;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use catalog::{Catalog, InMemoryCatalog};
pub use domain::analysis::{
    BidAnalysis, BidResponse, ConsolidatedResponse, ExtractedSpecs, PricingStrategy,
    SalesSummary, StageStatus, TechnicalAnalysis,
};
pub use domain::product::{Product, ProductSku};
pub use domain::tender::{TenderId, TenderPatch, TenderRecord, TenderStatus};
pub use errors::{
    ApplicationError, DomainError, InterfaceError, PipelineError, StageError, StageFailure,
    StageName,
};
pub use extraction::SpecExtractor;
pub use pipeline::{PipelineEngine, PipelineState};
pub use pricing::{DeterministicPricingEngine, PricingEngine, PricingInput, PricingInputError};
