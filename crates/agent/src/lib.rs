//! Agent runtime for tender bid analysis.
//!
//! This crate wires the completion service into the analysis pipeline:
//! - `completion` - the provider-neutral client trait and JSON extraction
//! - `providers` - OpenAI, Anthropic and Ollama over HTTP
//! - `resilient` - timeout, retry with backoff and cancellation
//! - `extraction` - regex tier with a per-field completion fallback
//! - `stages` - sales, technical, pricing and win-probability synthesis
//! - `orchestrator` - the master stage that runs them in order
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It NEVER decides prices, product
//! selection or the bid decision. Those are deterministic decisions made by
//! the core crate; the completion service only summarises text and scores
//! win probability.

pub mod completion;
pub mod extraction;
pub mod orchestrator;
pub mod providers;
pub mod resilient;
pub mod stages;

pub use completion::{
    extract_json, Completion, CompletionClient, CompletionError, CompletionRequest,
    ScriptedCompletionClient, UnconfiguredClient,
};
pub use orchestrator::{Orchestrator, RunSettings};
pub use providers::{client_from_config, HttpCompletionClient};
pub use resilient::{ResilientClient, RetryPolicy};
