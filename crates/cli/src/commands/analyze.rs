use std::fs;
use std::path::Path;
use std::sync::Arc;

use tenderdesk_agent::{client_from_config, Orchestrator};
use tenderdesk_core::domain::tender::TenderId;
use tenderdesk_db::{load_catalog, SqlProductRepository};
use tracing::info;

use crate::commands::{
    load_config, migrated_pool, runtime, CommandResult, Failure, EXIT_COMPLETION_SETUP,
    EXIT_INPUT, EXIT_MIGRATION, EXIT_PIPELINE,
};

/// Runs the full pipeline over a tender text file against the configured
/// provider and the persisted catalog. Nothing is written back.
pub fn run(file: &Path, tender_id: Option<String>) -> CommandResult {
    let text = match read_tender_text(file) {
        Ok(text) => text,
        Err(failure) => return CommandResult::from_failure("analyze", failure),
    };
    let config = match load_config("analyze") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("analyze") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let tender_id = tender_id.map(TenderId).unwrap_or_else(TenderId::generate);
    let correlation_id = format!("cli-{tender_id}");

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let products = SqlProductRepository::new(pool.clone());
        let catalog = load_catalog(&products, config.pipeline.compatibility_threshold)
            .await
            .map_err(|error| ("catalog_load", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;

        let client = client_from_config(&config.llm)
            .map_err(|error| ("completion_setup", error.to_string(), EXIT_COMPLETION_SETUP))?;
        let orchestrator = Orchestrator::from_config(client, Arc::new(catalog), &config.pipeline);

        info!(
            event_name = "cli.analyze.start",
            tender_id = %tender_id,
            correlation_id = %correlation_id,
            provider = config.llm.provider.as_str(),
            "running bid analysis from file"
        );
        let analysis = orchestrator
            .run(&tender_id, &text, None, &correlation_id)
            .await
            .map_err(|error| ("pipeline", error.to_string(), EXIT_PIPELINE))?;

        serde_json::to_value(&analysis)
            .map_err(|error| ("serialization", error.to_string(), EXIT_PIPELINE))
    });

    match result {
        Ok(analysis) => CommandResult::success_with_data(
            "analyze",
            format!("analysis completed for {tender_id}"),
            Some(analysis),
        ),
        Err(failure) => CommandResult::from_failure("analyze", failure),
    }
}

fn read_tender_text(file: &Path) -> Result<String, Failure> {
    let text = fs::read_to_string(file).map_err(|error| {
        ("input", format!("could not read `{}`: {error}", file.display()), EXIT_INPUT)
    })?;
    if text.trim().is_empty() {
        return Err(("input", format!("`{}` is empty", file.display()), EXIT_INPUT));
    }
    Ok(text)
}
