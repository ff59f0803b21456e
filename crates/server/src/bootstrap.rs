use std::sync::Arc;

use tenderdesk_agent::{client_from_config, CompletionError, Orchestrator};
use tenderdesk_core::catalog::Catalog;
use tenderdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use tenderdesk_db::{
    connect_with_settings, load_catalog, migrations, DbPool, RepositoryError,
    SqlAuditEventRepository, SqlProductRepository, SqlTenderRepository,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ApiState;
use crate::audit::PersistingAuditSink;
use crate::render;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
    pub audit_writer: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog load failed: {0}")]
    Catalog(#[source] RepositoryError),
    #[error("completion client setup failed: {0}")]
    Completion(#[source] CompletionError),
    #[error("template setup failed: {0}")]
    Templates(#[source] tera::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let products = SqlProductRepository::new(db_pool.clone());
    let catalog = load_catalog(&products, config.pipeline.compatibility_threshold)
        .await
        .map_err(BootstrapError::Catalog)?;
    if catalog.is_empty() {
        warn!(
            event_name = "system.bootstrap.catalog_empty",
            correlation_id = "bootstrap",
            "product catalog is empty; run `tenderdesk seed` before analysing tenders"
        );
    } else {
        info!(
            event_name = "system.bootstrap.catalog_loaded",
            correlation_id = "bootstrap",
            products = catalog.products().len(),
            "product catalog loaded"
        );
    }

    let client = client_from_config(&config.llm).map_err(BootstrapError::Completion)?;
    if !client.is_configured() {
        warn!(
            event_name = "system.bootstrap.completion_unconfigured",
            correlation_id = "bootstrap",
            provider = config.llm.provider.as_str(),
            "completion provider has no credentials; analyses will fail at the sales stage"
        );
    }

    let (audit, audit_writer) =
        PersistingAuditSink::spawn(Arc::new(SqlAuditEventRepository::new(db_pool.clone())));
    let audit = Arc::new(audit);
    let orchestrator = Orchestrator::from_config(client, Arc::new(catalog), &config.pipeline)
        .with_audit_sink(audit.clone());

    let api = ApiState {
        tenders: Arc::new(SqlTenderRepository::new(db_pool.clone())),
        orchestrator: Arc::new(orchestrator),
        audit,
        templates: render::templates().map_err(BootstrapError::Templates)?,
    };

    Ok(Application { config, db_pool, api, audit_writer })
}
