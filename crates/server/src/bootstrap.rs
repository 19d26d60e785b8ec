use std::sync::Arc;

use hrflow_core::config::{AppConfig, ConfigError};
use hrflow_core::notify::NotifyError;
use hrflow_db::repositories::{SqlAuditRepository, SqlEmployeeDirectory, SqlRequestRepository};
use hrflow_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::notifier;
use crate::service::WorkflowService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: WorkflowService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("notifier setup failed: {0}")]
    Notifier(#[from] NotifyError),
}

#[cfg(test)]
pub async fn bootstrap(
    options: hrflow_core::config::LoadOptions,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let notifier = notifier::from_config(&config.notifier)?;
    info!(
        event_name = "system.bootstrap.notifier_ready",
        correlation_id = "bootstrap",
        notifier_kind = ?config.notifier.kind,
        "status notifier configured"
    );

    let service = WorkflowService::new(
        Arc::new(SqlRequestRepository::new(db_pool.clone())),
        Arc::new(SqlEmployeeDirectory::new(db_pool.clone())),
        Arc::new(SqlAuditRepository::new(db_pool.clone())),
        notifier,
    );

    Ok(Application { config, db_pool, service })
}
