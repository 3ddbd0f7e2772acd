use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use cartbot_core::config::{AppConfig, ConfigError, LoadOptions};
use cartbot_core::domain::order::OrderPolicy;
use cartbot_db::repositories::SqlOrderRepository;
use cartbot_db::{connect_with_settings, migrations, DbPool};
use cartbot_dialog::{HttpNluClient, IntentDispatcher, NluClient, NluError, SessionRegistry};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: Arc<IntentDispatcher>,
    pub nlu: Option<Arc<dyn NluClient>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("nlu client initialization failed: {0}")]
    Nlu(#[source] NluError),
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

    let registry = SessionRegistry::new(OrderPolicy {
        require_active_order: config.ordering.require_active_order,
    });
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
    let dispatcher = Arc::new(IntentDispatcher::new(registry, orders));

    let nlu: Option<Arc<dyn NluClient>> = if config.nlu.enabled() {
        Some(Arc::new(HttpNluClient::from_config(&config.nlu).map_err(BootstrapError::Nlu)?))
    } else {
        None
    };

    Ok(Application { config, db_pool, dispatcher, nlu })
}
