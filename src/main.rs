//! consult-ledger server entry point.
//!
//! Loads configuration, selects the store and starts the Axum HTTP server.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use consult_ledger::app_state::AppState;
use consult_ledger::build_app;
use consult_ledger::config::{LedgerConfig, LogFormat};
use consult_ledger::notify::{LogNotifier, NotificationSink};
use consult_ledger::persistence::Store;
use consult_ledger::persistence::memory::MemoryStore;
use consult_ledger::persistence::postgres::{PostgresNotifier, PostgresStore};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn open_store(
    config: &LedgerConfig,
) -> anyhow::Result<(Arc<dyn Store>, Arc<dyn NotificationSink>)> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, using the in-memory store");
        return Ok((Arc::new(MemoryStore::new()), Arc::new(LogNotifier)));
    }

    let store = PostgresStore::connect(config).await?;
    if config.run_migrations {
        store.migrate().await?;
        tracing::info!("database migrations applied");
    }
    let notifier = PostgresNotifier::new(store.pool().clone());
    Ok((Arc::new(store), Arc::new(notifier)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = LedgerConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        commission_rate = %config.commission_rate,
        currency = %config.currency,
        "starting consult-ledger"
    );

    // Build persistence and service layers
    let (store, notifier) = open_store(&config).await?;
    let app_state = AppState::new(store, notifier, &config);

    // Start server
    let app = build_app(app_state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
