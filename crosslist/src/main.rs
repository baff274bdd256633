use anyhow::Context;
use crosslist::api::ApiServer;
use crosslist::config::AppConfig;
use crosslist::database;
use crosslist::logging;
use crosslist::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    let (logging_config, _log_guard) =
        logging::init_logging(&config.log_dir).context("failed to initialize logging")?;

    let pool = database::init_pool(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    database::run_migrations(&pool).await?;

    let sync_interval = config.sync_interval;
    let server_config = config.server.clone();
    let services = ServiceContainer::new(config, pool)?;
    services.initialize().await?;

    let shutdown = services.cancellation_token();
    logging_config.start_retention_cleanup(shutdown.clone());
    if let Some(interval) = sync_interval {
        services.start_sync_scheduler(interval);
    }

    let state = services.app_state().with_logging_config(logging_config);
    let server = ApiServer::new(server_config, state).with_cancel_token(shutdown.clone());

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    tracing::info!("crosslist {} started", env!("CARGO_PKG_VERSION"));
    server.run().await?;
    services.shutdown().await;
    Ok(())
}
