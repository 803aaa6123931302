use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use driver_client::DriverClient;
use threadwatch_common::Config;
use threadwatch_engine::{
    JsonFileStore, LogNotifier, Notifier, PatternTable, PollSettings, PollingOrchestrator,
    WebhookNotifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("threadwatch=info".parse()?))
        .init();

    info!("Threadwatch starting...");

    let config = Config::from_env();
    config.log_redacted();

    let targets = config.load_targets().context("Failed to load targets")?;
    info!(targets = targets.len(), "Loaded targets");

    let table = match &config.patterns_path {
        Some(path) => PatternTable::with_file(path).context("Failed to load UI patterns")?,
        None => PatternTable::builtin().context("Built-in UI patterns are invalid")?,
    };
    info!(patterns = table.len(), locales = ?table.locales(), "Pattern table ready");

    let driver = DriverClient::new(&config.driver_url, config.driver_token.as_deref())
        .context("Failed to build driver client")?;
    let store = JsonFileStore::new(config.state_path.clone());

    // Webhook if configured, otherwise log
    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => {
            info!("Webhook notifications enabled");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            info!("No THREADWATCH_WEBHOOK_URL set, logging notifications");
            Arc::new(LogNotifier)
        }
    };

    let mut orchestrator = PollingOrchestrator::new(
        Arc::new(driver),
        Arc::new(store),
        notifier,
        targets,
        Arc::new(table),
        config.reveal.clone(),
        PollSettings::from_config(&config),
    );
    orchestrator
        .load_state()
        .await
        .context("Failed to load known state")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown requested, finishing current round");
        on_signal.cancel();
    });

    orchestrator.run(&cancel).await;
    info!("Threadwatch stopped");
    Ok(())
}
