use reverse_link::command::{CommandRegistry, Dispatcher, Ready, Router};
use reverse_link::config::{ConfigStore, SharedConfig, Settings};
use reverse_link::connection::{ConnectionManager, Outbox};
use reverse_link::transport::WsConnector;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let settings = Settings::load()?;
    let store = SharedConfig::new(settings.device.clone());

    info!("Reverse link starting: {}", settings.device.device_id);
    if settings.device.host_url.trim().is_empty() {
        warn!("  Host URL not set; the service will stay idle until configured");
    } else {
        info!("  Host: {}", settings.device.host_url);
    }
    info!(
        "  Reconnect delay: {}ms, long-running command: {}",
        settings.link.reconnect_delay.as_millis(),
        settings.link.long_running_method
    );

    let store: Arc<dyn ConfigStore> = Arc::new(store);
    let registry: Arc<dyn Dispatcher> = Arc::new(CommandRegistry::new(store.clone()));

    let outbox = Outbox::new();
    let router = Arc::new(Router::new(
        outbox.clone(),
        Arc::new(Ready(registry)),
        settings.link.long_running_method.clone(),
    ));

    let manager = ConnectionManager::new(
        settings.link,
        store,
        Arc::new(WsConnector::new()),
        router,
        outbox,
    );
    manager.start().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested (state: {})", manager.state());
    manager.shutdown();

    Ok(())
}
