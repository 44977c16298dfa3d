use pulsehub::config::{load_config, HubConfig};
use pulsehub::hub::Hub;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsehub=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match load_config(&path) {
            Ok(config) => {
                info!(path = %path, "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to load configuration, using defaults");
                HubConfig::default()
            }
        },
        None => HubConfig::default(),
    };

    let hub = Hub::bind(&config).await?;
    hub.run().await;
    Ok(())
}
