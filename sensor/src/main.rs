use std::sync::Arc;

use anyhow::{Context, Result};
use plexrec_sensor::{setup_entry, validate_api, Config, ReqwestTransport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let transport = Arc::new(ReqwestTransport::new()?);

    let health = validate_api(transport.as_ref(), &config.client())
        .await
        .with_context(|| format!("validating {}", config.api_url))?;
    info!(title = %health.title, "Connected");

    let (integration, mut updates) = setup_entry(&config, transport).await?;
    info!(sensors = ?integration.unique_ids(), "Sensors created");

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(snapshot) = update else { break };
                let attributes = serde_json::to_string(&snapshot.attributes)?;
                info!(
                    entity = %snapshot.unique_id,
                    name = %snapshot.name,
                    state = snapshot.state,
                    %attributes,
                    "Sensor updated"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    integration.unload();
    Ok(())
}
