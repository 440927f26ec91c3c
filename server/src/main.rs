//! Relay server entry point.
//!
//! Loads configuration, initializes logging, and runs the relay until a
//! shutdown signal is received.

use anyhow::Result;
use relay_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = ServerConfig::laden(&config_pfad)?;

    relay_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "relay server starting"
    );

    let server = match Server::neu(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "relay server failed to start");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.starten().await {
        tracing::error!(error = %e, "relay server exited with an error");
        std::process::exit(1);
    }

    Ok(())
}
