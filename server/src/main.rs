//! bearer-dspd – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Daemon.

use anyhow::Result;
use bearer_dspd::{config::DaemonConfig, Server};
use bearer_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = DaemonConfig::pfad_aus_env();
    let config = DaemonConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "bearer-dspd wird initialisiert"
    );

    Server::neu(config).starten().await?;

    Ok(())
}
