//! Voxlink Client - Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet eine
//! Session gegen den konfigurierten Agenten.

use anyhow::Result;
use voxlink_client::config::{ClientConfig, ENV_CONFIG, ENV_URL, STANDARD_PFAD};
use voxlink_client::{geraete_auflisten, Client};
use voxlink_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|a| a == "--geraete") {
        return geraete_auflisten();
    }

    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var(ENV_CONFIG).unwrap_or_else(|_| STANDARD_PFAD.into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let mut config = ClientConfig::laden(&config_pfad)?;
    config.url_ueberschreiben(std::env::var(ENV_URL).ok());

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        agent = %config.agent.url,
        "Voxlink Client wird initialisiert"
    );

    Client::neu(config).starten().await
}
