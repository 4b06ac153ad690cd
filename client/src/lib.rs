//! voxlink-client - Bibliotheks-Root
//!
//! Konfiguration, Konsolenbefehle und der Lauf einer einzelnen Session.

pub mod config;
pub mod konsole;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use voxlink_audio::{list_input_devices, list_output_devices, AudioDevice};
use voxlink_session::{AudioDevices, SessionEvent, StreamSession};

use config::ClientConfig;
use konsole::Befehl;

/// Haelt die Client-Konfiguration zusammen
pub struct Client {
    pub config: ClientConfig,
}

impl Client {
    /// Erstellt einen neuen Client aus der gegebenen Konfiguration
    pub fn neu(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Verbindet sich mit dem Agenten und laeuft bis zum Ende der Session
    ///
    /// Ablauf:
    /// 1. Ausgabegeraet oeffnen
    /// 2. Session aufbauen (Verbindung, Mikrofon)
    /// 3. stdin-Befehle, Ereignisse und Ctrl-C verarbeiten
    /// 4. Auf den Abbau warten
    pub async fn starten(self) -> Result<()> {
        let session_config = self.config.session_config();
        let devices = AudioDevices::cpal(&session_config)
            .context("Audio-Ausgabe konnte nicht geoeffnet werden")?;

        let mut session = match StreamSession::connect(session_config, devices).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(fehler = %e, "Session konnte nicht aufgebaut werden");
                return Err(anyhow!(e.user_message()));
            }
        };
        let handle = session.handle();
        let mut events = session
            .take_events()
            .ok_or_else(|| anyhow!("Ereigniskanal bereits vergeben"))?;

        let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_offen = true;
        let strg_c = tokio::signal::ctrl_c();
        tokio::pin!(strg_c);
        let mut abgebrochen = false;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Some(text) = konsole::anzeige(&event) {
                        println!("{text}");
                    }
                    if matches!(event, SessionEvent::Closed { .. }) {
                        break;
                    }
                }

                zeile = zeilen.next_line(), if stdin_offen => match zeile {
                    Ok(Some(zeile)) => {
                        let ergebnis = match Befehl::lesen(&zeile) {
                            Befehl::EndTurn => handle.end_turn(),
                            Befehl::Text(text) => handle.send_text(text),
                            Befehl::Beenden => {
                                handle.disconnect().await;
                                Ok(())
                            }
                        };
                        if let Err(e) = ergebnis {
                            tracing::warn!(fehler = %e, "Befehl nicht ausgefuehrt");
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("stdin geschlossen, nur noch Ctrl-C beendet");
                        stdin_offen = false;
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, "stdin nicht lesbar");
                        stdin_offen = false;
                    }
                },

                signal = &mut strg_c, if !abgebrochen => {
                    abgebrochen = true;
                    if let Err(e) = signal {
                        tracing::warn!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen");
                    }
                    tracing::info!("Shutdown-Signal empfangen, Session wird beendet");
                    handle.disconnect().await;
                }
            }
        }

        let ergebnis = session.wait().await;

        match session.metrics().exportieren() {
            Ok(text) => tracing::debug!(metriken = %text, "Session-Metriken"),
            Err(e) => tracing::warn!(fehler = %e, "Metriken nicht exportierbar"),
        }

        ergebnis.map_err(|e| anyhow!(e.user_message()))
    }
}

/// Gibt alle Ein- und Ausgabegeraete auf stdout aus
pub fn geraete_auflisten() -> Result<()> {
    println!("Eingabegeraete:");
    for geraet in list_input_devices()? {
        println!("  {}", geraet_zeile(&geraet));
    }
    println!("Ausgabegeraete:");
    for geraet in list_output_devices()? {
        println!("  {}", geraet_zeile(&geraet));
    }
    Ok(())
}

fn geraet_zeile(geraet: &AudioDevice) -> String {
    let raten: Vec<String> = geraet.sample_rates.iter().map(u32::to_string).collect();
    format!(
        "{}{} ({} Kanaele, {} Hz)",
        geraet.name,
        if geraet.standard { " [Standard]" } else { "" },
        geraet.channels,
        raten.join("/")
    )
}
