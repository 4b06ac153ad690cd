//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Client ohne Konfigurationsdatei
//! gegen einen lokalen Agenten laeuft.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use voxlink_audio::{SchedulerConfig, VadConfig, DEFAULT_FRAME_SIZE};
use voxlink_session::{SessionConfig, AGENT_RATE};

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG: &str = "VOXLINK_CONFIG";
/// Umgebungsvariable, die `agent.url` ueberschreibt
pub const ENV_URL: &str = "VOXLINK_URL";
/// Standardpfad der Konfigurationsdatei
pub const STANDARD_PFAD: &str = "voxlink.toml";

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Verbindung zum Agenten
    pub agent: AgentEinstellungen,
    /// Mikrofon
    pub aufnahme: AufnahmeEinstellungen,
    /// Lautsprecher und Wiedergabeplanung
    pub wiedergabe: WiedergabeEinstellungen,
    /// Lokale Sprachaktivitaetserkennung
    pub vad: VadEinstellungen,
    /// Logging
    pub logging: LoggingEinstellungen,
}

/// Verbindung zum Agenten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentEinstellungen {
    /// WebSocket-Adresse (`ws://`)
    pub url: String,
    /// Rate des Mikrofon-Audios zum Agenten in Hz
    pub eingangs_rate: u32,
    /// Rate des Agent-Audios in Hz
    pub ausgangs_rate: u32,
    /// Wartezeit auf den geordneten Verbindungsabbau
    pub schliessen_timeout_ms: u64,
}

impl Default for AgentEinstellungen {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".into(),
            eingangs_rate: AGENT_RATE,
            ausgangs_rate: AGENT_RATE,
            schliessen_timeout_ms: 1000,
        }
    }
}

/// Mikrofon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AufnahmeEinstellungen {
    /// Namensteil des Geraets (leer = Standardgeraet)
    pub geraet: Option<String>,
    /// Samples pro Frame
    pub frame_groesse: usize,
    /// Zieldauer eines gesendeten Chunks, 0 = jeden Frame sofort senden
    pub batch_ms: u32,
}

impl Default for AufnahmeEinstellungen {
    fn default() -> Self {
        Self {
            geraet: None,
            frame_groesse: DEFAULT_FRAME_SIZE,
            batch_ms: 0,
        }
    }
}

/// Lautsprecher und Wiedergabeplanung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WiedergabeEinstellungen {
    /// Namensteil des Geraets (leer = Standardgeraet)
    pub geraet: Option<String>,
    pub sicherheitsabstand_ms: u64,
    pub ausblenden_ms: u64,
    pub tick_ms: u64,
}

impl Default for WiedergabeEinstellungen {
    fn default() -> Self {
        Self {
            geraet: None,
            sicherheitsabstand_ms: 50,
            ausblenden_ms: 30,
            tick_ms: 20,
        }
    }
}

/// Lokale Sprachaktivitaetserkennung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadEinstellungen {
    pub aktiviert: bool,
    /// RMS-Schwelle (0.0..1.0)
    pub schwellwert: f32,
    pub min_sprache_ms: u64,
    pub stille_ms: u64,
    /// Stille nach Sprache beendet den Benutzer-Turn
    pub ende_bei_stille: bool,
}

impl Default for VadEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            schwellwert: 0.02,
            min_sprache_ms: 100,
            stille_ms: 200,
            ende_bei_stille: true,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Uebernimmt eine Agent-Adresse aus der Umgebung
    pub fn url_ueberschreiben(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.agent.url = url;
        }
    }

    /// Baut die Laufzeitkonfiguration der Session
    pub fn session_config(&self) -> SessionConfig {
        let vad = self.vad.aktiviert.then(|| VadConfig {
            schwellwert: self.vad.schwellwert,
            min_sprache: Duration::from_millis(self.vad.min_sprache_ms),
            stille: Duration::from_millis(self.vad.stille_ms),
            ..VadConfig::default()
        });

        SessionConfig {
            agent_url: self.agent.url.clone(),
            eingangs_rate: self.agent.eingangs_rate,
            ausgangs_rate: self.agent.ausgangs_rate,
            schliessen_timeout: Duration::from_millis(self.agent.schliessen_timeout_ms),
            frame_groesse: self.aufnahme.frame_groesse,
            batch_ms: self.aufnahme.batch_ms,
            aufnahme_geraet: self.aufnahme.geraet.clone(),
            wiedergabe_geraet: self.wiedergabe.geraet.clone(),
            scheduler: SchedulerConfig {
                safety_margin: Duration::from_millis(self.wiedergabe.sicherheitsabstand_ms),
                fade_out: Duration::from_millis(self.wiedergabe.ausblenden_ms),
            },
            tick: Duration::from_millis(self.wiedergabe.tick_ms),
            vad,
            ende_bei_stille: self.vad.ende_bei_stille,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.agent.eingangs_rate, 24000);
        assert_eq!(cfg.aufnahme.frame_groesse, 2048);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.session_config().validieren().is_ok());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [agent]
            url = "ws://agent.local:9000/ws"
            ausgangs_rate = 16000

            [wiedergabe]
            ausblenden_ms = 80
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.agent.url, "ws://agent.local:9000/ws");
        assert_eq!(cfg.agent.ausgangs_rate, 16000);
        assert_eq!(cfg.wiedergabe.ausblenden_ms, 80);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.agent.eingangs_rate, 24000);
        assert_eq!(cfg.wiedergabe.sicherheitsabstand_ms, 50);
        assert!(cfg.vad.aktiviert);
    }

    #[test]
    fn session_config_uebernimmt_werte() {
        let mut cfg = ClientConfig::default();
        cfg.aufnahme.batch_ms = 100;
        cfg.wiedergabe.sicherheitsabstand_ms = 120;
        cfg.vad.schwellwert = 0.05;

        let session = cfg.session_config();
        assert_eq!(session.batch_ms, 100);
        assert_eq!(session.scheduler.safety_margin, Duration::from_millis(120));
        assert_eq!(session.scheduler.fade_out, Duration::from_millis(30));
        assert_eq!(session.tick, Duration::from_millis(20));
        let vad = session.vad.unwrap();
        assert_eq!(vad.schwellwert, 0.05);
        assert_eq!(vad.stille, Duration::from_millis(200));
    }

    #[test]
    fn vad_deaktiviert() {
        let mut cfg = ClientConfig::default();
        cfg.vad.aktiviert = false;
        assert!(cfg.session_config().vad.is_none());
    }

    #[test]
    fn url_aus_umgebung() {
        let mut cfg = ClientConfig::default();
        cfg.url_ueberschreiben(None);
        assert_eq!(cfg.agent.url, "ws://127.0.0.1:8000/ws");

        cfg.url_ueberschreiben(Some("  ".into()));
        assert_eq!(cfg.agent.url, "ws://127.0.0.1:8000/ws");

        cfg.url_ueberschreiben(Some("ws://anders:1/ws".into()));
        assert_eq!(cfg.agent.url, "ws://anders:1/ws");
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ClientConfig::laden("/nicht/vorhanden/voxlink.toml").unwrap();
        assert_eq!(cfg.agent.url, ClientConfig::default().agent.url);
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("voxlink-test-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[agent\nurl = ").unwrap();
        let result = ClientConfig::laden(pfad.to_str().unwrap());
        std::fs::remove_file(&pfad).ok();
        assert!(result.is_err());
    }
}
