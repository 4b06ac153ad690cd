//! Laufzeitkonfiguration einer Session
//!
//! Wird vom Client aus der TOML-Datei gebaut. Alle Zeiten sind hier
//! bereits `Duration`, alle Raten in Hz.

use std::time::Duration;

use voxlink_audio::{SchedulerConfig, VadConfig, DEFAULT_FRAME_SIZE};

use crate::error::{SessionError, SessionResult};

/// Standard-Abtastrate des Agenten (Ein- und Ausgang)
pub const AGENT_RATE: u32 = 24000;

/// Konfiguration einer Sprachsession
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket-Adresse des Agenten (`ws://`)
    pub agent_url: String,
    /// Rate, mit der Mikrofon-Audio zum Agenten geht
    pub eingangs_rate: u32,
    /// Rate des Agent-Audios
    pub ausgangs_rate: u32,
    /// Wartezeit auf den geordneten Verbindungsabbau
    pub schliessen_timeout: Duration,
    /// Samples pro Capture-Frame
    pub frame_groesse: usize,
    /// Zieldauer eines gesendeten Audio-Chunks, 0 = ungebuendelt
    pub batch_ms: u32,
    /// Namensteil des Mikrofons, `None` = Standard
    pub aufnahme_geraet: Option<String>,
    /// Namensteil des Ausgabegeraets, `None` = Standard
    pub wiedergabe_geraet: Option<String>,
    /// Sicherheitsabstand und Ausblendzeit der Wiedergabe
    pub scheduler: SchedulerConfig,
    /// Takt, in dem abgespielte Chunks abgeraeumt werden
    pub tick: Duration,
    /// Lokale VAD, `None` = deaktiviert
    pub vad: Option<VadConfig>,
    /// Sprachende der VAD beendet den Benutzer-Turn
    pub ende_bei_stille: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_url: "ws://127.0.0.1:8000/ws".into(),
            eingangs_rate: AGENT_RATE,
            ausgangs_rate: AGENT_RATE,
            schliessen_timeout: Duration::from_millis(1000),
            frame_groesse: DEFAULT_FRAME_SIZE,
            batch_ms: 0,
            aufnahme_geraet: None,
            wiedergabe_geraet: None,
            scheduler: SchedulerConfig::default(),
            tick: Duration::from_millis(20),
            vad: Some(VadConfig::default()),
            ende_bei_stille: true,
        }
    }
}

impl SessionConfig {
    /// Prueft die Werte auf Plausibilitaet
    pub fn validieren(&self) -> SessionResult<()> {
        if self.agent_url.starts_with("wss://") {
            return Err(SessionError::konfiguration(format!(
                "wss:// wird nicht unterstuetzt (ohne TLS gebaut), bitte ws:// verwenden: '{}'",
                self.agent_url
            )));
        }
        if !self.agent_url.starts_with("ws://") {
            return Err(SessionError::konfiguration(format!(
                "agent.url muss mit ws:// beginnen: '{}'",
                self.agent_url
            )));
        }
        if self.eingangs_rate == 0 || self.ausgangs_rate == 0 {
            return Err(SessionError::konfiguration("Abtastraten muessen > 0 sein"));
        }
        if self.frame_groesse == 0 {
            return Err(SessionError::konfiguration("frame_groesse muss > 0 sein"));
        }
        if self.tick.is_zero() {
            return Err(SessionError::konfiguration("tick_ms muss > 0 sein"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ist_gueltig() {
        let config = SessionConfig::default();
        assert!(config.validieren().is_ok());
        assert_eq!(config.eingangs_rate, 24000);
        assert_eq!(config.frame_groesse, 2048);
        assert_eq!(config.scheduler.safety_margin, Duration::from_millis(50));
    }

    #[test]
    fn http_url_abgelehnt() {
        let config = SessionConfig {
            agent_url: "http://localhost".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validieren(),
            Err(SessionError::Konfiguration(_))
        ));
    }

    #[test]
    fn wss_url_klar_abgelehnt() {
        let config = SessionConfig {
            agent_url: "wss://agent.example/ws".into(),
            ..Default::default()
        };
        match config.validieren() {
            Err(SessionError::Konfiguration(meldung)) => assert!(meldung.contains("wss://")),
            other => panic!("Konfigurationsfehler erwartet, bekam {other:?}"),
        }
    }

    #[test]
    fn rate_null_abgelehnt() {
        let config = SessionConfig {
            ausgangs_rate: 0,
            ..Default::default()
        };
        assert!(config.validieren().is_err());
    }
}
