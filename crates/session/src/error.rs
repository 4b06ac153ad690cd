//! Fehlertypen fuer Verbindung und Session

use thiserror::Error;
use voxlink_audio::AudioError;

/// Fehler der Agent-Verbindung
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Aufbau (TCP, TLS, WebSocket-Handshake) fehlgeschlagen
    #[error("Verbindung zu {url} fehlgeschlagen: {grund}")]
    Verbindung { url: String, grund: String },

    /// Verbindung endete, bevor der Agent bereit war
    #[error("Verbindung vor 'ready' beendet: {0}")]
    VorBereitGeschlossen(String),

    /// Verbindung ist ohne geordneten Abschluss abgebrochen
    #[error("Verbindung unerwartet geschlossen: {0}")]
    UnerwartetGeschlossen(String),

    /// Senden nach dem Schliessen
    #[error("Nicht verbunden")]
    NichtVerbunden,
}

/// Fehlertyp einer Sprachsession
#[derive(Debug, Error)]
pub enum SessionError {
    /// Mikrofon oder Lautsprecher
    #[error("Audio-Fehler: {0}")]
    Audio(#[from] AudioError),

    /// Agent-Verbindung
    #[error("Transport-Fehler: {0}")]
    Transport(#[from] TransportError),

    /// Ungueltige Konfiguration
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Session ist bereits beendet
    #[error("Session ist beendet")]
    Beendet,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SessionError {
    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }

    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fatale Fehler beenden die Session vollstaendig
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Beendet)
    }

    /// Meldung fuer den Benutzer, mit Hinweis zur Abhilfe
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Audio(AudioError::ZugriffVerweigert(_)) => {
                "Kein Zugriff auf das Mikrofon. Bitte die Berechtigung in den \
                 Systemeinstellungen erteilen und neu starten."
                    .into()
            }
            SessionError::Audio(
                AudioError::GeraetNichtGefunden(_)
                | AudioError::KeinStandardEingabegeraet
                | AudioError::KeinStandardAusgabegeraet,
            ) => "Kein passendes Mikrofon oder Ausgabegeraet gefunden. Bitte Geraet \
                  anschliessen oder in der Konfiguration waehlen."
                .into(),
            SessionError::Audio(e) => format!("Audio-Problem: {e}"),
            SessionError::Transport(TransportError::Verbindung { url, .. }) => {
                format!("Agent unter {url} nicht erreichbar. Adresse und Netzwerk pruefen.")
            }
            SessionError::Transport(_) => {
                "Die Verbindung zum Agenten wurde unterbrochen. Bitte neu verbinden.".into()
            }
            SessionError::Konfiguration(msg) => format!("Konfiguration fehlerhaft: {msg}"),
            SessionError::Beendet => "Die Session ist bereits beendet.".into(),
            SessionError::Intern(msg) => format!("Interner Fehler: {msg}"),
        }
    }
}

/// Result-Typ fuer Sessions
pub type SessionResult<T> = Result<T, SessionError>;
