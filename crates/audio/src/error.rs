//! Fehlertypen fuer die Audio-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Engine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Mikrofonzugriff verweigert: {0}. Bitte Berechtigung in den Systemeinstellungen erteilen")]
    ZugriffVerweigert(String),

    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Aufnahme laeuft bereits")]
    LaeuftBereits,
}

impl AudioError {
    /// Fehler, die der Benutzer selbst beheben kann (Berechtigung, Geraet)
    pub fn is_benutzer_behebbar(&self) -> bool {
        matches!(
            self,
            AudioError::ZugriffVerweigert(_)
                | AudioError::GeraetNichtGefunden(_)
                | AudioError::KeinStandardEingabegeraet
                | AudioError::KeinStandardAusgabegeraet
        )
    }

    /// Ordnet eine Backend-Meldung ein: Berechtigungsprobleme werden
    /// als [`AudioError::ZugriffVerweigert`] gemeldet.
    pub(crate) fn aus_backend(beschreibung: String) -> Self {
        let klein = beschreibung.to_lowercase();
        if klein.contains("permission")
            || klein.contains("denied")
            || klein.contains("not authorized")
        {
            AudioError::ZugriffVerweigert(beschreibung)
        } else {
            AudioError::StreamFehler(beschreibung)
        }
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
