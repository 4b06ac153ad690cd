//! Ereignisse der Sprachaktivitaetserkennung
//!
//! Die VAD selbst ist austauschbar (lokale Energie-VAD oder ein externes
//! Modell). Die Session sieht nur diese drei Ereignisse.

use serde::{Deserialize, Serialize};

/// Ereignis einer Voice-Activity-Detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VadEvent {
    /// Sprache hat begonnen
    SpeechStart,
    /// Sprache ist nach ausreichender Stille beendet
    SpeechEnd,
    /// Vermeintliche Sprache war zu kurz (Rauschen, Klick)
    Misfire,
}

impl std::fmt::Display for VadEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VadEvent::SpeechStart => "speech-start",
            VadEvent::SpeechEnd => "speech-end",
            VadEvent::Misfire => "misfire",
        };
        f.write_str(name)
    }
}
