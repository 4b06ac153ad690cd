//! Ereignisse einer Session fuer die Anwendung

use voxlink_core::TurnState;
use voxlink_protocol::{ErrorPayload, FunctionCall};

/// Was die Session nach aussen meldet
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Verbindung steht, Agent ist bereit
    Ready,
    /// Turn-Zustand hat gewechselt
    TurnChanged { from: TurnState, to: TurnState },
    /// Text-Antwort des Agenten
    AgentText(String),
    /// Transkription der Agent-Sprachausgabe
    Transcription(String),
    /// Agent ruft ein Werkzeug auf
    FunctionCall(FunctionCall),
    /// Agent meldet einen Fehler; die Session laeuft weiter
    AgentError(ErrorPayload),
    /// Agent hat selbst unterbrochen
    AgentInterrupted { reason: Option<String> },
    /// Alle geplanten Chunks sind abgespielt
    PlaybackIdle,
    /// Session ist beendet; `error` ist gesetzt bei abgebrochener Verbindung
    Closed { error: Option<String> },
}
